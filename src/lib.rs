//! Apollo - minimal HTTP/1.1 client and static-file server
//!
//! This crate provides an HTTP/1.1 message model with hand-rolled parsing
//! and serialization, a single-shot client and a thread-per-connection
//! server that serves files from a startup-time allow-list.

pub mod http;
pub mod signal;
