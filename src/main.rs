//! Apollo - static-file server and one-shot HTTP client

use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apollo::http::{self, Headers, HttpClient, Request, Server, ServerConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") || args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let command = args[0].as_str();
    let rest = &args[1..];

    init_logging(if command == "serve" { "debug" } else { "warn" });

    let result = match command {
        "serve" => serve(rest),
        "get" => fetch(rest),
        "send" => send_file(rest),
        other => Err(format!("Unknown command: {}", other)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "{} failed", command);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the static-file server until interrupted
fn serve(args: &[String]) -> Result<(), String> {
    let mut config = ServerConfig::default();

    if let Some(bind) = option_value(args, "--bind", "-b") {
        config.bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid bind address {}: {}", bind, e))?;
    }
    if let Some(root) = option_value(args, "--static", "-s") {
        config.static_root = root.into();
    }
    if let Some(backlog) = option_value(args, "--backlog", "") {
        config.backlog = backlog
            .parse()
            .map_err(|e| format!("Invalid backlog {}: {}", backlog, e))?;
    }

    apollo::signal::install_interrupt_handler()
        .map_err(|e| format!("Cannot install interrupt handler: {}", e))?;

    info!("Starting {} v{}", NAME, VERSION);
    info!("Static root: {}", config.static_root.display());

    let server = Server::new(config).map_err(|e| e.to_string())?;
    server.run().map_err(|e| e.to_string())?;

    info!("Server stopped");
    Ok(())
}

/// GET a URL and print the response transcript
fn fetch(args: &[String]) -> Result<(), String> {
    let url = args
        .iter()
        .find(|a| a.starts_with("http"))
        .ok_or_else(|| "get needs a URL".to_string())?;

    let mut headers = Headers::new();
    for (i, arg) in args.iter().enumerate() {
        if arg == "-H" || arg == "--header" {
            let line = args
                .get(i + 1)
                .ok_or_else(|| format!("{} needs a value", arg))?;
            let (name, value) = Headers::parse_header_line(line).map_err(|e| e.to_string())?;
            headers.insert(name, value);
        }
    }

    let response = http::get(url, &headers).map_err(|e| e.to_string())?;
    println!("{}", response);
    Ok(())
}

/// Send a raw request stored in a file and print the response transcript
fn send_file(args: &[String]) -> Result<(), String> {
    let path = args
        .first()
        .ok_or_else(|| "send needs a request file".to_string())?;

    let request = Request::from_file(path).map_err(|e| e.to_string())?;
    println!("{}", request);

    let response = HttpClient::new().send(&request).map_err(|e| e.to_string())?;
    println!("{}", response);
    Ok(())
}

/// Get the value following `long` or `short`, or given as `long=value`
fn option_value<'a>(args: &'a [String], long: &str, short: &str) -> Option<&'a str> {
    for (i, arg) in args.iter().enumerate() {
        if (arg == long || (!short.is_empty() && arg == short)) && i + 1 < args.len() {
            return Some(&args[i + 1]);
        }
        if let Some(value) = arg.strip_prefix(long).and_then(|v| v.strip_prefix('=')) {
            return Some(value);
        }
    }
    None
}

/// Initialize logging; `RUST_LOG` overrides the default level
fn init_logging(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Minimal HTTP/1.1 static-file server and client.

USAGE:
    {} serve [--bind ADDR] [--static DIR] [--backlog N]
    {} get URL [-H 'Name: value']...
    {} send FILE

OPTIONS:
    -b, --bind <ADDR>      Address to listen on [default: 0.0.0.0:8000]
    -s, --static <DIR>     Directory of servable files [default: static]
        --backlog <N>      Listen backlog [default: 1]
    -H, --header <LINE>    Extra request header for get
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, NAME, NAME
    );
}
