//! Cangjie Language Server binary.
//!
//! Usage:
//!   cangjie-ls [options]
//!
//! Options:
//!   --stdio          Use stdio for communication (default)
//!   --root=PATH      Project root when the client sends no rootUri
//!   --log            Enable logging to stderr
//!   --verbose        Raise the log filter to debug
//!   --test           Disable on-disk cache writes
//!   --version        Show version information
//!   --help           Show this help message

use cangjie_ls::Options;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match Options::parse(&args) {
        Ok(options) => options,
        Err(bad) => {
            eprintln!("Unknown option: {bad}");
            print_help();
            process::exit(1);
        }
    };

    if options.help() {
        print_help();
        process::exit(0);
    }
    if options.version() {
        println!("cangjie-ls {}", env!("CARGO_PKG_VERSION"));
        process::exit(0);
    }

    // stdout is the transport; logs go to stderr only.
    if options.is_set("log") || options.verbose() {
        let filter = if options.verbose() { "debug" } else { "info" };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
            )
            .with_writer(std::io::stderr)
            .try_init();
    }

    match cangjie_ls::run_stdio(options) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("cangjie-ls error: {e}");
            process::exit(1);
        }
    }
}

fn print_help() {
    eprintln!("Cangjie Language Server");
    eprintln!();
    eprintln!("Usage: cangjie-ls [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --stdio          Use stdio for communication (default)");
    eprintln!("  --root=PATH      Project root when the client sends no rootUri");
    eprintln!("  --log            Enable logging to stderr");
    eprintln!("  --verbose        Raise the log filter to debug");
    eprintln!("  --test           Disable on-disk cache writes");
    eprintln!("  --version        Show version information");
    eprintln!("  --help           Show this help message");
}
