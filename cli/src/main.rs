//! deedstream CLI — inspect engine defaults and configuration.
//!
//! Usage:
//! ```bash
//! deedstream info
//! deedstream signatures
//! deedstream version
//! ```

use std::env;
use std::process;

use deedstream_core::config::NetworkConfig;
use deedstream_core::events::{signature_topic, SIGNATURES};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "signatures" => cmd_signatures(),
        "version" | "--version" | "-V" => {
            println!("deedstream {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("deedstream {}", env!("CARGO_PKG_VERSION"));
    println!("Reorg-safe event indexing and monitoring engine for tokenized property securities\n");
    println!("USAGE:");
    println!("    deedstream <COMMAND>\n");
    println!("COMMANDS:");
    println!("    info        Show engine defaults");
    println!("    signatures  List the decoded event signatures");
    println!("    version     Print version");
    println!("    help        Print this help");
}

fn cmd_info() {
    let defaults = NetworkConfig::new("<network>", "<rpc-url>");
    println!("Deedstream v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default watch mode: poll every {}ms", defaults.poll_interval_ms);
    println!("  Default reorg comparison window: {} blocks", defaults.reorg_window);
    println!("  Default RPC timeout: {}ms", defaults.rpc_timeout_ms);
    println!(
        "  Default retry backoff: {}ms, capped at {}ms",
        defaults.backoff_ms, defaults.backoff_max_ms
    );
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
    println!("  Networks: any EVM chain (mainnet, Sepolia, Polygon, Base, ...)");
}

fn cmd_signatures() {
    println!("Decoded event signatures:");
    for (signature, kind) in SIGNATURES {
        println!("  {:<22} {}  {}", kind.as_str(), signature_topic(signature), signature);
    }
}
