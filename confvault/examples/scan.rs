//! Scan example: back up every device listed in a config file
//!
//! Loads a TOML config, seeds holdtimes from the repository, and runs one
//! scan (or one every `--interval` seconds).
//!
//! # Usage
//!
//! ```bash
//! cargo run --example scan -- --config confvault.toml
//! ```
//!
//! Repeat every 10 minutes:
//! ```bash
//! cargo run --example scan -- --config confvault.toml --interval 600
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use confvault::{VaultConfig, scan_devices, update_last_success};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = VaultConfig::load(&args.config)?;
    let registry = config.build_registry()?;
    let mut devices = config.build_devices(&registry)?;
    let options = config.scan.scan_options();

    println!(
        "Loaded {} devices, {} models, repository {}",
        devices.len(),
        registry.names().count(),
        options.fetch.repository.display()
    );

    update_last_success(&mut devices, &options.fetch.repository);

    loop {
        let summary = scan_devices(&mut devices, &options).await;

        println!("{}", "-".repeat(50));
        println!(
            "success={} failure={} skipped={} elapsed={:?}",
            summary.success, summary.failure, summary.skipped, summary.elapsed
        );
        for device in &devices {
            let status = device.status();
            println!(
                "  {:<12} {:<10} ok={:<5} last_success={}",
                device.id(),
                device.model(),
                status.last_ok,
                status
                    .last_success
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string())
            );
        }

        match args.interval {
            Some(interval) => tokio::time::sleep(interval).await,
            None => break,
        }
    }

    Ok(())
}

/// Simple argument parser (avoiding external dependencies)
struct Args {
    config: PathBuf,
    interval: Option<Duration>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut config = PathBuf::from("confvault.toml");
        let mut interval = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        config = PathBuf::from(&args[i]);
                    }
                }
                "--interval" | "-i" => {
                    i += 1;
                    if i < args.len() {
                        interval = args[i]
                            .parse()
                            .ok()
                            .filter(|secs| *secs > 0)
                            .map(Duration::from_secs);
                    }
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                }
            }
            i += 1;
        }

        Self { config, interval }
    }

    fn print_help() {
        println!(
            r#"confvault scan example

USAGE:
    cargo run --example scan -- [OPTIONS]

OPTIONS:
    -c, --config <PATH>      Config file [default: confvault.toml]
    -i, --interval <SECS>    Rescan every SECS seconds [default: run once]
    --help                   Print this help message
"#
        );
    }
}
