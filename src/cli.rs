//! Command-line interface.

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;
use crate::ocr::check_binary;
use crate::server;

#[derive(Parser)]
#[command(name = "ocrelay")]
#[command(about = "Document upload and OCR orchestration service")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Bind address (overrides API_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Report engine and store configuration without serving
    Check,
}

/// Peek at the raw arguments for the verbose flag before clap runs, so
/// logging can be configured first.
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            server::serve(&settings).await
        }
        Commands::Check => {
            print_check(&settings);
            Ok(())
        }
    }
}

fn print_check(settings: &Settings) {
    let yes = |ok: bool| {
        if ok {
            style("available").green()
        } else {
            style("not configured").yellow()
        }
    };

    println!("{}", style("ocrelay configuration").bold());
    println!(
        "  vision model:  {} ({})",
        yes(settings.vision_configured()),
        settings.vision_model
    );
    println!(
        "  local engine:  {} (tesseract, lang {})",
        yes(check_binary("tesseract")),
        settings.ocr_lang
    );
    println!(
        "  pdf support:   {} (pdftoppm)",
        yes(check_binary("pdftoppm"))
    );
    println!("  document store: {}", yes(settings.store_configured()));
    println!(
        "  listen address: {}:{}",
        settings.host, settings.port
    );
    println!("  max file size:  {} bytes", settings.max_file_size);
}
