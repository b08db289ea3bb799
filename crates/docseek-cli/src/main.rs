//! DocSeek: interactive shell for uploading, browsing and searching documents.

use std::sync::Arc;

use docseek_core::ClientConfig;
use docseek_runtime::{Coordinator, FileSession, SessionStorage};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;
mod shell;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not interleave with shell output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                println!("DocSeek: semantic search over your documents");
                println!();
                println!("Usage: docseek");
                println!();
                println!("Environment:");
                println!("  DOCSEEK_API_BASE_URL     Document service (default http://localhost:8000)");
                println!("  DOCSEEK_VALIDATION_URL   Key check endpoint");
                println!("  DOCSEEK_TIMEOUT_SECS     Request timeout in seconds (default 60)");
                println!("  DOCSEEK_SESSION_FILE     Where the session key is kept");
                println!("  RUST_LOG                 Log filter (default warn)");
                println!();
                println!("{}", shell::HELP);
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}. Use 'docseek help' for usage.", other);
                std::process::exit(1);
            }
        }
    }

    let config = ClientConfig::from_env()?;
    info!("Document service: {}", config.base_url());

    let session = Arc::new(FileSession::open(&config.session_file));
    let storage: Arc<dyn SessionStorage> = session.clone();
    let coordinator = Coordinator::new(&config, storage)?;
    coordinator.start();

    let result = shell::Shell::new(&coordinator).run().await;

    // The key only lives as long as the session
    session.end();
    info!("Session ended");
    result
}
