mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use spoder::orchestrator::Collaborators;
use spoder::store::{CredentialStore, FileStore, LocalStore};
use spoder::transport::ReqwestTransport;
use spoder::ui::ConsoleReporter;
use spoder::{Spoder, SpoderConfig};

fn init_tracing(verbose: bool) {
    let default = if verbose { "spoder=debug" } else { "spoder=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SpoderConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let store: Arc<dyn LocalStore> = Arc::new(FileStore::new(&cli.store));
    let credentials = CredentialStore::new(store.clone(), config.store.clone());

    match cli.command {
        Command::Run => {
            if let Some(token) = &config.access_token {
                credentials.save_credential(token);
            }
            let transport = Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);
            let reporter = Arc::new(ConsoleReporter::new());
            let spoder = Spoder::new(
                &config,
                Collaborators::http(&config, transport, store, reporter),
            );

            let acquired = tokio::select! {
                source = spoder.acquire() => source,
                _ = tokio::signal::ctrl_c() => {
                    spoder.stop();
                    None
                }
            };

            if acquired.is_some() {
                let run = spoder.run_acquired();
                tokio::pin!(run);
                let mut stopped = false;
                loop {
                    tokio::select! {
                        outcome = &mut run => {
                            tracing::info!(?outcome, "finished");
                            break;
                        }
                        _ = tokio::signal::ctrl_c() => {
                            if stopped {
                                tracing::warn!("interrupted again, abandoning the current run");
                                break;
                            }
                            stopped = true;
                            spoder.stop();
                            tracing::info!("run in progress, press Ctrl-C again to abandon it");
                        }
                    }
                }
            }
            println!("{}", serde_json::to_string_pretty(&spoder.diag())?);
        }
        Command::Diag => {
            let snapshot = serde_json::json!({
                "hasCredential": credentials.load_credential().is_some(),
                "processedCount": credentials.load_processed().len(),
                "user": credentials.acting_user(),
            });
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Reset => {
            credentials.clear_credential();
            credentials.clear_processed();
            println!("cleared {}", cli.store.display());
        }
    }

    Ok(())
}
