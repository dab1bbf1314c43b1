//! Interface de linha de comando do Spoder baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, diag, reset)
//! e flags globais (--config, --store, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Spoder — bloqueia em lote os artistas de uma lista compartilhada.
#[derive(Debug, Parser)]
#[command(name = "spoder", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Arquivo de configuração TOML.
    #[arg(long, global = true, default_value = "spoder.toml")]
    pub config: PathBuf,

    /// Arquivo JSON usado como armazenamento local.
    #[arg(long, global = true, default_value = "spoder-store.json")]
    pub store: PathBuf,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Procura a credencial e executa o bloqueio uma vez.
    Run,

    /// Mostra o estado persistido (credencial salva, artistas processados).
    Diag,

    /// Apaga a credencial salva e a lista de artistas processados.
    Reset,
}
