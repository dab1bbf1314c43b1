//! Mensagens de status do Spoder — spinner e saída colorida no terminal.
//!
//! Cada componente emite eventos [`Status`] para um [`Reporter`]. O
//! [`ConsoleReporter`] usa `console` para as cores e `indicatif` para o
//! spinner exibido enquanto a credencial é procurada.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::CredentialSource;

/// Eventos visíveis ao usuário, em ordem aproximada de ocorrência.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Loaded,
    SourceLoading,
    SourceLoaded { count: usize },
    SourceFailed,
    CredentialFound { source: CredentialSource },
    PollStarted,
    PollStopped,
    CredentialNotFound,
    MissingPrerequisites,
    WorkPlanned { total: usize, remaining: usize },
    Progress { percent: u8, done: usize, total: usize },
    BatchFailed { ids: Vec<String> },
    Unauthorized,
    AllDone,
    Summary { confirmed: usize },
    NothingNew,
    RunFailed { reason: String },
    Stopped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Loaded => write!(f, "Spoder started"),
            Status::SourceLoading => write!(f, "loading artist list..."),
            Status::SourceLoaded { count } => write!(f, "loaded {count} artists"),
            Status::SourceFailed => write!(f, "could not load the artist list"),
            Status::CredentialFound { source } => write!(f, "client credential found ({source})"),
            Status::PollStarted => write!(f, "waiting for client credential..."),
            Status::PollStopped => write!(f, "stopped waiting for client credential"),
            Status::CredentialNotFound => write!(f, "could not obtain client credential"),
            Status::MissingPrerequisites => write!(f, "no client credential or user"),
            Status::WorkPlanned { total, remaining } => {
                write!(f, "{total} artists in list; {remaining} to block")
            }
            Status::Progress { percent, .. } => write!(f, "progress {percent}%"),
            Status::BatchFailed { ids } => write!(f, "failed to block batch: {}", ids.join(", ")),
            Status::Unauthorized => write!(f, "credential rejected (401), clearing it"),
            Status::AllDone => write!(f, "every artist in the list is already blocked"),
            Status::Summary { confirmed } => write!(f, "blocked {confirmed} artists"),
            Status::NothingNew => write!(f, "finished, nothing new was blocked"),
            Status::RunFailed { reason } => write!(f, "run failed: {reason}"),
            Status::Stopped => write!(f, "stopped"),
        }
    }
}

/// Destino dos eventos de status.
pub trait Reporter: Send + Sync {
    fn report(&self, status: &Status);
}

/// Reporter de terminal com cores e spinner durante a busca da credencial.
pub struct ConsoleReporter {
    // Spinner ativo enquanto o polling da credencial está em andamento.
    spinner: Mutex<Option<ProgressBar>>,
    green: Style,
    red: Style,
    yellow: Style,
    cyan: Style,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
        }
    }

    fn start_spinner(&self, message: String) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(pb);
        }
    }

    fn finish_spinner(&self) {
        if let Ok(mut slot) = self.spinner.lock()
            && let Some(pb) = slot.take()
        {
            pb.finish_and_clear();
        }
    }

    // Escolhe o símbolo e o estilo de acordo com a gravidade do evento.
    fn styled(&self, status: &Status) -> (String, &Style) {
        match status {
            Status::SourceLoaded { .. }
            | Status::CredentialFound { .. }
            | Status::AllDone
            | Status::Summary { .. } => ("✓".to_string(), &self.green),
            Status::SourceFailed
            | Status::CredentialNotFound
            | Status::RunFailed { .. } => ("✗".to_string(), &self.red),
            Status::MissingPrerequisites
            | Status::BatchFailed { .. }
            | Status::Unauthorized => ("!".to_string(), &self.yellow),
            _ => ("›".to_string(), &self.cyan),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, status: &Status) {
        match status {
            Status::PollStarted => {
                self.start_spinner(status.to_string());
                return;
            }
            Status::CredentialFound { .. }
            | Status::CredentialNotFound
            | Status::PollStopped
            | Status::Stopped => self.finish_spinner(),
            _ => {}
        }
        let (symbol, style) = self.styled(status);
        println!("  {} {status}", style.apply_to(symbol));
    }
}
