mod credential;
mod session;
mod state;

pub use credential::{Credential, CredentialSource, SCHEME};
pub use session::{Diagnostics, Session};
pub use state::AcquisitionState;
