use std::fmt;

use serde::Serialize;

/// Lifecycle of the credential search.
///
/// The normal path is IDLE → SEARCHING → FOUND → RUNNING. A stored credential
/// may skip SEARCHING. NOT_FOUND is reached only when polling runs out of
/// attempts and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionState {
    Idle,
    Searching,
    Found,
    Running,
    NotFound,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionState::Idle => write!(f, "IDLE"),
            AcquisitionState::Searching => write!(f, "SEARCHING"),
            AcquisitionState::Found => write!(f, "FOUND"),
            AcquisitionState::Running => write!(f, "RUNNING"),
            AcquisitionState::NotFound => write!(f, "NOT_FOUND"),
        }
    }
}

impl AcquisitionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: AcquisitionState) -> bool {
        use AcquisitionState::*;
        matches!(
            (self, next),
            (Idle, Searching)
                | (Idle, Found)
                | (Searching, Found)
                | (Searching, NotFound)
                | (Found, Running)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AcquisitionState::Running | AcquisitionState::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::AcquisitionState::*;
    use super::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(Idle.can_transition_to(Searching));
        assert!(Searching.can_transition_to(Found));
        assert!(Found.can_transition_to(Running));
    }

    #[test]
    fn stored_credential_skips_searching() {
        assert!(Idle.can_transition_to(Found));
    }

    #[test]
    fn not_found_only_from_searching() {
        assert!(Searching.can_transition_to(NotFound));
        assert!(!Idle.can_transition_to(NotFound));
        assert!(!Found.can_transition_to(NotFound));
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for next in [Idle, Searching, Found, Running, NotFound] {
            assert!(!Running.can_transition_to(next));
            assert!(!NotFound.can_transition_to(next));
        }
        assert!(Running.is_terminal());
        assert!(NotFound.is_terminal());
        assert!(!Searching.is_terminal());
    }

    #[test]
    fn no_going_backwards() {
        assert!(!Found.can_transition_to(Searching));
        assert!(!Searching.can_transition_to(Idle));
        assert!(!Searching.can_transition_to(Running));
    }

    #[test]
    fn state_display() {
        assert_eq!(Idle.to_string(), "IDLE");
        assert_eq!(Searching.to_string(), "SEARCHING");
        assert_eq!(Found.to_string(), "FOUND");
        assert_eq!(Running.to_string(), "RUNNING");
        assert_eq!(NotFound.to_string(), "NOT_FOUND");
    }

    #[test]
    fn state_serializes_screaming_snake() {
        assert_eq!(serde_json::to_string(&NotFound).unwrap(), r#""NOT_FOUND""#);
    }
}
