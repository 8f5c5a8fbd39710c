//! Processing lifecycle of a recall record.
//!
//! A record starts as `initial` (only the URL is known), becomes `retrieved`
//! once its raw content is fetched, `parsed` once fields are extracted, and
//! `published` when it is visible. `verified` marks human-confirmed data and
//! freezes it against re-extraction; `rejected` hides the record from default
//! queries without deleting it.

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;

/// Lifecycle stage of a recall record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseState {
    Initial,
    Retrieved,
    Parsed,
    Published,
    Verified,
    Rejected,
}

impl ParseState {
    /// Wire/storage name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseState::Initial => "initial",
            ParseState::Retrieved => "retrieved",
            ParseState::Parsed => "parsed",
            ParseState::Published => "published",
            ParseState::Verified => "verified",
            ParseState::Rejected => "rejected",
        }
    }

    /// Whether the record shows up on public surfaces.
    pub fn is_displayable(&self) -> bool {
        matches!(self, ParseState::Published | ParseState::Verified)
    }
}

impl std::fmt::Display for ParseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events a record can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseEvent {
    MarkRetrieved,
    MarkParsed,
    MarkPublished,
    MarkVerified,
    Reject,
}

impl ParseEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseEvent::MarkRetrieved => "mark_retrieved",
            ParseEvent::MarkParsed => "mark_parsed",
            ParseEvent::MarkPublished => "mark_published",
            ParseEvent::MarkVerified => "mark_verified",
            ParseEvent::Reject => "reject",
        }
    }
}

impl std::fmt::Display for ParseEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply a lifecycle event to a state.
///
/// Returns the resulting state, or a [`StateTransitionError`] naming the
/// event and the current state. Invalid transitions never mutate anything;
/// callers only assign the returned state on `Ok`.
pub fn transition(state: ParseState, event: ParseEvent) -> Result<ParseState, StateTransitionError> {
    use ParseEvent::*;
    use ParseState::*;

    let next = match (state, event) {
        // Idempotent re-fetch is allowed.
        (Initial | Parsed | Retrieved, MarkRetrieved) => Retrieved,
        (Retrieved, MarkParsed) => Parsed,
        (Parsed, MarkPublished) => Published,
        (Verified | Published | Parsed, MarkVerified) => Verified,
        (_, Reject) => Rejected,
        _ => return Err(StateTransitionError { event, state }),
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = ParseState::Initial;
        for (event, expected) in [
            (ParseEvent::MarkRetrieved, ParseState::Retrieved),
            (ParseEvent::MarkParsed, ParseState::Parsed),
            (ParseEvent::MarkPublished, ParseState::Published),
            (ParseEvent::MarkVerified, ParseState::Verified),
        ] {
            state = transition(state, event).unwrap();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn test_refetch_is_idempotent() {
        for from in [ParseState::Initial, ParseState::Parsed, ParseState::Retrieved] {
            assert_eq!(
                transition(from, ParseEvent::MarkRetrieved).unwrap(),
                ParseState::Retrieved
            );
        }
    }

    #[test]
    fn test_reject_from_any_state() {
        for from in [
            ParseState::Initial,
            ParseState::Retrieved,
            ParseState::Parsed,
            ParseState::Published,
            ParseState::Verified,
            ParseState::Rejected,
        ] {
            assert_eq!(
                transition(from, ParseEvent::Reject).unwrap(),
                ParseState::Rejected
            );
        }
    }

    #[test]
    fn test_verify_skips_published() {
        // Intentional: a parsed record can be verified without ever
        // being published.
        assert_eq!(
            transition(ParseState::Parsed, ParseEvent::MarkVerified).unwrap(),
            ParseState::Verified
        );
    }

    #[test]
    fn test_invalid_transitions_fail_without_mutation() {
        let invalid = [
            (ParseState::Initial, ParseEvent::MarkParsed),
            (ParseState::Initial, ParseEvent::MarkPublished),
            (ParseState::Initial, ParseEvent::MarkVerified),
            (ParseState::Retrieved, ParseEvent::MarkPublished),
            (ParseState::Retrieved, ParseEvent::MarkVerified),
            (ParseState::Parsed, ParseEvent::MarkParsed),
            (ParseState::Published, ParseEvent::MarkRetrieved),
            (ParseState::Published, ParseEvent::MarkParsed),
            (ParseState::Published, ParseEvent::MarkPublished),
            (ParseState::Verified, ParseEvent::MarkRetrieved),
            (ParseState::Verified, ParseEvent::MarkParsed),
            (ParseState::Verified, ParseEvent::MarkPublished),
            (ParseState::Rejected, ParseEvent::MarkRetrieved),
            (ParseState::Rejected, ParseEvent::MarkParsed),
            (ParseState::Rejected, ParseEvent::MarkPublished),
            (ParseState::Rejected, ParseEvent::MarkVerified),
        ];

        for (state, event) in invalid {
            let err = transition(state, event).unwrap_err();
            assert_eq!(err.state, state);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn test_error_message_names_event_and_state() {
        let err = transition(ParseState::Initial, ParseEvent::MarkPublished).unwrap_err();
        assert_eq!(
            err.to_string(),
            "event mark_published not allowed from state initial"
        );
    }
}
