use std::fmt;

use crate::{
    haiku::LineSlot,
    syllables::count_syllables,
};

/// Lifecycle of one line submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    Idle,
    Validating,
    Signing,
    PendingConfirmation,
    Succeeded,
    Failed,
}

/// One attempt to submit a line, from validation through confirmation.
///
/// Ephemeral view state. A new attempt replaces the previous one; nothing
/// here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAttempt {
    pub text: String,
    pub slot: LineSlot,
    pub phase: SubmitPhase,
    pub message: Option<String>,
}

impl SubmitAttempt {
    pub fn new(text: impl Into<String>, slot: LineSlot) -> Self {
        SubmitAttempt {
            text: text.into(),
            slot,
            phase: SubmitPhase::Idle,
            message: None,
        }
    }

    /// True while a network round trip is outstanding. The UI keeps the
    /// submit action disabled whenever this holds.
    pub fn in_flight(&self) -> bool {
        matches!(
            self.phase,
            SubmitPhase::Signing | SubmitPhase::PendingConfirmation
        )
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.phase = SubmitPhase::Failed;
        self.message = Some(message.into());
    }

    pub fn succeed(&mut self, message: impl Into<String>) {
        self.phase = SubmitPhase::Succeeded;
        self.message = Some(message.into());
    }
}

/// Lifecycle of one vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotePhase {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteAttempt {
    pub day_id: u64,
    pub phase: VotePhase,
    pub message: Option<String>,
}

impl VoteAttempt {
    pub fn new(day_id: u64) -> Self {
        VoteAttempt {
            day_id,
            phase: VotePhase::Idle,
            message: None,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.phase == VotePhase::Submitting
    }
}

/// A reason a candidate line never leaves the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyLine,
    WrongSyllables { required: u32, counted: u32 },
    NoWallet,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyLine => write!(f, "Please enter a line"),
            ValidationError::WrongSyllables { required, counted } => write!(
                f,
                "This line needs {required} syllables, counted {counted}"
            ),
            ValidationError::NoWallet => write!(f, "Connect a wallet first"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Checks a candidate line before anything touches the network.
///
/// Order matters: empty text, then syllable count, then wallet presence,
/// matching the message the user most likely needs first.
pub fn validate_line(
    text: &str,
    slot: LineSlot,
    wallet_connected: bool,
) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyLine);
    }
    let required = slot.required_syllables();
    let counted = count_syllables(text);
    if counted != required {
        return Err(ValidationError::WrongSyllables { required, counted });
    }
    if !wallet_connected {
        return Err(ValidationError::NoWallet);
    }
    Ok(())
}

/// How a reverted submission should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertOutcome {
    /// The contract already has a line from this account today. Benign:
    /// the client was stale, the day state is worth refetching.
    AlreadySubmittedToday,
    /// Someone filled the slot between our read and our write. Also benign.
    SlotAlreadyFilled,
    /// Anything else surfaces as a failure with the raw reason.
    Rejected(String),
}

impl RevertOutcome {
    pub fn is_soft_success(&self) -> bool {
        !matches!(self, RevertOutcome::Rejected(_))
    }

    pub fn message(&self) -> String {
        match self {
            RevertOutcome::AlreadySubmittedToday => {
                "You already submitted your line for today".to_string()
            }
            RevertOutcome::SlotAlreadyFilled => {
                "Someone beat you to this line, the haiku moved on".to_string()
            }
            RevertOutcome::Rejected(reason) => format!("Submission failed: {reason}"),
        }
    }
}

/// Maps a contract revert reason onto an outcome.
///
/// The contract only gives us a reason string, so this is substring
/// matching. The specific daily-limit message must be checked before the
/// generic slot message, which it also contains.
pub fn classify_revert(reason: &str) -> RevertOutcome {
    if reason.contains("You already submitted a line today") {
        RevertOutcome::AlreadySubmittedToday
    } else if reason.contains("already submitted") {
        RevertOutcome::SlotAlreadyFilled
    } else {
        RevertOutcome::Rejected(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn validate_line__rejects_empty_text_first() {
        // given an empty line and no wallet
        let result = validate_line("   ", LineSlot::One, false);

        // then the emptiness wins
        assert_eq!(result, Err(ValidationError::EmptyLine));
    }

    #[test]
    fn validate_line__rejects_wrong_syllable_counts() {
        let result = validate_line("too short", LineSlot::One, true);

        assert_eq!(
            result,
            Err(ValidationError::WrongSyllables {
                required: 5,
                counted: 2,
            })
        );
    }

    #[test]
    fn validate_line__requires_a_wallet_last() {
        let result = validate_line("an old silent pond", LineSlot::One, false);
        assert_eq!(result, Err(ValidationError::NoWallet));

        let ok = validate_line("an old silent pond", LineSlot::One, true);
        assert_eq!(ok, Ok(()));
    }

    #[test]
    fn classify_revert__treats_the_daily_limit_as_soft_success() {
        let outcome =
            classify_revert("execution reverted: You already submitted a line today");

        assert_eq!(outcome, RevertOutcome::AlreadySubmittedToday);
        assert!(outcome.is_soft_success());
    }

    #[test]
    fn classify_revert__treats_a_raced_slot_as_soft_success() {
        let outcome = classify_revert("execution reverted: Line already submitted");

        assert_eq!(outcome, RevertOutcome::SlotAlreadyFilled);
        assert!(outcome.is_soft_success());
    }

    #[test]
    fn classify_revert__passes_unknown_reasons_through() {
        let outcome = classify_revert("execution reverted: Voting is closed");

        assert_eq!(
            outcome,
            RevertOutcome::Rejected("execution reverted: Voting is closed".to_string())
        );
        assert!(!outcome.is_soft_success());
    }

    #[test]
    fn submit_attempt__is_in_flight_only_during_network_phases() {
        let mut attempt = SubmitAttempt::new("an old silent pond", LineSlot::One);
        assert!(!attempt.in_flight());

        attempt.phase = SubmitPhase::Signing;
        assert!(attempt.in_flight());
        attempt.phase = SubmitPhase::PendingConfirmation;
        assert!(attempt.in_flight());

        attempt.fail("rejected");
        assert!(!attempt.in_flight());
        assert_eq!(attempt.phase, SubmitPhase::Failed);
    }
}
