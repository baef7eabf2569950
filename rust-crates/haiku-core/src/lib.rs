pub mod address;
pub mod attempt;
pub mod countdown;
pub mod day;
pub mod haiku;
pub mod syllables;

pub use address::Address;
pub use attempt::{
    RevertOutcome,
    SubmitAttempt,
    SubmitPhase,
    ValidationError,
    VoteAttempt,
    VotePhase,
    classify_revert,
    validate_line,
};
pub use countdown::Countdown;
pub use day::DayClock;
pub use haiku::{
    DaySnapshot,
    HaikuLine,
    LINES_PER_HAIKU,
    LineSlot,
    RawDayHaiku,
};
pub use syllables::count_syllables;
