use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    address::Address,
    syllables::count_syllables,
};

pub const LINES_PER_HAIKU: usize = 3;

/// One of the three slots of a haiku, with its 5-7-5 syllable requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSlot {
    One,
    Two,
    Three,
}

impl LineSlot {
    /// Converts the contract's 1-based line number. Out of range means the
    /// day's haiku is already complete.
    pub fn from_line_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(LineSlot::One),
            2 => Some(LineSlot::Two),
            3 => Some(LineSlot::Three),
            _ => None,
        }
    }

    pub fn line_number(&self) -> u8 {
        match self {
            LineSlot::One => 1,
            LineSlot::Two => 2,
            LineSlot::Three => 3,
        }
    }

    pub fn required_syllables(&self) -> u32 {
        match self {
            LineSlot::One | LineSlot::Three => 5,
            LineSlot::Two => 7,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LineSlot::One => "first line",
            LineSlot::Two => "second line",
            LineSlot::Three => "third line",
        }
    }
}

/// A submitted line together with its author and estimated syllable count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaikuLine {
    pub text: String,
    pub author: Address,
    pub syllables: u32,
}

/// The raw day tuple as the contract returns it: three fixed line and
/// author slots plus counters, with unfilled slots holding placeholders.
#[derive(Debug, Clone, Default)]
pub struct RawDayHaiku {
    pub lines: [String; LINES_PER_HAIKU],
    pub authors: [String; LINES_PER_HAIKU],
    pub vote_count: u64,
    pub submitted_lines: u8,
    pub winner_declared: bool,
    pub is_winning: bool,
}

/// One game day's haiku state, shaped for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySnapshot {
    pub lines: Vec<HaikuLine>,
    pub submitted_count: u8,
    pub vote_count: u64,
    pub winner_declared: bool,
    pub is_winning: bool,
}

impl DaySnapshot {
    /// Builds the display model from the raw contract tuple.
    ///
    /// Only the first `submitted_lines` slots are real. Slots inside that
    /// bound with an empty line or a missing/zero author are skipped as
    /// well, in case a read straddles a contract update.
    pub fn from_raw(raw: RawDayHaiku) -> Self {
        let bound = (raw.submitted_lines as usize).min(LINES_PER_HAIKU);
        let mut lines = Vec::with_capacity(bound);
        for (text, author) in raw.lines.iter().zip(raw.authors.iter()).take(bound) {
            if text.trim().is_empty() {
                continue;
            }
            let author = match author.parse::<Address>() {
                Ok(a) if !a.is_zero() => a,
                _ => continue,
            };
            lines.push(HaikuLine {
                text: text.clone(),
                author,
                syllables: count_syllables(text),
            });
        }
        DaySnapshot {
            lines,
            submitted_count: raw.submitted_lines.min(LINES_PER_HAIKU as u8),
            vote_count: raw.vote_count,
            winner_declared: raw.winner_declared,
            is_winning: raw.is_winning,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.submitted_count as usize >= LINES_PER_HAIKU
    }

    pub fn next_slot(&self) -> Option<LineSlot> {
        LineSlot::from_line_number(self.submitted_count + 1)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn author(n: u8) -> String {
        format!("0x{:040x}", n)
    }

    fn raw(lines: [&str; 3], authors: [String; 3], submitted: u8) -> RawDayHaiku {
        RawDayHaiku {
            lines: lines.map(str::to_string),
            authors,
            vote_count: 0,
            submitted_lines: submitted,
            winner_declared: false,
            is_winning: false,
        }
    }

    #[test]
    fn from_raw__keeps_only_submitted_slots() {
        // given placeholders beyond the submitted bound
        let raw = raw(
            ["an old silent pond", "placeholder", "placeholder"],
            [author(1), author(2), author(3)],
            1,
        );

        // when
        let snapshot = DaySnapshot::from_raw(raw);

        // then
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.lines[0].text, "an old silent pond");
        assert_eq!(snapshot.lines[0].syllables, 5);
        assert_eq!(snapshot.next_slot(), Some(LineSlot::Two));
    }

    #[test]
    fn from_raw__takes_the_first_two_slots_when_two_are_submitted() {
        // given all three slots populated but only two submitted
        let raw = raw(
            [
                "an old silent pond",
                "a frog jumps into the pond",
                "splash, silence again",
            ],
            [author(1), author(2), author(3)],
            2,
        );

        // when
        let snapshot = DaySnapshot::from_raw(raw);

        // then slot three is ignored no matter what it holds
        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.lines[0].text, "an old silent pond");
        assert_eq!(snapshot.lines[1].text, "a frog jumps into the pond");
        assert_eq!(snapshot.lines[1].author.as_str(), author(2));
        assert_eq!(snapshot.next_slot(), Some(LineSlot::Three));
    }

    #[test]
    fn from_raw__yields_no_lines_before_the_first_submission() {
        // given placeholder content in every slot
        let raw = raw(
            ["placeholder", "placeholder", "placeholder"],
            [author(1), author(2), author(3)],
            0,
        );

        // when
        let snapshot = DaySnapshot::from_raw(raw);

        // then
        assert!(snapshot.lines.is_empty());
        assert_eq!(snapshot.submitted_count, 0);
        assert_eq!(snapshot.next_slot(), Some(LineSlot::One));
    }

    #[test]
    fn from_raw__skips_empty_line_or_zero_author_inside_the_bound() {
        // given an inconsistent read: slot two has no author, slot three no text
        let raw = raw(
            ["an old silent pond", "a frog jumps into the water", "  "],
            [author(1), author(0), author(3)],
            3,
        );

        // when
        let snapshot = DaySnapshot::from_raw(raw);

        // then
        assert_eq!(snapshot.lines.len(), 1);
        assert!(snapshot.is_complete());
    }

    #[test]
    fn from_raw__caps_submitted_count_at_three() {
        let mut raw = raw(
            ["one", "two", "three"],
            [author(1), author(2), author(3)],
            7,
        );
        raw.vote_count = 12;

        let snapshot = DaySnapshot::from_raw(raw);

        assert_eq!(snapshot.submitted_count, 3);
        assert_eq!(snapshot.vote_count, 12);
        assert_eq!(snapshot.next_slot(), None);
    }

    #[test]
    fn line_slot__follows_the_five_seven_five_pattern() {
        assert_eq!(LineSlot::One.required_syllables(), 5);
        assert_eq!(LineSlot::Two.required_syllables(), 7);
        assert_eq!(LineSlot::Three.required_syllables(), 5);
        assert_eq!(LineSlot::from_line_number(4), None);
        assert_eq!(LineSlot::from_line_number(0), None);
    }
}
