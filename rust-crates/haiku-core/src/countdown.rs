use std::fmt;

use chrono::{
    DateTime,
    Utc,
};

/// Time remaining until the day closes, rendered as `HH:MM:SS`.
///
/// Hours wrap at 24 and everything clamps to zero once the end has passed,
/// so the widget never shows a negative countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl Countdown {
    pub fn until(end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (end - now).num_seconds().max(0);
        Countdown {
            hours: ((remaining / 3600) % 24) as u32,
            minutes: ((remaining % 3600) / 60) as u32,
            seconds: (remaining % 60) as u32,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use chrono::{
        Duration,
        TimeZone,
    };

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn until__formats_hours_minutes_seconds() {
        // given one hour, one minute, one second ahead
        let now = at(1_000_000);
        let end = now + Duration::seconds(3661);

        // then
        assert_eq!(Countdown::until(end, now).to_string(), "01:01:01");
    }

    #[test]
    fn until__clamps_to_zero_when_past() {
        let now = at(2_000_000);
        let end = now - Duration::seconds(30);
        let countdown = Countdown::until(end, now);

        assert!(countdown.is_zero());
        assert_eq!(countdown.to_string(), "00:00:00");
    }

    #[test]
    fn until__wraps_hours_at_twenty_four() {
        let now = at(0);
        let end = now + Duration::hours(25) + Duration::minutes(5);

        assert_eq!(Countdown::until(end, now).to_string(), "01:05:00");
    }
}
