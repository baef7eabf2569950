use chrono::{
    DateTime,
    Duration,
    Utc,
};

/// Maps wall-clock instants to game day ids.
///
/// Day ids are derived from a fixed epoch and day length only; every caller
/// that needs "today" or "yesterday" goes through this type so the two can
/// never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClock {
    epoch: DateTime<Utc>,
    day_len: Duration,
}

impl Default for DayClock {
    fn default() -> Self {
        DayClock {
            epoch: DateTime::UNIX_EPOCH,
            day_len: Duration::hours(24),
        }
    }
}

impl DayClock {
    pub fn new(epoch: DateTime<Utc>, day_len: Duration) -> Self {
        DayClock { epoch, day_len }
    }

    pub fn day_id(&self, now: DateTime<Utc>) -> u64 {
        let elapsed = (now - self.epoch).num_seconds().max(0);
        (elapsed / self.day_len.num_seconds()) as u64
    }

    /// The id of the previous day, `None` on day zero.
    pub fn yesterday_id(&self, now: DateTime<Utc>) -> Option<u64> {
        self.day_id(now).checked_sub(1)
    }

    /// The instant the current day closes.
    pub fn day_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next = self.day_id(now) as i64 + 1;
        self.epoch + Duration::seconds(self.day_len.num_seconds() * next)
    }
}
