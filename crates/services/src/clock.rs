use bson::DateTime;
use parking_lot::Mutex;

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime>,
}

impl ManualClock {
    pub fn new(start: DateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now = DateTime::from_millis(now.timestamp_millis() + by.num_milliseconds());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime {
        *self.now.lock()
    }
}
