use std::time::Instant;
#[cfg(test)] use mockall::automock;

/// Source of monotonic timestamps in milliseconds. Core operations take `now` as a parameter,
///  so this is only consulted by the code driving them.
#[cfg_attr(test, automock)]
pub trait MonoClock: Send + Sync + 'static {
    fn now_millis(&self) -> u64;
}

/// Milliseconds since the clock was created
pub struct SystemMonoClock {
    start: Instant,
}

impl SystemMonoClock {
    pub fn new() -> SystemMonoClock {
        SystemMonoClock {
            start: Instant::now(),
        }
    }
}

impl Default for SystemMonoClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonoClock for SystemMonoClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}
