use std::time::{Duration, Instant};

/// Wall-clock stopwatch.
///
/// `tic` arms it; each `toc` records the time since the last `tic` and
/// returns either that interval or the running average over all `toc`s.
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
    total: Duration,
    calls: u32,
    diff: Duration,
}

impl Timer {
    pub fn new() -> Timer {
        Timer { start: Instant::now(), total: Duration::ZERO, calls: 0, diff: Duration::ZERO }
    }

    pub fn tic(&mut self) {
        self.start = Instant::now();
    }

    /// Seconds since the last `tic`, or the average interval if `average`.
    pub fn toc(&mut self, average: bool) -> f64 {
        self.diff = self.start.elapsed();
        self.total += self.diff;
        self.calls += 1;
        if average {
            self.average_time()
        } else {
            self.diff.as_secs_f64()
        }
    }

    pub fn average_time(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.total.as_secs_f64() / self.calls as f64
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}
