//! Time management utilities
//!
//! The [`FrameClock`] is the single source of wall-clock deltas for the engine
//! loop. [`Stopwatch`] measures short spans such as the phases of a VR frame.

use std::time::{Duration, Instant};

/// Wall-clock frame timer owned by the engine context
#[derive(Debug)]
pub struct FrameClock {
    last_tick: Instant,
    started: Instant,
    delta: f64,
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock whose first tick measures from now
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_tick: now,
            started: now,
            delta: 0.0,
            frame_count: 0,
        }
    }

    /// Advance the clock and return the seconds elapsed since the previous tick
    pub fn tick(&mut self) -> f64 {
        let now = Instant::now();
        self.delta = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
        self.frame_count += 1;
        self.delta
    }

    /// Seconds measured by the most recent tick
    pub fn delta_time(&self) -> f64 {
        self.delta
    }

    /// Seconds since the clock was created
    pub fn total_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Number of ticks so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Simple stopwatch for measuring elapsed time
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start_new()
    }
}

impl Stopwatch {
    /// Create a stopwatch that starts counting immediately
    pub fn start_new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Restart from zero
    pub fn restart(&mut self) {
        self.start_time = Instant::now();
    }

    /// Elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_millis(&self) -> f64 {
        self.elapsed().as_secs_f64() * 1000.0
    }

    /// Return the elapsed milliseconds and restart
    pub fn lap_millis(&mut self) -> f64 {
        let millis = self.elapsed_millis();
        self.restart();
        millis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_counts_ticks() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.frame_count(), 0);

        let first = clock.tick();
        let second = clock.tick();
        assert!(first >= 0.0);
        assert!(second >= 0.0);
        assert_eq!(clock.frame_count(), 2);
        assert_eq!(clock.delta_time(), second);
    }

    #[test]
    fn test_stopwatch_lap_restarts() {
        let mut stopwatch = Stopwatch::start_new();
        std::thread::sleep(Duration::from_millis(2));
        let lap = stopwatch.lap_millis();
        assert!(lap >= 2.0);
        assert!(stopwatch.elapsed_millis() < lap);
    }
}
