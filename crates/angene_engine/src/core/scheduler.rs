//! Fixed-timestep scheduler
//!
//! Wall-clock deltas are capped, accumulated, and drained in whole fixed
//! steps. Rendering is not part of the fixed step: the engine renders once
//! per tick after the updates have run.

use std::time::Duration;

/// Fixed-timestep update driver shared by every window
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    fixed_step: f64,
    max_delta: f64,
    accumulator: f64,
    total_steps: u64,
}

impl FrameScheduler {
    /// Create a scheduler
    ///
    /// # Arguments
    /// * `fixed_step` - update interval in seconds
    /// * `max_delta` - largest delta accepted from a single tick
    pub fn new(fixed_step: f64, max_delta: f64) -> Self {
        Self {
            fixed_step,
            max_delta,
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    /// Scheduler running at `fps` updates per second
    pub fn with_target_fps(fps: u32, max_delta: f64) -> Self {
        Self::new(1.0 / f64::from(fps.max(1)), max_delta)
    }

    /// Update interval in seconds
    pub const fn fixed_step(&self) -> f64 {
        self.fixed_step
    }

    /// Time carried over to the next tick
    pub const fn accumulator(&self) -> f64 {
        self.accumulator
    }

    /// Fixed steps run since creation
    pub const fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Accumulate a tick's delta and run one `update` call per whole fixed step
    ///
    /// The delta is clamped to `[0, max_delta]` first, so a long stall cannot
    /// trigger a burst of catch-up updates. The first error stops the tick and
    /// is returned; the steps already drained stay drained.
    pub fn tick<E>(&mut self, dt: f64, mut update: impl FnMut(f64) -> Result<(), E>) -> Result<u32, E> {
        let capped = dt.clamp(0.0, self.max_delta);
        if dt > self.max_delta {
            log::debug!("Frame delta {:.3}s capped to {:.3}s", dt, self.max_delta);
        }
        self.accumulator += capped;

        let mut steps = 0;
        while self.accumulator >= self.fixed_step {
            self.accumulator -= self.fixed_step;
            steps += 1;
            self.total_steps += 1;
            update(self.fixed_step)?;
        }
        Ok(steps)
    }

    /// How long to sleep after a tick that took `frame_elapsed`
    ///
    /// Sleeps only a `pacing_factor` fraction of the remaining time so the
    /// loop wakes slightly early rather than late.
    pub fn pacing_sleep(&self, frame_elapsed: Duration, pacing_factor: f64) -> Option<Duration> {
        let remaining = self.fixed_step - frame_elapsed.as_secs_f64();
        if remaining > 0.0 {
            Some(Duration::from_secs_f64(remaining * pacing_factor))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn count_steps(scheduler: &mut FrameScheduler, dt: f64) -> u32 {
        let mut calls = 0;
        let steps = scheduler
            .tick(dt, |_| {
                calls += 1;
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(steps, calls);
        steps
    }

    #[test]
    fn test_large_delta_capped_before_accumulation() {
        let mut scheduler = FrameScheduler::with_target_fps(60, 0.1);

        let first = count_steps(&mut scheduler, 0.016);
        let second = count_steps(&mut scheduler, 0.016);
        let third = count_steps(&mut scheduler, 0.2);

        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert!(third <= 6, "capped delta produced {} updates", third);
        assert!(third < 12);
    }

    #[test]
    fn test_steps_use_fixed_interval() {
        let mut scheduler = FrameScheduler::with_target_fps(50, 0.1);
        let mut seen = Vec::new();
        scheduler
            .tick(0.05, |dt| {
                seen.push(dt);
                Ok::<(), ()>(())
            })
            .unwrap();

        assert_eq!(seen.len(), 2);
        for dt in seen {
            assert_relative_eq!(dt, 0.02);
        }
        assert_relative_eq!(scheduler.accumulator(), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_delta_ignored() {
        let mut scheduler = FrameScheduler::with_target_fps(60, 0.1);
        assert_eq!(count_steps(&mut scheduler, -1.0), 0);
        assert_relative_eq!(scheduler.accumulator(), 0.0);
    }

    #[test]
    fn test_update_error_stops_tick() {
        let mut scheduler = FrameScheduler::with_target_fps(100, 0.1);
        let mut calls = 0;
        let result = scheduler.tick(0.05, |_| {
            calls += 1;
            if calls == 2 {
                Err("boom")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_pacing_sleep() {
        let scheduler = FrameScheduler::with_target_fps(50, 0.1);
        let sleep = scheduler.pacing_sleep(Duration::from_millis(10), 0.95).unwrap();
        assert_relative_eq!(sleep.as_secs_f64(), 0.0095, epsilon = 1e-6);
        assert!(scheduler.pacing_sleep(Duration::from_millis(30), 0.95).is_none());
    }
}
