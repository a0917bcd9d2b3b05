//! Per-frame timing for the VR pipeline
//!
//! Each submitted or skipped frame records three phases: how long the wait
//! blocked, how long the eyes took to render, and how long submission took.
//! A rolling window keeps the recent samples for percentile statistics.

use std::collections::VecDeque;
use std::time::Duration;

/// Rolling frame timing samples
#[derive(Debug, Clone)]
pub struct FrameTiming {
    wait_ms: VecDeque<f64>,
    render_ms: VecDeque<f64>,
    submit_ms: VecDeque<f64>,
    total_ms: VecDeque<f64>,
    window_size: usize,
    total_frames: u64,
    missed_frames: u64,
    skipped_frames: u64,
    budget_ms: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(600, 11.1)
    }
}

impl FrameTiming {
    /// Create a timing window of `window_size` samples against a frame budget
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        let window_size = window_size.max(1);
        Self {
            wait_ms: VecDeque::with_capacity(window_size),
            render_ms: VecDeque::with_capacity(window_size),
            submit_ms: VecDeque::with_capacity(window_size),
            total_ms: VecDeque::with_capacity(window_size),
            window_size,
            total_frames: 0,
            missed_frames: 0,
            skipped_frames: 0,
            budget_ms,
        }
    }

    /// Record one frame's phases
    pub fn record_frame(&mut self, wait: Duration, render: Duration, submit: Duration) {
        let wait = wait.as_secs_f64() * 1000.0;
        let render = render.as_secs_f64() * 1000.0;
        let submit = submit.as_secs_f64() * 1000.0;
        let total = wait + render + submit;

        push_sample(&mut self.wait_ms, wait, self.window_size);
        push_sample(&mut self.render_ms, render, self.window_size);
        push_sample(&mut self.submit_ms, submit, self.window_size);
        push_sample(&mut self.total_ms, total, self.window_size);

        self.total_frames += 1;
        if total > self.budget_ms {
            self.missed_frames += 1;
        }
    }

    /// Count a frame that never reached submission
    pub fn record_skipped(&mut self) {
        self.skipped_frames += 1;
    }

    /// Frames recorded so far
    pub const fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Frames over budget
    pub const fn missed_frames(&self) -> u64 {
        self.missed_frames
    }

    /// Frames skipped before submission
    pub const fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    /// Samples currently in the window
    pub fn sample_count(&self) -> usize {
        self.total_ms.len()
    }

    /// Percentile statistics over the current window
    pub fn stats(&self) -> FrameTimingStats {
        let wait = sorted(&self.wait_ms);
        let render = sorted(&self.render_ms);
        let submit = sorted(&self.submit_ms);
        let total = sorted(&self.total_ms);

        let total_p50 = percentile(&total, 50.0);
        FrameTimingStats {
            wait_p50: percentile(&wait, 50.0),
            render_p50: percentile(&render, 50.0),
            render_p99: percentile(&render, 99.0),
            submit_p50: percentile(&submit, 50.0),
            total_p50,
            total_p95: percentile(&total, 95.0),
            total_p99: percentile(&total, 99.0),
            fps: if total_p50 > 0.0 { 1000.0 / total_p50 } else { 0.0 },
            missed_pct: if self.total_frames > 0 {
                self.missed_frames as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
            missed_frames: self.missed_frames,
            skipped_frames: self.skipped_frames,
        }
    }

    /// One-line summary for periodic diagnostics
    pub fn summary(&self) -> String {
        let s = self.stats();
        format!(
            "frames={} skipped={} missed={:.1}% wait p50={:.1}ms render p50={:.1}ms submit p50={:.1}ms total p99={:.1}ms",
            s.total_frames, s.skipped_frames, s.missed_pct, s.wait_p50, s.render_p50, s.submit_p50, s.total_p99
        )
    }
}

fn push_sample(samples: &mut VecDeque<f64>, value: f64, window_size: usize) {
    samples.push_back(value);
    while samples.len() > window_size {
        samples.pop_front();
    }
}

fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
    let mut values: Vec<f64> = samples.iter().copied().collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Statistics computed from a [`FrameTiming`] window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTimingStats {
    /// Median wait time
    pub wait_p50: f64,
    /// Median render time
    pub render_p50: f64,
    /// 99th percentile render time
    pub render_p99: f64,
    /// Median submit time
    pub submit_p50: f64,
    /// Median total time
    pub total_p50: f64,
    /// 95th percentile total time
    pub total_p95: f64,
    /// 99th percentile total time
    pub total_p99: f64,
    /// Frames per second implied by the median
    pub fps: f64,
    /// Share of frames over budget
    pub missed_pct: f64,
    /// Frames recorded
    pub total_frames: u64,
    /// Frames over budget
    pub missed_frames: u64,
    /// Frames skipped before submission
    pub skipped_frames: u64,
}
