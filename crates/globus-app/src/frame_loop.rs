//! Frame pacing for the headless driver.
//!
//! Each tick stamps the frame with the milliseconds elapsed since the loop
//! started. Frame timestamps drive geometry expiry, so they must never run
//! backwards even if the clock does.

use std::time::{Duration, Instant};

use tracing::warn;

/// Frames slower than this are reported.
pub const SLOW_FRAME: Duration = Duration::from_millis(250);

pub struct FrameLoop {
    start: Instant,
    last_timestamp_ms: u64,
    last_elapsed: Duration,
    frame_count: u64,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_timestamp_ms: 0,
            last_elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Run one frame at the current wall-clock time.
    pub fn tick<T>(&mut self, render_fn: impl FnOnce(u64) -> T) -> T {
        let elapsed = self.start.elapsed();
        self.advance(elapsed, render_fn)
    }

    /// Run one frame `elapsed` after the loop started.
    pub fn advance<T>(&mut self, elapsed: Duration, render_fn: impl FnOnce(u64) -> T) -> T {
        let frame_time = elapsed.saturating_sub(self.last_elapsed);
        if self.frame_count > 0 && frame_time > SLOW_FRAME {
            warn!(
                "Frame time {:.1}ms exceeds {:.1}ms",
                frame_time.as_secs_f64() * 1000.0,
                SLOW_FRAME.as_secs_f64() * 1000.0
            );
        }
        self.last_elapsed = self.last_elapsed.max(elapsed);

        let timestamp_ms = (elapsed.as_millis() as u64).max(self.last_timestamp_ms);
        self.last_timestamp_ms = timestamp_ms;
        let result = render_fn(timestamp_ms);
        self.frame_count += 1;
        result
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn last_timestamp_ms(&self) -> u64 {
        self.last_timestamp_ms
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The render function sees the elapsed milliseconds.
    #[test]
    fn test_timestamp_is_elapsed_millis() {
        let mut frames = FrameLoop::new();
        let t = frames.advance(Duration::from_millis(16), |t| t);
        assert_eq!(t, 16);
        let t = frames.advance(Duration::from_millis(33), |t| t);
        assert_eq!(t, 33);
        assert_eq!(frames.frame_count(), 2);
    }

    /// A clock that steps backwards does not rewind the timestamp.
    #[test]
    fn test_timestamps_are_monotonic() {
        let mut frames = FrameLoop::new();
        frames.advance(Duration::from_millis(100), |_| ());
        let t = frames.advance(Duration::from_millis(40), |t| t);
        assert_eq!(t, 100);
        assert_eq!(frames.last_timestamp_ms(), 100);
    }

    /// The render function runs exactly once per tick.
    #[test]
    fn test_render_called_once_per_tick() {
        let mut frames = FrameLoop::new();
        let mut calls = 0;
        for i in 0..5 {
            frames.advance(Duration::from_millis(i * 500), |_| calls += 1);
        }
        assert_eq!(calls, 5);
        assert_eq!(frames.frame_count(), 5);
    }

    /// The wall-clock tick starts near zero.
    #[test]
    fn test_tick_uses_wall_clock() {
        let mut frames = FrameLoop::new();
        let t = frames.tick(|t| t);
        assert!(t < 1000);
    }
}
