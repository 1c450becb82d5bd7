use std::time::{Duration, Instant};

/// Rolling window over the last `WINDOW` of bytes received, used by the
/// I/O-behavior verdict to estimate a throughput figure without keeping
/// every byte timestamp.
#[derive(Debug)]
pub struct IoRateWindow {
    window: Duration,
    bytes_accumulated: u64,
    window_start: Instant,
    last_bytes_per_second: f64,
}

impl IoRateWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            bytes_accumulated: 0,
            window_start: Instant::now(),
            last_bytes_per_second: 0.0,
        }
    }

    /// Record `n` freshly-received bytes, rolling the window over if its
    /// span has elapsed.
    pub fn record(&mut self, n: usize, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= self.window {
            let secs = elapsed.as_secs_f64().max(f64::EPSILON);
            self.last_bytes_per_second = self.bytes_accumulated as f64 / secs;
            self.bytes_accumulated = 0;
            self.window_start = now;
        }
        self.bytes_accumulated += n as u64;
    }

    /// Current estimate of bytes/second, using the in-progress window once
    /// it holds enough data to be meaningful.
    pub fn bytes_per_second(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed.as_millis() == 0 {
            return self.last_bytes_per_second;
        }
        let in_progress = self.bytes_accumulated as f64 / elapsed.as_secs_f64();
        in_progress.max(self.last_bytes_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_within_window() {
        let mut w = IoRateWindow::new(Duration::from_secs(2));
        let t0 = Instant::now();
        w.record(100, t0);
        w.record(50, t0 + Duration::from_millis(500));
        assert!(w.bytes_per_second(t0 + Duration::from_millis(500)) > 0.0);
    }

    #[test]
    fn rolls_window_after_elapsed() {
        let mut w = IoRateWindow::new(Duration::from_secs(2));
        let t0 = Instant::now();
        w.record(10_000, t0);
        let t1 = t0 + Duration::from_secs(3);
        w.record(1, t1);
        // the first burst should have rolled into last_bytes_per_second
        assert!(w.bytes_per_second(t1) > 0.0);
    }
}
