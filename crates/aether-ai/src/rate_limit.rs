//! Sliding-window admission control.
//!
//! Three windows (minute, hour, day) each hold the instants of recent
//! admissions. A request is admitted only if every window has room, and
//! is then recorded in all three within the same critical section.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Minute,
    Hour,
    Day,
}

impl Window {
    fn span(self) -> Duration {
        match self {
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(60 * 60),
            Window::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Window::Minute => "minute",
            Window::Hour => "hour",
            Window::Day => "day",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Rate limit exceeded: Too many requests per {window}")]
pub struct AdmissionError {
    pub window: Window,
}

#[derive(Debug)]
struct RateWindow {
    window: Window,
    capacity: usize,
    stamps: VecDeque<Instant>,
}

impl RateWindow {
    fn new(window: Window, capacity: u32) -> Self {
        Self {
            window,
            capacity: capacity as usize,
            stamps: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: Instant) {
        let span = self.window.span();
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= span {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn has_room(&self) -> bool {
        self.stamps.len() < self.capacity
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<[RateWindow; 3]>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(5, 50, 250)
    }
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32, per_day: u32) -> Self {
        Self {
            windows: Mutex::new([
                RateWindow::new(Window::Minute, per_minute),
                RateWindow::new(Window::Hour, per_hour),
                RateWindow::new(Window::Day, per_day),
            ]),
        }
    }

    pub fn admit(&self) -> Result<(), AdmissionError> {
        self.admit_at(Instant::now())
    }

    /// Admission check against an explicit clock reading.
    pub fn admit_at(&self, now: Instant) -> Result<(), AdmissionError> {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        for window in windows.iter_mut() {
            window.prune(now);
        }
        // Ordered minute, hour, day: the first full window is the tightest.
        if let Some(full) = windows.iter().find(|w| !w.has_room()) {
            let err = AdmissionError { window: full.window };
            warn!("{err}");
            return Err(err);
        }
        for window in windows.iter_mut() {
            window.stamps.push_back(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_request_in_a_minute_is_rejected() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(limiter.admit_at(t0 + Duration::from_secs(i)).is_ok());
        }
        let err = limiter.admit_at(t0 + Duration::from_secs(10)).unwrap_err();
        assert_eq!(err.window, Window::Minute);
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded: Too many requests per minute"
        );
    }

    #[test]
    fn readmitted_once_oldest_ages_out() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        for i in 0..5 {
            limiter.admit_at(t0 + Duration::from_secs(i)).unwrap();
        }
        assert!(limiter.admit_at(t0 + Duration::from_secs(59)).is_err());
        assert!(limiter.admit_at(t0 + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn rejections_are_not_recorded() {
        let limiter = RateLimiter::new(1, 10, 10);
        let t0 = Instant::now();
        limiter.admit_at(t0).unwrap();
        for s in 1..30 {
            assert!(limiter.admit_at(t0 + Duration::from_secs(s)).is_err());
        }
        // Only the first admission counts toward the hour.
        assert!(limiter.admit_at(t0 + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn hour_window_reported_when_minute_has_room() {
        let limiter = RateLimiter::new(5, 3, 250);
        let t0 = Instant::now();
        for m in 0..3 {
            limiter.admit_at(t0 + Duration::from_secs(m * 120)).unwrap();
        }
        let err = limiter
            .admit_at(t0 + Duration::from_secs(10 * 60))
            .unwrap_err();
        assert_eq!(err.window, Window::Hour);
    }

    #[test]
    fn day_window() {
        let limiter = RateLimiter::new(10, 10, 2);
        let t0 = Instant::now();
        limiter.admit_at(t0).unwrap();
        limiter.admit_at(t0 + Duration::from_secs(2 * 3600)).unwrap();
        let err = limiter
            .admit_at(t0 + Duration::from_secs(4 * 3600))
            .unwrap_err();
        assert_eq!(err.window, Window::Day);
        assert!(limiter
            .admit_at(t0 + Duration::from_secs(24 * 3600))
            .is_ok());
    }

    #[test]
    fn concurrent_admissions_never_exceed_capacity() {
        use std::sync::Arc;
        let limiter = Arc::new(RateLimiter::new(5, 50, 250));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.admit().is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 5);
    }
}
