use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PAUSE_SLICE: Duration = Duration::from_millis(200);

/// A wait that can be cut short. Returns `false` when cancelled.
pub trait Pause {
    fn pause(&self, duration: Duration) -> bool;
}

/// Blocks the calling thread in short slices, checking the stop flag between them.
#[derive(Debug, Clone, Default)]
pub struct ThreadPause {
    stop: Arc<AtomicBool>,
}

impl ThreadPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop(stop: Arc<AtomicBool>) -> Self {
        Self { stop }
    }
}

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) -> bool {
        sleep_with_stop(&self.stop, duration)
    }
}

/// Records requested waits without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits
            .lock()
            .map(|waits| waits.clone())
            .unwrap_or_default()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) -> bool {
        if let Ok(mut waits) = self.waits.lock() {
            waits.push(duration);
        }
        true
    }
}

pub fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(PAUSE_SLICE);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

/// Uniform jitter in `[0, max]`. Falls back to zero if the OS RNG is unavailable.
pub fn random_jitter(max: Duration) -> Duration {
    let max_millis = max.as_millis() as u64;
    if max_millis == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0_u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    Duration::from_millis(u64::from_le_bytes(bytes) % (max_millis + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_pause_returns_immediately() {
        let stop = Arc::new(AtomicBool::new(true));
        let pause = ThreadPause::with_stop(stop);
        assert!(!pause.pause(Duration::from_secs(60)));
    }

    #[test]
    fn zero_pause_is_not_cancelled() {
        assert!(ThreadPause::new().pause(Duration::ZERO));
    }

    #[test]
    fn recording_pause_keeps_requested_waits() {
        let pause = RecordingPause::new();
        pause.pause(Duration::from_secs(10));
        pause.pause(Duration::from_secs(60));
        assert_eq!(
            pause.waits(),
            vec![Duration::from_secs(10), Duration::from_secs(60)]
        );
    }

    #[test]
    fn jitter_stays_within_bound() {
        let bound = Duration::from_millis(250);
        for _ in 0..50 {
            assert!(random_jitter(bound) <= bound);
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }
}
