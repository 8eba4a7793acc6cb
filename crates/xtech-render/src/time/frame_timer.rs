use std::time::{Duration, Instant};

/// Classic logic tick length (~64.1 ticks per second).
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_micros(15_600);

/// Fixed-step frame timer.
///
/// All methods take `now` explicitly so the scheduling is deterministic under test.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    frame_delay: Duration,
    /// Lag after which the schedule is re-anchored instead of catching up.
    max_lag: Duration,
    next: Instant,
    frame_index: u64,
}

impl FrameTimer {
    pub fn new(frame_delay: Duration, now: Instant) -> Self {
        Self::with_max_lag(frame_delay, Duration::from_millis(250), now)
    }

    pub fn with_max_lag(frame_delay: Duration, max_lag: Duration, now: Instant) -> Self {
        debug_assert!(frame_delay <= max_lag);
        Self {
            frame_delay,
            max_lag,
            next: now,
            frame_index: 0,
        }
    }

    /// Re-anchors the schedule at `now`, e.g. after a level load stalled the loop.
    pub fn reset(&mut self, now: Instant) {
        self.next = now;
    }

    /// True when the next logic tick is due.
    ///
    /// A stall longer than `max_lag` drops the missed ticks rather than running
    /// them back to back.
    pub fn can_proceed_frame(&mut self, now: Instant) -> bool {
        let lag = now.saturating_duration_since(self.next);
        if lag > self.max_lag {
            log::debug!("frame timer: {:?} behind, resyncing", lag);
            self.next = now;
        }
        now >= self.next
    }

    /// Marks one logic tick as done and schedules the next one.
    pub fn frame_next_inc(&mut self) {
        self.next += self.frame_delay;
        self.frame_index = self.frame_index.wrapping_add(1);
    }

    /// True when logic is more than one tick behind; rendering should be skipped.
    pub fn frame_skip_needed(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.next) > self.frame_delay
    }

    /// Time left until the next tick is due (zero if it is due already).
    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }
}
