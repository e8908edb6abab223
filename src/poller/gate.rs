use std::time::{Duration, Instant};

/// Admission control for availability checks.
///
/// One check may run at a time, no check may start while a submitted job is
/// still unresolved, and each finished cycle arms a cooldown before the next
/// one: the full background interval after success, the shorter retry delay
/// after a failure. Manual refreshes go through [`RefreshLimiter`] on top.
#[derive(Debug)]
pub struct PollGate {
    cooldown: Duration,
    retry_delay: Duration,
    in_flight: bool,
    task_pending: bool,
    next_allowed: Option<Instant>,
}

impl PollGate {
    pub fn new(cooldown: Duration, retry_delay: Duration) -> Self {
        Self {
            cooldown,
            retry_delay,
            in_flight: false,
            task_pending: false,
            next_allowed: None,
        }
    }

    pub fn admits(&self, now: Instant) -> bool {
        !self.in_flight
            && !self.task_pending
            && self.next_allowed.map_or(true, |at| now >= at)
    }

    /// Why a check would be refused right now, if it would be.
    pub fn denial(&self, now: Instant) -> Option<SkipReason> {
        if self.in_flight {
            Some(SkipReason::CheckInFlight)
        } else if self.task_pending {
            Some(SkipReason::TaskPending)
        } else {
            match self.next_allowed {
                Some(at) if now < at => Some(SkipReason::CoolingDown {
                    remaining: at - now,
                }),
                _ => None,
            }
        }
    }

    /// Claim the in-flight slot; false when another cycle holds it.
    pub fn try_begin(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn finish_success(&mut self, now: Instant) {
        self.in_flight = false;
        self.next_allowed = Some(now + self.cooldown);
    }

    pub fn finish_error(&mut self, now: Instant) {
        self.in_flight = false;
        self.next_allowed = Some(now + self.retry_delay);
    }

    pub fn task_started(&mut self) {
        self.task_pending = true;
    }

    pub fn task_resolved(&mut self) {
        self.task_pending = false;
    }
}

/// Why a poll tick did not submit a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CheckInFlight,
    TaskPending,
    CoolingDown { remaining: Duration },
    QuietHours,
}

impl SkipReason {
    pub fn describe(&self) -> String {
        match self {
            SkipReason::CheckInFlight => "a check is already running".to_string(),
            SkipReason::TaskPending => "waiting on a submitted availability job".to_string(),
            SkipReason::CoolingDown { remaining } => {
                format!("cooling down for another {}s", remaining.as_secs())
            }
            SkipReason::QuietHours => "inside quiet hours".to_string(),
        }
    }
}

/// Rate limiter for user-triggered refreshes.
#[derive(Debug)]
pub struct RefreshLimiter {
    min_gap: Duration,
    last: Option<Instant>,
}

impl RefreshLimiter {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, last: None }
    }

    /// Record a refresh, or report how long the caller still has to wait.
    pub fn try_refresh(&mut self, now: Instant) -> Result<(), Duration> {
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_gap {
                return Err(self.min_gap - elapsed);
            }
        }
        self.last = Some(now);
        Ok(())
    }
}

/// True when the local hour falls inside the configured `[start, end)` window.
pub fn within_quiet_hours(hour: u32, quiet_hours: Option<(u32, u32)>) -> bool {
    match quiet_hours {
        Some((start, end)) => hour >= start && hour < end,
        None => false,
    }
}
