//! Availability polling, consolidated.
//!
//! The original client ran an uncoordinated timer per mounted screen; here a
//! single poller owns the gate, the cooldowns, and the per-date status map,
//! and every caller (background loop, manual refresh, CLI) goes through it.

mod gate;

pub use gate::{within_quiet_hours, PollGate, RefreshLimiter, SkipReason};

use crate::api::{ApiClient, ApiError, DateCheckRequest, TaskState};
use crate::config::PollConfig;
use crate::domain::{DateStatus, SlotDate};
use crate::store::{ProfileStore, StoreError};
use chrono::{Local, Timelike};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no profile stored; log in first")]
    MissingProfile,
    #[error("stored profile has no {0}")]
    IncompleteProfile(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh throttled; try again in {}s", .retry_in.as_secs())]
    Throttled { retry_in: std::time::Duration },
    #[error(transparent)]
    Poll(#[from] PollError),
}

/// Outcome of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A job was submitted; the id can be handed to [`AvailabilityPoller::watch_task`].
    Started { task_id: String, dates: Vec<SlotDate> },
    Skipped(SkipReason),
}

/// Owns the repeating check cycle and the transient per-date status map.
pub struct AvailabilityPoller<S> {
    api: Arc<ApiClient>,
    store: Arc<S>,
    config: PollConfig,
    gate: Mutex<PollGate>,
    refresh: Mutex<RefreshLimiter>,
    statuses: Mutex<BTreeMap<SlotDate, DateStatus>>,
}

impl<S: ProfileStore> AvailabilityPoller<S> {
    pub fn new(api: Arc<ApiClient>, store: Arc<S>, config: PollConfig) -> Self {
        let gate = PollGate::new(config.background_interval, config.retry_delay);
        let refresh = RefreshLimiter::new(config.refresh_cooldown);
        Self {
            api,
            store,
            config,
            gate: Mutex::new(gate),
            refresh: Mutex::new(refresh),
            statuses: Mutex::new(BTreeMap::new()),
        }
    }

    /// Snapshot of the per-date statuses from the latest cycle.
    pub fn statuses(&self) -> BTreeMap<SlotDate, DateStatus> {
        self.statuses.lock().expect("status mutex poisoned").clone()
    }

    /// Attempt one check cycle. With `force` the cooldown is bypassed; quiet
    /// hours and an unresolved job still refuse the attempt.
    pub async fn poll_once(&self, force: bool) -> Result<PollOutcome, PollError> {
        if within_quiet_hours(Local::now().hour(), self.config.quiet_hours) {
            debug!("availability check skipped: quiet hours");
            return Ok(PollOutcome::Skipped(SkipReason::QuietHours));
        }

        {
            let mut gate = self.gate.lock().expect("gate mutex poisoned");
            if let Some(reason) = gate.denial(Instant::now()) {
                let bypassable = matches!(reason, SkipReason::CoolingDown { .. });
                if !(force && bypassable) {
                    debug!("availability check skipped: {}", reason.describe());
                    return Ok(PollOutcome::Skipped(reason));
                }
            }
            if !gate.try_begin() {
                return Ok(PollOutcome::Skipped(SkipReason::CheckInFlight));
            }
        }

        let result = self.run_cycle().await;
        let mut gate = self.gate.lock().expect("gate mutex poisoned");
        match result {
            Ok((task_id, dates)) => {
                gate.task_started();
                gate.finish_success(Instant::now());
                info!(%task_id, "availability check submitted");
                Ok(PollOutcome::Started { task_id, dates })
            }
            Err(err) => {
                gate.finish_error(Instant::now());
                Err(err)
            }
        }
    }

    /// The cycle proper: cached identity, fresh server record, job submission.
    async fn run_cycle(&self) -> Result<(String, Vec<SlotDate>), PollError> {
        let cached = self.store.load()?.ok_or(PollError::MissingProfile)?;
        let license_number = cached
            .license_number
            .clone()
            .ok_or(PollError::IncompleteProfile("licence number"))?;
        let user_id = cached
            .user_id
            .clone()
            .ok_or(PollError::IncompleteProfile("user id"))?;

        // The server's copy is authoritative for centres and availability;
        // another device may have changed them since the blob was written.
        let user = self.api.get_user(&license_number).await?;
        let application_ref = user
            .application_ref
            .ok_or(PollError::IncompleteProfile("application reference"))?;
        if user.selected_centres.is_empty() {
            return Err(PollError::IncompleteProfile("selected centres"));
        }
        let dates: Vec<SlotDate> = user.availability.keys().copied().collect();
        if dates.is_empty() {
            return Err(PollError::IncompleteProfile("availability dates"));
        }

        let response = self
            .api
            .start_date_check(&DateCheckRequest {
                license_number,
                application_ref,
                selected_dates: dates.clone(),
                selected_centres: user.selected_centres,
                user_id,
            })
            .await?;

        let mut statuses = self.statuses.lock().expect("status mutex poisoned");
        for date in &dates {
            statuses.insert(*date, DateStatus::Pending);
        }

        Ok((response.task_id, dates))
    }

    /// Follow a submitted job until it resolves, then fold the results into
    /// the status map. A transport failure abandons the job: the affected
    /// dates are marked errored and the next cycle starts a fresh one.
    pub async fn watch_task(&self, task_id: &str, dates: &[SlotDate]) {
        loop {
            tokio::time::sleep(self.config.task_poll_interval).await;

            let status = match self.api.date_task_status(task_id).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(%task_id, error = %err, "lost contact with availability job");
                    self.apply_statuses(dates, |_| DateStatus::Error);
                    break;
                }
            };

            match status.status {
                TaskState::Pending => continue,
                TaskState::Completed => {
                    let results = status.results.unwrap_or_default();
                    self.apply_statuses(dates, |date| match results.get(date) {
                        Some(slots) if !slots.is_empty() => DateStatus::Available {
                            time_slots: slots.clone(),
                        },
                        _ => DateStatus::Unavailable,
                    });
                    info!(%task_id, "availability job completed");
                    break;
                }
                TaskState::Failed => {
                    self.apply_statuses(dates, |_| DateStatus::Unavailable);
                    warn!(%task_id, "availability job failed");
                    break;
                }
            }
        }

        self.gate
            .lock()
            .expect("gate mutex poisoned")
            .task_resolved();
    }

    fn apply_statuses(&self, dates: &[SlotDate], status_for: impl Fn(&SlotDate) -> DateStatus) {
        let mut statuses = self.statuses.lock().expect("status mutex poisoned");
        for date in dates {
            statuses.insert(*date, status_for(date));
        }
    }

    /// User-triggered refresh, rate limited independently of the gate.
    pub async fn refresh(&self) -> Result<PollOutcome, RefreshError> {
        {
            let mut limiter = self.refresh.lock().expect("refresh mutex poisoned");
            if let Err(retry_in) = limiter.try_refresh(Instant::now()) {
                return Err(RefreshError::Throttled { retry_in });
            }
        }
        Ok(self.poll_once(true).await?)
    }

    /// Background loop: an immediate attempt, then one per interval. Cycle
    /// failures are logged and absorbed; the retry delay is already armed.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.background_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.poll_once(false).await {
                Ok(PollOutcome::Started { task_id, dates }) => {
                    self.watch_task(&task_id, &dates).await;
                }
                Ok(PollOutcome::Skipped(reason)) => {
                    debug!("poll tick skipped: {}", reason.describe());
                }
                Err(err) => {
                    warn!(error = %err, "availability check failed; waiting for retry window");
                }
            }
        }
    }
}
