//! Rotation scheduler (spec §4.8).
//!
//! Grounded on `services/alert_scheduler_service.rs`'s `AlertSchedulerService`:
//! a periodic pass over a work list, aggregating per-item outcomes and
//! logging failures with `tracing::error!` rather than aborting the pass.
//! Timezone handling uses a plain UTC offset rather than pulling in
//! `chrono-tz`, since the teacher's own stack has no IANA timezone database
//! dependency anywhere (see DESIGN.md).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Identity;
use crate::lifecycle::LifecycleManager;

/// A local-time window, expressed as a fixed UTC offset rather than an IANA
/// zone name. `start >= end` means the window wraps midnight.
#[derive(Debug, Clone, Copy)]
pub struct RotationWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub utc_offset_minutes: i32,
}

impl RotationWindow {
    pub fn admits(&self, now_utc: DateTime<Utc>) -> bool {
        let local_time = (now_utc + Duration::minutes(self.utc_offset_minutes as i64)).time();
        if self.start < self.end {
            local_time >= self.start && local_time <= self.end
        } else {
            local_time >= self.start || local_time <= self.end
        }
    }
}

#[derive(Debug, Clone)]
pub struct RotationSchedule {
    pub secret_id: Uuid,
    pub next_rotation: DateTime<Utc>,
    pub rotation_window: Option<RotationWindow>,
    pub max_retries: u32,
    pub retry_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Cleared once `retry_count` reaches `max_retries`: the schedule has
    /// surfaced its failure notification and is excluded from future passes
    /// until re-armed (spec §4.8 "stop retrying").
    pub active: bool,
}

impl RotationSchedule {
    pub fn new(secret_id: Uuid, max_retries: u32) -> Self {
        Self {
            secret_id,
            next_rotation: Utc::now(),
            rotation_window: None,
            max_retries,
            retry_count: 0,
            last_attempt: None,
            last_error: None,
            active: true,
        }
    }

    pub fn with_window(mut self, window: RotationWindow) -> Self {
        self.rotation_window = Some(window);
        self
    }

    /// Resets retry state and re-activates a schedule that stopped after
    /// exhausting its retries, e.g. once an operator has addressed the
    /// underlying failure.
    pub fn rearm(&mut self, next_rotation: DateTime<Utc>) {
        self.active = true;
        self.retry_count = 0;
        self.last_error = None;
        self.next_rotation = next_rotation;
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.next_rotation <= now
            && self.rotation_window.map(|w| w.admits(now)).unwrap_or(true)
    }
}

#[derive(Default, Clone, Copy)]
pub struct SchedulerRunStats {
    pub rotations_attempted: u32,
    pub rotations_succeeded: u32,
    pub rotations_failed: u32,
    pub retries_exhausted: u32,
}

pub struct RotationScheduler {
    lifecycle: Arc<LifecycleManager>,
    schedules: Arc<RwLock<HashMap<Uuid, RotationSchedule>>>,
    max_concurrent_rotations: usize,
    default_rotation_interval: Duration,
    scheduler_actor: Identity,
}

impl RotationScheduler {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        max_concurrent_rotations: usize,
        default_rotation_days: i64,
        scheduler_actor: Identity,
    ) -> Self {
        Self {
            lifecycle,
            schedules: Arc::new(RwLock::new(HashMap::new())),
            max_concurrent_rotations,
            default_rotation_interval: Duration::days(default_rotation_days),
            scheduler_actor,
        }
    }

    pub async fn register_schedule(&self, schedule: RotationSchedule) {
        self.schedules.write().await.insert(schedule.secret_id, schedule);
    }

    pub async fn deregister_schedule(&self, secret_id: Uuid) {
        self.schedules.write().await.remove(&secret_id);
    }

    pub async fn schedule_for(&self, secret_id: Uuid) -> Option<RotationSchedule> {
        self.schedules.read().await.get(&secret_id).cloned()
    }

    /// Runs a single pass: at most `max_concurrent_rotations` due schedules
    /// are rotated; the rest wait for the next pass.
    pub async fn run_once(&self) -> SchedulerRunStats {
        let now = Utc::now();
        let due: Vec<Uuid> = {
            let schedules = self.schedules.read().await;
            schedules
                .values()
                .filter(|s| s.is_due(now))
                .take(self.max_concurrent_rotations)
                .map(|s| s.secret_id)
                .collect()
        };

        let mut stats = SchedulerRunStats::default();
        for secret_id in due {
            stats.rotations_attempted += 1;
            let outcome = self.lifecycle.rotate(secret_id, &self.scheduler_actor).await;

            let mut schedules = self.schedules.write().await;
            let Some(schedule) = schedules.get_mut(&secret_id) else {
                continue;
            };
            schedule.last_attempt = Some(Utc::now());

            match outcome {
                Ok(_) => {
                    schedule.next_rotation = Utc::now() + self.default_rotation_interval;
                    schedule.retry_count = 0;
                    schedule.last_error = None;
                    stats.rotations_succeeded += 1;
                }
                Err(e) => {
                    stats.rotations_failed += 1;
                    schedule.retry_count += 1;
                    schedule.last_error = Some(e.to_string());

                    if schedule.retry_count >= schedule.max_retries {
                        stats.retries_exhausted += 1;
                        schedule.active = false;
                        tracing::error!(
                            secret_id = %secret_id,
                            retry_count = schedule.retry_count,
                            error = %e,
                            "rotation retries exhausted; surfacing failure notification and stopping retries"
                        );
                    } else {
                        let backoff_minutes = 2i64.saturating_pow(schedule.retry_count);
                        schedule.next_rotation = Utc::now() + Duration::minutes(backoff_minutes);
                        tracing::warn!(
                            secret_id = %secret_id,
                            retry_count = schedule.retry_count,
                            backoff_minutes,
                            error = %e,
                            "rotation failed, rescheduled with backoff"
                        );
                    }
                }
            }
        }

        stats
    }

    /// Spawns a background task that calls [`Self::run_once`] on a fixed
    /// interval. Mirrors the teacher's `SessionManager`/token-blacklist
    /// cleanup loops: one `tokio::spawn` owning the periodic timer.
    pub fn spawn(self: Arc<Self>, check_interval: StdDuration) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(check_interval).await;
                let stats = self.run_once().await;
                if stats.rotations_attempted > 0 {
                    tracing::info!(
                        attempted = stats.rotations_attempted,
                        succeeded = stats.rotations_succeeded,
                        failed = stats.rotations_failed,
                        "rotation scheduler pass complete"
                    );
                }
            }
        });
    }
}
