// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use super::orchestrator::Orchestrator;
use crate::store::Settings;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Shortest period accepted for background checks
pub const MIN_INTERVAL_MINUTES: u32 = 15;

/// The check periods offered to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInterval {
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    SixHours,
}

impl CheckInterval {
    pub const ALL: &'static [CheckInterval] = &[
        CheckInterval::FifteenMinutes,
        CheckInterval::ThirtyMinutes,
        CheckInterval::OneHour,
        CheckInterval::SixHours,
    ];

    pub fn minutes(&self) -> u32 {
        match self {
            CheckInterval::FifteenMinutes => 15,
            CheckInterval::ThirtyMinutes => 30,
            CheckInterval::OneHour => 60,
            CheckInterval::SixHours => 360,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckInterval::FifteenMinutes => "15m",
            CheckInterval::ThirtyMinutes => "30m",
            CheckInterval::OneHour => "1h",
            CheckInterval::SixHours => "6h",
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<CheckInterval> {
        Self::ALL.iter().copied().find(|i| i.minutes() == minutes)
    }
}

impl fmt::Display for CheckInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for an arbitrary period in minutes
pub fn interval_label(minutes: u32) -> String {
    match CheckInterval::from_minutes(minutes) {
        Some(i) => i.label().to_string(),
        None => format!("{minutes} minutes"),
    }
}

/// The effective period for a requested number of minutes
pub fn effective_interval(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes.max(MIN_INTERVAL_MINUTES)) * 60)
}

/// Exponential retry delays
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(5 * 60 * 60))
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// The delay before the next retry; each call doubles the following one
    pub fn next_delay(&mut self) -> Duration {
        let d = self.next;
        self.next = (self.next * 2).min(self.max);
        d
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// Handle used to poke or stop a running [`Scheduler`]
#[derive(Debug)]
pub struct SchedulerHandle {
    trigger: Arc<Notify>,
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Ask for a check as soon as possible.  Requests made while one is
    /// pending collapse into a single check.
    pub fn check_now(&self) {
        self.trigger.notify_one();
    }

    /// Stop the scheduler, cancelling a check in flight
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// How often a running scheduler looks for changed settings
pub const SETTINGS_POLL: Duration = Duration::from_secs(60);

enum Wake {
    OnDemand,
    Due,
    SettingsPoll,
}

/// Runs checks periodically, on demand and after retry-worthy failures,
/// never more than one at a time.
///
/// The first check runs immediately.  A failed check is retried with
/// exponential backoff, but never later than the next periodic check.  A
/// failure that retrying cannot fix waits for the next periodic check.
///
/// The saved settings are re-read every [`SETTINGS_POLL`]; a new interval
/// or refresh switch reschedules the next periodic check from the last one.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    periodic: bool,
    backoff: Backoff,
    trigger: Arc<Notify>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    /// A scheduler starting with the interval and refresh switch of
    /// `settings`
    pub fn new(orchestrator: Arc<Orchestrator>, settings: &Settings) -> (Scheduler, SchedulerHandle) {
        let trigger = Arc::new(Notify::new());
        let (tx, rx) = watch::channel(false);

        let s = Scheduler {
            orchestrator,
            interval: effective_interval(settings.check_interval_minutes),
            periodic: settings.widget_refresh_enabled,
            backoff: Backoff::default(),
            trigger: trigger.clone(),
            shutdown: rx,
        };

        (
            s,
            SchedulerHandle {
                trigger,
                shutdown: tx,
            },
        )
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run until [`SchedulerHandle::shutdown`] is called or the handle is
    /// dropped
    pub async fn run(mut self) {
        info!(
            interval = ?self.interval,
            periodic = self.periodic,
            "scheduler started"
        );

        let mut last_tick = Instant::now();
        let mut next_tick = self.periodic.then_some(last_tick);
        let mut retry_at: Option<Instant> = None;
        let mut poll_at = last_tick + SETTINGS_POLL;

        loop {
            let due = match (retry_at, next_tick) {
                (Some(r), Some(t)) => Some(r.min(t)),
                (r, t) => r.or(t),
            };

            let wake = tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = self.trigger.notified() => Wake::OnDemand,
                _ = sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => Wake::Due,
                _ = sleep_until(poll_at) => Wake::SettingsPoll,
            };

            let on_demand = match wake {
                Wake::SettingsPoll => {
                    poll_at = Instant::now() + SETTINGS_POLL;
                    if self.reload_settings().await {
                        next_tick = self.periodic.then(|| last_tick + self.interval);
                        retry_at = match (retry_at, next_tick) {
                            (Some(r), Some(t)) => Some(r.min(t)),
                            (r, _) => r,
                        };
                    }
                    continue;
                }
                Wake::OnDemand => true,
                Wake::Due => false,
            };

            if let Some(t) = next_tick {
                if !on_demand && Instant::now() >= t {
                    last_tick = Instant::now();
                    next_tick = Some(last_tick + self.interval);
                }
            }

            debug!(on_demand, "starting check");

            let res = tokio::select! {
                r = self.orchestrator.run() => r,
                _ = self.shutdown.changed() => {
                    info!("check cancelled");
                    break;
                }
            };

            retry_at = match res {
                Ok(_) => {
                    self.backoff.reset();
                    None
                }
                Err(e) if e.is_retryable() => {
                    let at = Instant::now() + self.backoff.next_delay();
                    let at = next_tick.map_or(at, |t| at.min(t));
                    debug!(retry_in = ?(at - Instant::now()), "check will be retried");
                    Some(at)
                }
                Err(e) => {
                    warn!(error = %e, "check failed, not retrying");
                    self.backoff.reset();
                    None
                }
            };
        }

        info!("scheduler stopped");
    }

    // true if the interval or the refresh switch changed
    async fn reload_settings(&mut self) -> bool {
        let settings = match self.orchestrator.settings().await {
            Ok(s) => s,
            Err(e) => {
                debug!(error = %e, "settings unreadable, keeping schedule");
                return false;
            }
        };

        let interval = effective_interval(settings.check_interval_minutes);
        let periodic = settings.widget_refresh_enabled;

        if interval == self.interval && periodic == self.periodic {
            return false;
        }

        info!(interval = ?interval, periodic, "schedule changed");
        self.interval = interval;
        self.periodic = periodic;

        true
    }
}
