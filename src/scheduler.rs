//! Single-flight execution of update runs and the triggers that request them.
//!
//! At most one run executes at a time. Requests arriving while a run is in
//! progress collapse into a single follow-up run started as soon as the
//! current one finishes.

use crate::error::Result;
use crate::scm::SourceControl;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    RunningWithPendingRerun,
}

/// The work performed by one scheduled run.
#[async_trait]
pub trait RunBody: Send + Sync {
    async fn execute(&self) -> Result<()>;
}

pub struct UpdateScheduler {
    state: Mutex<RunState>,
    body: Arc<dyn RunBody>,
}

/// Returns the scheduler to `Idle` however the running future ends.
struct IdleGuard<'a> {
    scheduler: &'a UpdateScheduler,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        *self.scheduler.lock() = RunState::Idle;
    }
}

impl UpdateScheduler {
    pub fn new(body: Arc<dyn RunBody>) -> Self {
        Self {
            state: Mutex::new(RunState::Idle),
            body,
        }
    }

    pub fn state(&self) -> RunState {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a run, or marks a rerun as pending if one is already executing.
    ///
    /// Returns `true` when this call executed the run (and any reruns
    /// requested meanwhile), `false` when it was coalesced into another.
    pub async fn request_run(&self) -> bool {
        if !self.try_start() {
            tracing::info!("Update already in progress, scheduled another iteration");
            return false;
        }

        let _guard = IdleGuard { scheduler: self };
        loop {
            self.execute_once().await;
            if !self.take_pending() {
                break;
            }
            tracing::info!("Executing deferred update");
        }
        true
    }

    fn try_start(&self) -> bool {
        let mut state = self.lock();
        match *state {
            RunState::Idle => {
                *state = RunState::Running;
                true
            }
            RunState::Running | RunState::RunningWithPendingRerun => {
                *state = RunState::RunningWithPendingRerun;
                false
            }
        }
    }

    /// Consumes a pending rerun, or goes idle when there is none.
    fn take_pending(&self) -> bool {
        let mut state = self.lock();
        if *state == RunState::RunningWithPendingRerun {
            *state = RunState::Running;
            true
        } else {
            *state = RunState::Idle;
            false
        }
    }

    async fn execute_once(&self) {
        tracing::info!("Starting update");
        match AssertUnwindSafe(self.body.execute()).catch_unwind().await {
            Ok(Ok(())) => tracing::info!("Update finished"),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to execute update"),
            Err(panic) => {
                tracing::error!(panic = panic_message(panic.as_ref()), "Update panicked")
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Requests a run every `interval`, the first one immediately.
pub fn spawn_periodic(scheduler: Arc<UpdateScheduler>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            tracing::debug!("Scheduled update tick");
            let scheduler = scheduler.clone();
            tokio::spawn(async move {
                scheduler.request_run().await;
            });
        }
    })
}

/// Turns bursts of pushes to the main branch into one run after a quiet period.
pub struct PushDebouncer {
    main_ref: String,
    quiet_period: Duration,
    scheduler: Arc<UpdateScheduler>,
    generation: Arc<AtomicU64>,
}

impl PushDebouncer {
    pub fn new(scheduler: Arc<UpdateScheduler>, main_branch: &str, quiet_period: Duration) -> Self {
        Self {
            main_ref: format!("refs/heads/{main_branch}"),
            quiet_period,
            scheduler,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a push to `git_ref`. Returns whether it was accepted.
    pub fn notify(&self, git_ref: &str) -> bool {
        if git_ref != self.main_ref {
            tracing::debug!(git_ref, "Ignoring push outside the main branch");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = self.generation.clone();
        let scheduler = self.scheduler.clone();
        let quiet_period = self.quiet_period;
        tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            if latest.load(Ordering::SeqCst) == generation {
                scheduler.request_run().await;
            }
        });
        true
    }
}

/// Polls the main branch head and reports every move as a push.
pub fn watch_main_branch(
    scm: Arc<dyn SourceControl>,
    main_branch: String,
    poll_interval: Duration,
    debouncer: Arc<PushDebouncer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let git_ref = format!("refs/heads/{main_branch}");
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen: Option<String> = None;
        loop {
            ticker.tick().await;
            match scm.find_branch(&main_branch).await {
                Ok(Some(branch)) => {
                    if last_seen.as_ref().is_some_and(|head| head != &branch.head) {
                        tracing::info!(head = %branch.head, "Received push on {git_ref}");
                        debouncer.notify(&git_ref);
                    }
                    last_seen = Some(branch.head);
                }
                Ok(None) => tracing::warn!(branch = %main_branch, "Main branch not found"),
                Err(e) => tracing::warn!(error = %e, "Failed to poll main branch"),
            }
        }
    })
}
