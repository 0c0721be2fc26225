//! Repeating timer that re-runs the selected action.
//!
//! At most one timer task is alive per scheduler. The timer only schedules
//! work: every tick spawns its own executor call, so stopping the loop never
//! cancels a request that is already on the wire, and a slow request does not
//! hold back the next tick unless [`OverlapPolicy::SkipWhileBusy`] is chosen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::executor::ActionExecutor;
use crate::form::{self, LoopInterval, SharedForm};
use crate::registry::LoopAction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Every tick dispatches, even while earlier calls are still running.
    #[default]
    Allow,
    /// A tick is skipped while a loop-driven call is still running.
    SkipWhileBusy,
}

/// Owns the timer task; dropping it cancels the task.
struct LoopTimer {
    handle: JoinHandle<()>,
    action: LoopAction,
    interval: LoopInterval,
}

impl Drop for LoopTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Decrements the busy counter even if the call is torn down early.
struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct LoopScheduler {
    executor: Arc<ActionExecutor>,
    form: SharedForm,
    runtime: Handle,
    policy: OverlapPolicy,
    busy: Arc<AtomicUsize>,
    timer: Mutex<Option<LoopTimer>>,
}

impl LoopScheduler {
    pub fn new(executor: Arc<ActionExecutor>, form: SharedForm, runtime: Handle) -> Self {
        Self {
            executor,
            form,
            runtime,
            policy: OverlapPolicy::Allow,
            busy: Arc::new(AtomicUsize::new(0)),
            timer: Mutex::new(None),
        }
    }

    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn slot(&self) -> MutexGuard<'_, Option<LoopTimer>> {
        match self.timer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot().is_some()
    }

    /// Action and interval of the live loop, if any.
    pub fn current(&self) -> Option<(LoopAction, LoopInterval)> {
        self.slot().as_ref().map(|t| (t.action, t.interval))
    }

    /// Number of loop-driven calls that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.busy.load(Ordering::SeqCst)
    }

    /// Returns `false` without side effects if a loop is already running.
    ///
    /// `action` is only used for the announcement; each tick runs whatever
    /// action is selected in the form at that moment.
    pub fn start(&self, action: LoopAction, interval: LoopInterval) -> bool {
        let mut slot = self.slot();
        if slot.is_some() {
            tracing::debug!("loop already running; start ignored");
            return false;
        }

        self.executor.logs().info(format!(
            "Started loop: {action} every {interval} seconds"
        ));
        tracing::info!(%action, interval_secs = interval.secs(), "loop started");

        let handle = self.runtime.spawn(run_ticks(
            Arc::clone(&self.executor),
            Arc::clone(&self.form),
            interval.as_duration(),
            self.policy,
            Arc::clone(&self.busy),
        ));
        *slot = Some(LoopTimer {
            handle,
            action,
            interval,
        });
        true
    }

    /// Returns `false` without side effects if no loop is running.
    pub fn stop(&self) -> bool {
        let Some(timer) = self.slot().take() else {
            return false;
        };
        drop(timer);
        self.executor.logs().info("Loop stopped");
        tracing::info!("loop stopped");
        true
    }
}

async fn run_ticks(
    executor: Arc<ActionExecutor>,
    form: SharedForm,
    period: Duration,
    policy: OverlapPolicy,
    busy: Arc<AtomicUsize>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if policy == OverlapPolicy::SkipWhileBusy && busy.load(Ordering::SeqCst) > 0 {
            tracing::debug!("previous loop call still running; tick skipped");
            continue;
        }

        let current = form::read(&form);
        let tag = current.selected_action.tag();
        let target = current.target_for(tag).to_string();
        tracing::debug!(action = %tag, "loop tick");

        let guard = BusyGuard::enter(&busy);
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            let _guard = guard;
            executor.execute(tag, &target, &current.credentials).await;
        });
    }
}
