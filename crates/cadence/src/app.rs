//! Control surface: the entry points a front end wires its buttons and
//! fields to, plus read-only views of the log and loop state.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::executor::{ActionExecutor, ActionResult};
use crate::form::{self, FormState, LoopInterval, SharedForm};
use crate::log_buffer::{LogBuffer, LogEntry, LogSink};
use crate::registry::{ActionRegistry, ActionTag, LoopAction};
use crate::scheduler::{LoopScheduler, OverlapPolicy};
use crate::transport::{HttpTransport, Transport};

pub struct App {
    form: SharedForm,
    executor: Arc<ActionExecutor>,
    scheduler: LoopScheduler,
    logs: LogBuffer,
}

impl App {
    /// Wires an app against the HTTP service described by `settings`.
    /// Must be called from within a tokio runtime.
    pub fn from_settings(settings: &Settings, sink: Option<Arc<dyn LogSink>>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(settings.service.base_url.clone())?);
        Self::with_transport(settings, transport, sink)
    }

    pub fn with_transport(
        settings: &Settings,
        transport: Arc<dyn Transport>,
        sink: Option<Arc<dyn LogSink>>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::msg(format!("no tokio runtime available: {e}")))?;

        let mut logs = LogBuffer::new();
        if let Some(sink) = sink {
            logs = logs.with_sink(sink);
        }
        let executor = Arc::new(ActionExecutor::new(
            ActionRegistry::new(&settings.service.endpoints),
            settings.service.identity(),
            transport,
            logs.clone(),
        ));
        let form = form::shared(settings.initial_form()?);
        let policy = if settings.looping.single_flight {
            OverlapPolicy::SkipWhileBusy
        } else {
            OverlapPolicy::Allow
        };
        let scheduler = LoopScheduler::new(Arc::clone(&executor), Arc::clone(&form), runtime)
            .with_policy(policy);

        Ok(Self {
            form,
            executor,
            scheduler,
            logs,
        })
    }

    async fn run(&self, tag: ActionTag) -> ActionResult {
        let current = form::read(&self.form);
        self.executor
            .execute(tag, current.target_for(tag), &current.credentials)
            .await
    }

    pub async fn on_like(&self) -> ActionResult {
        self.run(ActionTag::Like).await
    }

    pub async fn on_view(&self) -> ActionResult {
        self.run(ActionTag::View).await
    }

    pub async fn on_follow(&self) -> ActionResult {
        self.run(ActionTag::Follow).await
    }

    pub async fn on_test(&self) -> ActionResult {
        self.run(ActionTag::Test).await
    }

    pub async fn on_action(&self, tag: ActionTag) -> ActionResult {
        self.run(tag).await
    }

    /// Starts looping the selected action at the selected interval.
    /// Returns `false` if a loop is already running.
    pub fn on_start_loop(&self) -> bool {
        let current = form::read(&self.form);
        self.scheduler
            .start(current.selected_action, current.loop_interval)
    }

    pub fn on_stop_loop(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn on_clear_logs(&self) {
        self.logs.clear();
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.snapshot()
    }

    pub fn is_looping(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Loop-driven calls still waiting on the service.
    pub fn loop_calls_in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    pub fn selected_action(&self) -> LoopAction {
        form::read(&self.form).selected_action
    }

    pub fn loop_interval_seconds(&self) -> u64 {
        form::read(&self.form).loop_interval.secs()
    }

    pub fn form(&self) -> FormState {
        form::read(&self.form)
    }

    pub fn set_video_id(&self, id: impl Into<String>) {
        let id = id.into();
        form::update(&self.form, |f| f.video_id = id);
    }

    pub fn set_user_id(&self, id: impl Into<String>) {
        let id = id.into();
        form::update(&self.form, |f| f.user_id = id);
    }

    pub fn set_credential(&self, field: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        form::update(&self.form, |f| match f.credentials.field_mut(field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::msg(format!("unknown credential field '{field}'"))),
        })
    }

    pub fn select_action(&self, action: LoopAction) {
        form::update(&self.form, |f| f.selected_action = action);
    }

    pub fn set_loop_interval(&self, secs: u64) -> Result<()> {
        let interval = LoopInterval::new(secs)?;
        form::update(&self.form, |f| f.loop_interval = interval);
        Ok(())
    }
}
