use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::headers::Credentials;
use crate::registry::{ActionTag, LoopAction, TargetKind};

pub const MIN_INTERVAL_SECS: u64 = 1;
pub const MAX_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoopInterval(u64);

impl LoopInterval {
    pub fn new(secs: u64) -> Result<Self> {
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
            return Err(Error::msg(format!(
                "loop interval must be between {MIN_INTERVAL_SECS} and {MAX_INTERVAL_SECS} seconds (got {secs})"
            )));
        }
        Ok(Self(secs))
    }

    pub fn secs(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for LoopInterval {
    fn default() -> Self {
        Self(DEFAULT_INTERVAL_SECS)
    }
}

impl fmt::Display for LoopInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the control surface lets the user type or pick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub credentials: Credentials,
    pub video_id: String,
    pub user_id: String,
    pub selected_action: LoopAction,
    pub loop_interval: LoopInterval,
}

impl FormState {
    /// The field an action reads its target from. Video and user ids are
    /// never substituted for one another.
    pub fn target_for(&self, tag: ActionTag) -> &str {
        match tag.target_kind() {
            Some(TargetKind::Video) => &self.video_id,
            Some(TargetKind::User) => &self.user_id,
            None => "",
        }
    }
}

/// Form shared between the control surface and running loop ticks.
pub type SharedForm = Arc<RwLock<FormState>>;

pub fn shared(form: FormState) -> SharedForm {
    Arc::new(RwLock::new(form))
}

/// Copy of the current form contents.
pub fn read(form: &SharedForm) -> FormState {
    match form.read() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn update<R>(form: &SharedForm, f: impl FnOnce(&mut FormState) -> R) -> R {
    match form.write() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}
