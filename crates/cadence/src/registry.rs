//! Static mapping from an action to the request it sends and the rule used to
//! judge the response.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionTag {
    Like,
    View,
    Follow,
    Test,
}

impl ActionTag {
    pub const ALL: [ActionTag; 4] = [
        ActionTag::Like,
        ActionTag::View,
        ActionTag::Follow,
        ActionTag::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::Like => "like",
            ActionTag::View => "view",
            ActionTag::Follow => "follow",
            ActionTag::Test => "test",
        }
    }

    /// Which form field supplies the target, if any.
    pub fn target_kind(self) -> Option<TargetKind> {
        match self {
            ActionTag::Like | ActionTag::View => Some(TargetKind::Video),
            ActionTag::Follow => Some(TargetKind::User),
            ActionTag::Test => None,
        }
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(ActionTag::Like),
            "view" => Ok(ActionTag::View),
            "follow" => Ok(ActionTag::Follow),
            "test" => Ok(ActionTag::Test),
            other => Err(Error::msg(format!(
                "unknown action '{other}' (expected like, view, follow or test)"
            ))),
        }
    }
}

/// The actions a loop may repeat. Test is a manual diagnostic only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopAction {
    #[default]
    Like,
    View,
    Follow,
}

impl LoopAction {
    pub fn tag(self) -> ActionTag {
        match self {
            LoopAction::Like => ActionTag::Like,
            LoopAction::View => ActionTag::View,
            LoopAction::Follow => ActionTag::Follow,
        }
    }
}

impl From<LoopAction> for ActionTag {
    fn from(action: LoopAction) -> Self {
        action.tag()
    }
}

impl TryFrom<ActionTag> for LoopAction {
    type Error = Error;

    fn try_from(tag: ActionTag) -> Result<Self> {
        match tag {
            ActionTag::Like => Ok(LoopAction::Like),
            ActionTag::View => Ok(LoopAction::View),
            ActionTag::Follow => Ok(LoopAction::Follow),
            ActionTag::Test => Err(Error::msg("the test action cannot be looped")),
        }
    }
}

impl FromStr for LoopAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LoopAction::try_from(s.parse::<ActionTag>()?)
    }
}

impl fmt::Display for LoopAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Video,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseRule {
    /// 2xx and `status_code == 0` in the body.
    ServiceStatus,
    /// 2xx only; anything else is downgraded to a warning.
    TransportOnly,
}

/// `status_code` value the service uses for "no error".
pub const STATUS_OK: i64 = 0;

impl ResponseRule {
    pub fn accepts(self, http_status: u16, body: &Value) -> bool {
        let transport_ok = (200..300).contains(&http_status);
        match self {
            ResponseRule::TransportOnly => transport_ok,
            ResponseRule::ServiceStatus => {
                transport_ok && body.get("status_code").and_then(Value::as_i64) == Some(STATUS_OK)
            }
        }
    }
}

pub type BodyBuilder = fn(&str) -> Option<Value>;

#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub tag: ActionTag,
    pub method: Method,
    pub path: String,
    pub body: BodyBuilder,
    pub rule: ResponseRule,
}

impl RequestDescriptor {
    pub fn build_body(&self, target: &str) -> Option<Value> {
        (self.body)(target)
    }
}

fn like_body(target: &str) -> Option<Value> {
    Some(json!({ "targetId": target, "directionFlag": 1, "channel": 3 }))
}

fn view_body(target: &str) -> Option<Value> {
    Some(json!({ "targetId": target, "playDelta": 1 }))
}

fn follow_body(target: &str) -> Option<Value> {
    Some(json!({ "userId": target, "directionFlag": 1, "from": 19 }))
}

fn no_body(_target: &str) -> Option<Value> {
    None
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub like: String,
    pub view: String,
    pub follow: String,
    pub profile: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            like: "/api/v1/like".into(),
            view: "/api/v1/stats".into(),
            follow: "/api/v1/follow".into(),
            profile: "/api/v1/profile".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionRegistry {
    descriptors: BTreeMap<ActionTag, RequestDescriptor>,
}

impl ActionRegistry {
    pub fn new(endpoints: &Endpoints) -> Self {
        let mut descriptors = BTreeMap::new();
        let mut add = |tag, method, path: &str, body: BodyBuilder, rule| {
            descriptors.insert(
                tag,
                RequestDescriptor {
                    tag,
                    method,
                    path: path.to_string(),
                    body,
                    rule,
                },
            );
        };
        add(
            ActionTag::Like,
            Method::Post,
            &endpoints.like,
            like_body,
            ResponseRule::ServiceStatus,
        );
        add(
            ActionTag::View,
            Method::Post,
            &endpoints.view,
            view_body,
            ResponseRule::ServiceStatus,
        );
        add(
            ActionTag::Follow,
            Method::Post,
            &endpoints.follow,
            follow_body,
            ResponseRule::ServiceStatus,
        );
        add(
            ActionTag::Test,
            Method::Get,
            &endpoints.profile,
            no_body,
            ResponseRule::TransportOnly,
        );
        Self { descriptors }
    }

    pub fn describe(&self, tag: ActionTag) -> &RequestDescriptor {
        // Every tag is registered in `new`.
        &self.descriptors[&tag]
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new(&Endpoints::default())
    }
}
