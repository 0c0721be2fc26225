//! Runs one action against the remote service and records what happened.
//!
//! The executor is the outermost point any failure can reach: validation,
//! transport and service errors all come back as an [`ActionResult`] and a
//! log entry, never as an `Err`.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::Error;
use crate::headers::{ClientIdentity, Credentials, build_headers};
use crate::log_buffer::{LogBuffer, Severity};
use crate::registry::{ActionRegistry, ActionTag, ResponseRule};
use crate::transport::{OutboundRequest, Transport, TransportResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The service answered but reported a failure.
    Failure,
    NetworkError,
    /// Rejected locally; nothing was sent.
    ValidationError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub outcome: Outcome,
    pub severity: Severity,
    pub message: String,
    pub raw_response: Option<Value>,
}

impl ActionResult {
    fn new(outcome: Outcome, severity: Severity, message: String, raw_response: Option<Value>) -> Self {
        Self {
            outcome,
            severity,
            message,
            raw_response,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

pub struct ActionExecutor {
    registry: ActionRegistry,
    identity: ClientIdentity,
    transport: Arc<dyn Transport>,
    logs: LogBuffer,
}

impl ActionExecutor {
    pub fn new(
        registry: ActionRegistry,
        identity: ClientIdentity,
        transport: Arc<dyn Transport>,
        logs: LogBuffer,
    ) -> Self {
        Self {
            registry,
            identity,
            transport,
            logs,
        }
    }

    pub fn logs(&self) -> &LogBuffer {
        &self.logs
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Appends one Info entry before dispatch and exactly one terminal entry
    /// after it. A target that fails validation yields a single Error entry
    /// and no network call.
    pub async fn execute(
        &self,
        tag: ActionTag,
        target: &str,
        credentials: &Credentials,
    ) -> ActionResult {
        if let Some(message) = validation_error(tag, target) {
            tracing::warn!(action = %tag, "{message}");
            self.logs.push(Severity::Error, message, None);
            return ActionResult::new(
                Outcome::ValidationError,
                Severity::Error,
                message.to_string(),
                None,
            );
        }

        self.logs.info(attempting_message(tag, target));

        let descriptor = self.registry.describe(tag);
        let request = OutboundRequest {
            method: descriptor.method,
            path: descriptor.path.clone(),
            headers: build_headers(credentials, &self.identity),
            body: descriptor.build_body(target),
        };
        tracing::debug!(action = %tag, path = %request.path, "dispatching action");

        let result = match self.transport.send(request).await {
            Ok(response) => classify(tag, descriptor.rule, target, response),
            Err(err) => network_error(tag, &err),
        };

        match result.outcome {
            Outcome::Success => tracing::info!(action = %tag, "{}", result.message),
            _ => tracing::warn!(action = %tag, outcome = ?result.outcome, "{}", result.message),
        }
        self.logs.push(
            result.severity,
            result.message.clone(),
            result.raw_response.clone(),
        );
        result
    }
}

fn validation_error(tag: ActionTag, target: &str) -> Option<&'static str> {
    if tag.target_kind().is_none() || !target.trim().is_empty() {
        return None;
    }
    Some(match tag {
        ActionTag::Like => "Video ID is required for liking",
        ActionTag::View => "Video ID is required for registering views",
        ActionTag::Follow => "User ID is required for following",
        ActionTag::Test => return None,
    })
}

fn attempting_message(tag: ActionTag, target: &str) -> String {
    match tag {
        ActionTag::Like => format!("Attempting to like video: {target}"),
        ActionTag::View => format!("Registering view for video: {target}"),
        ActionTag::Follow => format!("Attempting to follow user: {target}"),
        ActionTag::Test => "Testing API connection...".to_string(),
    }
}

fn success_message(tag: ActionTag, target: &str) -> String {
    match tag {
        ActionTag::Like => format!("Successfully liked video {target}"),
        ActionTag::View => format!("View registered for video {target}"),
        ActionTag::Follow => format!("Successfully followed user {target}"),
        ActionTag::Test => "API test successful - Connection established".to_string(),
    }
}

fn service_failure_message(tag: ActionTag, body: &Value) -> String {
    let reason = body
        .get("status_msg")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("Unknown error");
    match tag {
        ActionTag::Like => format!("Failed to like video: {reason}"),
        ActionTag::View => format!("Failed to register view: {reason}"),
        ActionTag::Follow => format!("Failed to follow user: {reason}"),
        ActionTag::Test => format!("API test failed: {reason}"),
    }
}

fn classify(
    tag: ActionTag,
    rule: ResponseRule,
    target: &str,
    response: TransportResponse,
) -> ActionResult {
    if rule.accepts(response.status, &response.body) {
        return ActionResult::new(
            Outcome::Success,
            Severity::Success,
            success_message(tag, target),
            Some(response.body),
        );
    }
    match rule {
        ResponseRule::TransportOnly => ActionResult::new(
            Outcome::Failure,
            Severity::Warning,
            format!("API test returned status {}", response.status),
            Some(response.body),
        ),
        ResponseRule::ServiceStatus => ActionResult::new(
            Outcome::Failure,
            Severity::Error,
            service_failure_message(tag, &response.body),
            Some(response.body),
        ),
    }
}

fn network_error(tag: ActionTag, err: &Error) -> ActionResult {
    let message = match tag {
        ActionTag::Like => format!("Network error while liking video: {err}"),
        ActionTag::View => format!("Network error while registering view: {err}"),
        ActionTag::Follow => format!("Network error while following user: {err}"),
        ActionTag::Test => format!("API test failed: {err}"),
    };
    ActionResult::new(
        Outcome::NetworkError,
        Severity::Error,
        message,
        Some(json!({ "error": err.to_string() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_applies_only_to_targeted_actions() {
        assert!(validation_error(ActionTag::Test, "").is_none());
        assert!(validation_error(ActionTag::Like, "  ").is_some());
        assert!(validation_error(ActionTag::Follow, "").is_some());
        assert!(validation_error(ActionTag::View, "7").is_none());
    }

    #[test]
    fn service_failure_falls_back_to_unknown_error() {
        let msg = service_failure_message(ActionTag::Follow, &json!({ "status_code": 5 }));
        assert_eq!(msg, "Failed to follow user: Unknown error");
        let msg = service_failure_message(
            ActionTag::Like,
            &json!({ "status_code": 5, "status_msg": "rate limited" }),
        );
        assert_eq!(msg, "Failed to like video: rate limited");
    }

    #[test]
    fn test_action_non_2xx_is_a_warning() {
        let res = classify(
            ActionTag::Test,
            ResponseRule::TransportOnly,
            "",
            TransportResponse {
                status: 401,
                body: json!({ "status_code": 8 }),
            },
        );
        assert_eq!(res.outcome, Outcome::Failure);
        assert_eq!(res.severity, Severity::Warning);
        assert_eq!(res.message, "API test returned status 401");
    }

    #[test]
    fn network_errors_are_always_error_severity() {
        for tag in ActionTag::ALL {
            let res = network_error(tag, &Error::msg("connection refused"));
            assert_eq!(res.outcome, Outcome::NetworkError);
            assert_eq!(res.severity, Severity::Error);
            assert!(res.message.contains("connection refused"));
        }
    }
}
