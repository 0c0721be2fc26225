//! Outbound header construction.
//!
//! The credential fields are forwarded as a single cookie-style header. Empty
//! fields are dropped; everything else is passed through verbatim and left for
//! the remote side to accept or reject.

use serde::{Deserialize, Serialize};

/// Names of the credential fields, in the order they are written to the wire.
pub const CREDENTIAL_FIELDS: [&str; 5] = [
    "session_id",
    "session_key",
    "csrf_token",
    "auth_token",
    "device_id",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub session_id: String,
    pub session_key: String,
    pub csrf_token: String,
    pub auth_token: String,
    pub device_id: String,
}

impl Credentials {
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            (CREDENTIAL_FIELDS[0], self.session_id.as_str()),
            (CREDENTIAL_FIELDS[1], self.session_key.as_str()),
            (CREDENTIAL_FIELDS[2], self.csrf_token.as_str()),
            (CREDENTIAL_FIELDS[3], self.auth_token.as_str()),
            (CREDENTIAL_FIELDS[4], self.device_id.as_str()),
        ]
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "session_id" => Some(&mut self.session_id),
            "session_key" => Some(&mut self.session_key),
            "csrf_token" => Some(&mut self.csrf_token),
            "auth_token" => Some(&mut self.auth_token),
            "device_id" => Some(&mut self.device_id),
            _ => None,
        }
    }

    /// Same shape with every populated value replaced by a mask.
    pub fn redacted(&self) -> Self {
        let mask = |v: &str| {
            if v.is_empty() {
                String::new()
            } else {
                "***".to_string()
            }
        };
        Self {
            session_id: mask(&self.session_id),
            session_key: mask(&self.session_key),
            csrf_token: mask(&self.csrf_token),
            auth_token: mask(&self.auth_token),
            device_id: mask(&self.device_id),
        }
    }

    /// `key=value` pairs for every non-blank field, joined by `"; "`.
    pub fn cookie_string(&self) -> String {
        self.fields()
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// How the client presents itself to the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub site_url: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            site_url: String::new(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("cadence/{}", env!("CARGO_PKG_VERSION"))
}

/// Ordered header list. Kept as plain strings so building it cannot fail;
/// encoding into wire headers happens in the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub const COOKIE_HEADER: &str = "Cookie";

pub fn build_headers(credentials: &Credentials, identity: &ClientIdentity) -> HeaderSet {
    let site = identity.site_url.trim_end_matches('/');

    let mut headers = HeaderSet::default();
    headers.push("User-Agent", identity.user_agent.as_str());
    headers.push("Accept", "application/json, text/plain, */*");
    headers.push("Accept-Language", "en-US,en;q=0.9");
    headers.push("Content-Type", "application/json");
    headers.push(COOKIE_HEADER, credentials.cookie_string());
    if !site.is_empty() {
        headers.push("Referer", format!("{site}/"));
        headers.push("Origin", site);
    }
    headers.push("X-Requested-With", "XMLHttpRequest");
    headers
}
