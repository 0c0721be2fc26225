use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use toml::Value;

use crate::error::{Error, Result};
use crate::form::{DEFAULT_INTERVAL_SECS, FormState, LoopInterval};
use crate::headers::{CREDENTIAL_FIELDS, ClientIdentity, Credentials, default_user_agent};
use crate::registry::{Endpoints, LoopAction};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const ENV_PREFIX: &str = "CADENCE_";

#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<defaults>"),
            value: Value::Table(Default::default()),
        }
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }

        let mut cur = &self.value;
        for seg in path.split('.') {
            let tbl = cur.as_table()?;
            cur = tbl.get(seg)?;
        }
        Some(cur)
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(v) = self.value_path(path) else {
            return Ok(None);
        };
        let parsed = v.clone().try_into().map_err(|e| {
            Error::msg(format!(
                "invalid config at '{}' in {}: {e}",
                path,
                self.path.display()
            ))
        })?;
        Ok(Some(parsed))
    }
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn parse_imports(path: &Path, value: &Value) -> Result<Vec<String>> {
    let Some(arr) = value.get("imports").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for v in arr {
        let Some(s) = v.as_str() else {
            return Err(Error::msg(format!(
                "invalid imports entry in {} (expected string)",
                path.display()
            )));
        };
        let s = s.trim();
        if !s.is_empty() {
            out.push(s.to_string());
        }
    }
    Ok(out)
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "config import cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    // Parent first, then imports in order, then the file itself.
    let mut out = Value::Table(Default::default());
    if let Some(ext) = value.get("extends").and_then(Value::as_str) {
        out = load_value_inner(&resolve_ref_path(path, ext), stack)?;
    }
    for imp in parse_imports(path, &value)? {
        let loaded = load_value_inner(&resolve_ref_path(path, &imp), stack)?;
        merge_values(&mut out, loaded);
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
        tbl.remove("imports");
    }
    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Origin/Referer marker. Empty means `base_url`.
    pub site_url: String,
    /// Empty means `cadence/<version>`.
    pub user_agent: String,
    pub endpoints: Endpoints,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            site_url: String::new(),
            user_agent: String::new(),
            endpoints: Endpoints::default(),
        }
    }
}

impl ServiceConfig {
    pub fn identity(&self) -> ClientIdentity {
        let site_url = if self.site_url.trim().is_empty() {
            self.base_url.clone()
        } else {
            self.site_url.clone()
        };
        let user_agent = if self.user_agent.trim().is_empty() {
            default_user_agent()
        } else {
            self.user_agent.clone()
        };
        ClientIdentity {
            user_agent,
            site_url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub video_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub action: LoopAction,
    pub interval_secs: u64,
    pub single_flight: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            action: LoopAction::default(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            single_flight: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub credentials: Credentials,
    pub form: FormConfig,
    #[serde(rename = "loop")]
    pub looping: LoopConfig,
}

impl Settings {
    pub fn from_doc(doc: &ConfigDoc) -> Result<Self> {
        let settings = Self {
            service: doc.deserialize_path("service")?.unwrap_or_default(),
            credentials: doc.deserialize_path("credentials")?.unwrap_or_default(),
            form: doc.deserialize_path("form")?.unwrap_or_default(),
            looping: doc.deserialize_path("loop")?.unwrap_or_default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path` (or defaults), then apply `.env` and `CADENCE_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let doc = match path {
            Some(p) => load(p)?,
            None => ConfigDoc::empty(),
        };
        let mut settings = Self::from_doc(&doc)?;
        // A missing .env file is normal.
        let _ = dotenv::dotenv();
        settings.apply_env(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup(&format!("{ENV_PREFIX}BASE_URL")) {
            self.service.base_url = v;
        }
        if let Some(v) = lookup(&format!("{ENV_PREFIX}SITE_URL")) {
            self.service.site_url = v;
        }
        for field in CREDENTIAL_FIELDS {
            let key = format!("{ENV_PREFIX}{}", field.to_ascii_uppercase());
            if let (Some(v), Some(slot)) = (lookup(&key), self.credentials.field_mut(field)) {
                *slot = v;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.base_url.trim().is_empty() {
            return Err(Error::msg("service.base_url must not be empty"));
        }
        LoopInterval::new(self.looping.interval_secs)
            .map_err(|e| Error::msg(format!("loop.interval_secs: {e}")))?;
        Ok(())
    }

    pub fn initial_form(&self) -> Result<FormState> {
        Ok(FormState {
            credentials: self.credentials.clone(),
            video_id: self.form.video_id.clone(),
            user_id: self.form.user_id.clone(),
            selected_action: self.looping.action,
            loop_interval: LoopInterval::new(self.looping.interval_secs)?,
        })
    }

    /// TOML rendering with credential values masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.credentials = self.credentials.redacted();
        toml::to_string_pretty(&shown)
            .map_err(|e| Error::msg(format!("failed to render config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn doc(src: &str) -> ConfigDoc {
        ConfigDoc {
            path: PathBuf::from("<mem>"),
            value: toml::from_str(src).unwrap(),
        }
    }

    #[test]
    fn defaults_apply_when_sections_are_missing() {
        let s = Settings::from_doc(&ConfigDoc::empty()).unwrap();
        assert_eq!(s.service.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.looping.interval_secs, 5);
        assert_eq!(s.looping.action, LoopAction::Like);
        assert!(!s.looping.single_flight);
    }

    #[test]
    fn loop_action_rejects_test() {
        let err = Settings::from_doc(&doc("[loop]\naction = \"test\"\n")).unwrap_err();
        assert!(err.to_string().contains("loop"));
    }

    #[test]
    fn interval_out_of_range_is_rejected() {
        assert!(Settings::from_doc(&doc("[loop]\ninterval_secs = 0\n")).is_err());
        assert!(Settings::from_doc(&doc("[loop]\ninterval_secs = 3601\n")).is_err());
        assert!(Settings::from_doc(&doc("[loop]\ninterval_secs = 3600\n")).is_ok());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut s = Settings::from_doc(&doc(
            "[credentials]\nsession_id = \"file\"\n[service]\nbase_url = \"http://file\"\n",
        ))
        .unwrap();
        let env: HashMap<&str, &str> = [
            ("CADENCE_SESSION_ID", "env"),
            ("CADENCE_DEVICE_ID", "dev"),
            ("CADENCE_BASE_URL", "http://env"),
        ]
        .into_iter()
        .collect();
        s.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.credentials.session_id, "env");
        assert_eq!(s.credentials.device_id, "dev");
        assert_eq!(s.service.base_url, "http://env");
    }

    #[test]
    fn identity_falls_back_to_base_url_and_crate_agent() {
        let svc = ServiceConfig::default();
        let id = svc.identity();
        assert_eq!(id.site_url, DEFAULT_BASE_URL);
        assert!(id.user_agent.starts_with("cadence/"));
    }

    #[test]
    fn redacted_output_hides_secrets() {
        let mut s = Settings::default();
        s.credentials.auth_token = "hunter2".into();
        let out = s.to_redacted_toml().unwrap();
        assert!(!out.contains("hunter2"));
        assert!(out.contains("[loop]"));
    }

    #[test]
    fn extends_and_imports_merge_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.toml"),
            "[service]\nbase_url = \"http://base\"\n[loop]\ninterval_secs = 30\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("creds.toml"),
            "[credentials]\ncsrf_token = \"c\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("main.toml"),
            "extends = \"base.toml\"\nimports = [\"creds.toml\"]\n[loop]\ninterval_secs = 10\n",
        )
        .unwrap();

        let d = load(&dir.path().join("main.toml")).unwrap();
        let s = Settings::from_doc(&d).unwrap();
        assert_eq!(s.service.base_url, "http://base");
        assert_eq!(s.credentials.csrf_token, "c");
        assert_eq!(s.looping.interval_secs, 10);
    }

    #[test]
    fn import_cycles_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.toml"), "extends = \"b.toml\"\n").unwrap();
        fs::write(dir.path().join("b.toml"), "extends = \"a.toml\"\n").unwrap();
        let err = load(&dir.path().join("a.toml")).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
