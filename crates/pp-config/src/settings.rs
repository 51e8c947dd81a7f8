use anyhow::{bail, Result};
use pp_schemas::DispatchMode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed view of the effective config.
///
/// Every field has a default so an empty config is valid. Values that are
/// present but of the wrong shape are rejected rather than defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSettings {
    pub dispatch_mode: DispatchMode,
    pub journal_path: Option<String>,
    pub hash_chain: bool,
    /// Name of the env var that holds the webhook URL (never the URL itself).
    pub webhook_url_env: Option<String>,
    pub daemon_addr: Option<String>,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            dispatch_mode: DispatchMode::default(),
            journal_path: None,
            hash_chain: true,
            webhook_url_env: None,
            daemon_addr: None,
        }
    }
}

impl PortalSettings {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let d = Self::default();

        let dispatch_mode = match opt_str(v, "/lifecycle/dispatch_mode")? {
            None => d.dispatch_mode,
            Some(m) => match DispatchMode::parse(&m) {
                Ok(mode) => mode,
                Err(e) => bail!("CONFIG_INVALID /lifecycle/dispatch_mode={m:?}: {e}"),
            },
        };

        let hash_chain = match v.pointer("/audit/hash_chain") {
            None | Some(Value::Null) => d.hash_chain,
            Some(Value::Bool(b)) => *b,
            Some(other) => bail!("CONFIG_INVALID /audit/hash_chain must be a bool, got {other}"),
        };

        Ok(Self {
            dispatch_mode,
            journal_path: opt_str(v, "/audit/journal_path")?,
            hash_chain,
            webhook_url_env: opt_str(v, "/notify/webhook_url_env")?,
            daemon_addr: opt_str(v, "/daemon/addr")?,
        })
    }
}

fn opt_str(v: &Value, ptr: &str) -> Result<Option<String>> {
    match v.pointer(ptr) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => bail!("CONFIG_INVALID {ptr} must be a string, got {other}"),
    }
}
