//! Command handler modules for pp-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod audit;
pub mod order;

use std::sync::Arc;

use anyhow::{Context, Result};
use pp_config::{report_unused_keys, ConfigMode, PortalSettings, UnusedKeyPolicy};
use pp_lifecycle::{AuditJournal, LogNotifier, Notifier, WebhookNotifier};
use pp_schemas::{Actor, ActorRole};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config for the CLI. No paths means an empty config, which
/// yields [`PortalSettings::default`].
pub fn load_settings(paths: &[String]) -> Result<PortalSettings> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = if path_refs.is_empty() {
        pp_config::load_layered_yaml_from_strings(&[])?
    } else {
        pp_config::load_layered_yaml(&path_refs)?
    };

    let report = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        tracing::warn!(key = %p, mode = %report.mode, "config key is not used");
    }

    PortalSettings::from_config_json(&loaded.config_json)
}

pub fn build_notifier(settings: &PortalSettings) -> Result<Arc<dyn Notifier>> {
    if let Some(var) = &settings.webhook_url_env {
        if let Some(n) = WebhookNotifier::from_env(var)? {
            return Ok(Arc::new(n));
        }
    }
    Ok(Arc::new(LogNotifier))
}

pub fn build_journal(settings: &PortalSettings) -> Result<AuditJournal> {
    match &settings.journal_path {
        Some(path) => AuditJournal::open(path, settings.hash_chain)
            .with_context(|| format!("open audit journal {path}")),
        None => Ok(AuditJournal::disabled()),
    }
}

/// Build the acting user from `--actor-*` flags.
pub fn parse_actor(id: &str, name: &str, role: &str) -> Result<Actor> {
    let id = Uuid::parse_str(id).context("invalid --actor-id uuid")?;
    let role = ActorRole::parse(role)?;
    Ok(Actor::new(id, name, role))
}

pub fn parse_order_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).context("invalid order id uuid")
}

pub fn opt_str(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("NULL")
}
