//! Builds the lifecycle from config and environment.

use std::sync::Arc;

use anyhow::{Context, Result};
use pp_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, ConfigMode,
    LoadedConfig, PortalSettings, UnusedKeyPolicy,
};
use pp_db::{MemoryStore, PgStore};
use pp_lifecycle::{AuditJournal, LogNotifier, Notifier, OrderLifecycle, WebhookNotifier};
use tracing::{info, warn};

/// Comma-separated list of YAML files, later files override earlier ones.
pub const ENV_CONFIG_PATHS: &str = "PP_CONFIG";

/// Load the layered config named by `PP_CONFIG` (empty config when unset),
/// warn about keys the daemon never reads, and return the typed view.
pub fn load_settings(mode: ConfigMode) -> Result<(LoadedConfig, PortalSettings)> {
    let raw = std::env::var(ENV_CONFIG_PATHS).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let loaded = if paths.is_empty() {
        load_layered_yaml_from_strings(&[])?
    } else {
        load_layered_yaml(&paths)?
    };

    let report = report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for p in &report.unused_leaf_pointers {
        warn!(key = %p, mode = %report.mode, "config key is not used");
    }

    let settings = PortalSettings::from_config_json(&loaded.config_json)?;
    info!(
        config_hash = %loaded.config_hash,
        files = paths.len(),
        dispatch_mode = %settings.dispatch_mode,
        "config loaded"
    );
    Ok((loaded, settings))
}

/// Webhook notifier when the configured env var holds a URL, log-only
/// otherwise.
pub fn build_notifier(settings: &PortalSettings) -> Result<Arc<dyn Notifier>> {
    if let Some(var) = &settings.webhook_url_env {
        if let Some(n) = WebhookNotifier::from_env(var)? {
            info!(env = %var, "notifications via webhook");
            return Ok(Arc::new(n));
        }
        warn!(env = %var, "webhook env var is empty; notifications are log-only");
    }
    Ok(Arc::new(LogNotifier))
}

pub fn build_journal(settings: &PortalSettings) -> Result<AuditJournal> {
    match &settings.journal_path {
        Some(path) => {
            let j = AuditJournal::open(path, settings.hash_chain)
                .with_context(|| format!("open audit journal {path}"))?;
            info!(path = %path, hash_chain = settings.hash_chain, "audit journal enabled");
            Ok(j)
        }
        None => Ok(AuditJournal::disabled()),
    }
}

/// Postgres-backed lifecycle when `PP_DATABASE_URL` is set, in-memory
/// otherwise (orders vanish on restart).
pub async fn build_lifecycle(settings: &PortalSettings) -> Result<OrderLifecycle> {
    let notifier = build_notifier(settings)?;
    let journal = build_journal(settings)?;

    let lifecycle = if std::env::var(pp_db::ENV_DB_URL).is_ok() {
        let pool = pp_db::connect_from_env().await?;
        pp_db::migrate(&pool).await?;
        let store = Arc::new(PgStore::new(pool));
        info!("order store: postgres");
        OrderLifecycle::new(store.clone(), notifier, store)
    } else {
        warn!(
            "{} not set; using the in-memory order store (data is lost on restart)",
            pp_db::ENV_DB_URL
        );
        let store = Arc::new(MemoryStore::new());
        OrderLifecycle::new(store.clone(), notifier, store)
    };

    Ok(lifecycle.with_mode(settings.dispatch_mode).with_journal(journal))
}
