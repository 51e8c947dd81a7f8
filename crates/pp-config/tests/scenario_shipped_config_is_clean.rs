use pp_config::{report_unused_keys, ConfigMode, PortalSettings, UnusedKeyPolicy};
use pp_schemas::DispatchMode;

fn base_yaml() -> String {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../config/base.yaml")
        .to_string_lossy()
        .to_string()
}

/// The checked-in base config must load, carry no unread keys for the daemon,
/// and parse into settings.
#[test]
fn base_config_loads_clean_for_daemon() -> anyhow::Result<()> {
    let path = base_yaml();
    let loaded = pp_config::load_layered_yaml(&[path.as_str()])?;

    let report = report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Fail)?;
    assert!(report.is_clean());

    let s = PortalSettings::from_config_json(&loaded.config_json)?;
    assert_eq!(s.dispatch_mode, DispatchMode::Background);
    assert_eq!(s.webhook_url_env.as_deref(), Some("PP_NOTIFY_WEBHOOK_URL"));
    assert_eq!(s.daemon_addr.as_deref(), Some("127.0.0.1:8899"));
    Ok(())
}

/// The CLI never reads `daemon.addr`, so the same file reports it as unused.
#[test]
fn base_config_flags_daemon_addr_for_cli() -> anyhow::Result<()> {
    let path = base_yaml();
    let loaded = pp_config::load_layered_yaml(&[path.as_str()])?;

    let report = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    assert_eq!(report.unused_leaf_pointers, vec!["/daemon/addr".to_string()]);

    let err = report_unused_keys(ConfigMode::Cli, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
    Ok(())
}
