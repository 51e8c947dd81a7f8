use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

fn write(dir: &std::path::Path, name: &str, body: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, body).expect("write yaml");
    p.to_string_lossy().to_string()
}

/// `pp config-hash` prints a stable hash: key order does not matter, an
/// override layer does.
#[test]
fn config_hash_is_order_insensitive_and_layer_sensitive() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let a = write(
        dir.path(),
        "a.yaml",
        "lifecycle:\n  dispatch_mode: inline\naudit:\n  hash_chain: true\n",
    );
    let b = write(
        dir.path(),
        "b.yaml",
        "audit:\n  hash_chain: true\nlifecycle:\n  dispatch_mode: inline\n",
    );
    let overlay = write(dir.path(), "overlay.yaml", "audit:\n  hash_chain: false\n");

    let run = |paths: &[&str]| -> anyhow::Result<String> {
        let out = Command::cargo_bin("pp")?
            .arg("config-hash")
            .args(paths)
            .output()?;
        assert!(out.status.success(), "config-hash failed: {:?}", out);
        let stdout = String::from_utf8(out.stdout)?;
        let first = stdout.lines().next().unwrap_or_default().to_string();
        Ok(first)
    };

    let ha = run(&[&a])?;
    let hb = run(&[&b])?;
    let hov = run(&[&a, &overlay])?;

    assert!(ha.starts_with("config_hash="));
    assert_eq!(ha, hb);
    assert_ne!(ha, hov);
    Ok(())
}

#[test]
fn config_hash_refuses_secret_literals() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let bad = write(
        dir.path(),
        "bad.yaml",
        "notify:\n  webhook_url_env: sk_live_0123456789abcdef\n",
    );

    Command::cargo_bin("pp")?
        .arg("config-hash")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("sk_live").not());
    Ok(())
}

#[test]
fn config_hash_requires_a_path() -> anyhow::Result<()> {
    Command::cargo_bin("pp")?
        .arg("config-hash")
        .assert()
        .failure();
    Ok(())
}
