use assert_cmd::prelude::*;
use pp_audit::{AuditWriter, HistoryEntry};
use pp_schemas::{Actor, ActorRole, OrderStatus};
use predicates::prelude::*;
use serde_json::json;
use std::process::Command;
use uuid::Uuid;

fn write_journal(path: &std::path::Path) -> anyhow::Result<()> {
    let admin = Actor::new(Uuid::new_v4(), "Ops Admin", ActorRole::Admin);
    let order_id = Uuid::new_v4();
    let mut w = AuditWriter::new(path, true)?;
    w.append(&HistoryEntry::order_created(order_id, OrderStatus::Open, &admin))?;
    w.append(&HistoryEntry::status_change(
        order_id,
        OrderStatus::Open,
        OrderStatus::InProcess,
        &admin,
        None,
        json!({"so_number": {"from": null, "to": "SO-100"}}),
    ))?;
    Ok(())
}

#[test]
fn intact_journal_verifies() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_journal(&path)?;

    Command::cargo_bin("pp")?
        .args(["audit", "verify"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("chain_valid=true lines=2"));
    Ok(())
}

#[test]
fn edited_journal_fails_verification() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("audit.jsonl");
    write_journal(&path)?;

    let tampered = std::fs::read_to_string(&path)?.replace("SO-100", "SO-999");
    std::fs::write(&path, tampered)?;

    Command::cargo_bin("pp")?
        .args(["audit", "verify"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("chain_valid=false line=2"))
        .stderr(predicate::str::contains("AUDIT_CHAIN_BROKEN"));
    Ok(())
}

#[test]
fn order_commands_need_a_database() -> anyhow::Result<()> {
    Command::cargo_bin("pp")?
        .env_remove(pp_db::ENV_DB_URL)
        .args(["order", "show"])
        .arg(Uuid::new_v4().to_string())
        .assert()
        .failure()
        .stderr(predicate::str::contains("PP_DATABASE_URL"));
    Ok(())
}
