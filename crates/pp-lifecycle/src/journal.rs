use anyhow::Result;
use pp_audit::{AuditWriter, HistoryEntry};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Optional JSONL mirror of committed history entries.
///
/// The store remains the source of truth. Mirroring is best-effort: a write
/// failure is logged and the request carries on.
#[derive(Clone, Default)]
pub struct AuditJournal {
    writer: Option<Arc<Mutex<AuditWriter>>>,
}

impl AuditJournal {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open (or resume) the journal at `path`.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let writer = AuditWriter::open(path, hash_chain)?;
        Ok(Self {
            writer: Some(Arc::new(Mutex::new(writer))),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn mirror(&self, entries: &[HistoryEntry]) {
        let Some(writer) = &self.writer else {
            return;
        };
        let mut w = writer.lock().unwrap_or_else(|p| p.into_inner());
        for e in entries {
            if let Err(err) = w.append(e) {
                warn!(
                    order_id = %e.order_id,
                    action_type = %e.action_type,
                    error = %format!("{err:#}"),
                    "audit journal append failed"
                );
            }
        }
    }
}
