//! pp-audit
//!
//! The append-only audit trail of an order: the [`HistoryEntry`] record, an
//! ordered read view ([`AuditTrail`]), and a JSON-Lines journal with an
//! optional SHA-256 hash chain ([`AuditWriter`]) that mirrors entries to disk
//! so tampering can be detected with [`verify_hash_chain`].

mod entry;
mod journal;
mod trail;

pub use entry::{ActionType, HistoryEntry};
pub use journal::{
    compute_record_hash, verify_hash_chain, verify_hash_chain_str, AuditWriter, JournalRecord,
    VerifyResult,
};
pub use trail::AuditTrail;
