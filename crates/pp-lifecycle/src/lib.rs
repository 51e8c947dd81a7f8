//! pp-lifecycle
//!
//! Order status workflow: field-completeness validation, the per-order
//! serialized transition path, deletion and packing-slip rules, and the
//! post-commit side effects (packing slip, notification, sync gating).

mod collaborators;
mod dispatcher;
mod engine;
mod error;
mod journal;
mod locks;
mod notify;
pub mod policy;
pub mod validator;

pub use dispatcher::{
    EffectFailure, EffectJob, EffectKind, EffectReport, NotificationRequest, Notifier,
    PackingSlipSeed, PackingSlipService, SideEffectDispatcher,
};
pub use engine::OrderLifecycle;
pub use error::LifecycleError;
pub use journal::AuditJournal;
pub use locks::{EffectTracker, OrderLocks};
pub use notify::{LogNotifier, WebhookNotifier};
pub use policy::{OrderPermissions, PackingSlipView};
pub use validator::{validate, MergedFields};
pub use pp_schemas::DispatchMode;
