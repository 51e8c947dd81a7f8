//! Post-commit side effects.
//!
//! Runs only after a transition is durably committed. Each effect is
//! independent: one failing never stops the others, and no failure reaches the
//! caller of `request_transition`. Failures are logged and collected in the
//! [`EffectReport`].

use anyhow::{Context, Result};
use chrono::Utc;
use pp_audit::HistoryEntry;
use pp_db::OrderStore;
use pp_schemas::{Actor, NotificationKind, Order, OrderStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::journal::AuditJournal;
use crate::policy;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub order_id: Uuid,
    pub kind: NotificationKind,
    pub status: OrderStatus,
    /// Custom body supplied with the transition; `None` means the default text.
    pub message: Option<String>,
}

/// Outbound notification channel (email relay, webhook, ...).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, req: &NotificationRequest) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingSlipSeed {
    pub order_id: Uuid,
    pub invoice_number: Option<String>,
    pub so_number: Option<String>,
    pub actor_id: Uuid,
}

/// Creates the packing-slip record for an order.
///
/// Must be idempotent per order: returns `Ok(false)` when the order already
/// has a slip instead of creating a second one.
#[async_trait::async_trait]
pub trait PackingSlipService: Send + Sync {
    async fn create(&self, seed: &PackingSlipSeed) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// Job / report
// ---------------------------------------------------------------------------

/// A committed transition whose effects still have to run.
#[derive(Debug, Clone)]
pub struct EffectJob {
    /// Snapshot as committed.
    pub order: Order,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: Actor,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    PackingSlip,
    Notification,
    NotificationAudit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectFailure {
    pub kind: EffectKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectReport {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Snapshot after the effects ran (packing-slip flag included).
    pub order: Order,
    /// Set only when the notification was delivered.
    pub notification: Option<NotificationKind>,
    pub packing_slip_created: bool,
    pub netsuite_ready: bool,
    pub failures: Vec<EffectFailure>,
}

impl EffectReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, kind: EffectKind, err: &anyhow::Error) {
        warn!(
            order_id = %self.order.id,
            from = %self.from,
            to = %self.to,
            effect = ?kind,
            error = %format!("{err:#}"),
            "side effect failed"
        );
        self.failures.push(EffectFailure {
            kind,
            message: format!("{err:#}"),
        });
    }
}

// ---------------------------------------------------------------------------
// SideEffectDispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SideEffectDispatcher {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
    slips: Arc<dyn PackingSlipService>,
    journal: AuditJournal,
}

impl SideEffectDispatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
        slips: Arc<dyn PackingSlipService>,
    ) -> Self {
        Self {
            store,
            notifier,
            slips,
            journal: AuditJournal::disabled(),
        }
    }

    pub(crate) fn set_journal(&mut self, journal: AuditJournal) {
        self.journal = journal;
    }

    pub async fn dispatch(&self, job: EffectJob) -> EffectReport {
        let EffectJob {
            order,
            from,
            to,
            actor,
            message,
        } = job;

        let mut report = EffectReport {
            from,
            to,
            order,
            notification: None,
            packing_slip_created: false,
            netsuite_ready: false,
            failures: Vec::new(),
        };

        if to == OrderStatus::Ready && !report.order.packing_slip_generated {
            let mut order = report.order.clone();
            match self.ensure_packing_slip(&mut order, &actor, true).await {
                Ok(created) => {
                    report.packing_slip_created = created;
                    report.order = order;
                }
                Err(e) => report.fail(EffectKind::PackingSlip, &e),
            }
        }

        if let Some(kind) = NotificationKind::for_status(to) {
            let req = NotificationRequest {
                order_id: report.order.id,
                kind,
                status: to,
                message,
            };
            match self.notifier.send(&req).await {
                Ok(()) => {
                    report.notification = Some(kind);
                    // Only In Process deliveries are recorded in the history.
                    if to == OrderStatus::InProcess {
                        let entry = HistoryEntry::notification_sent(report.order.id, &actor, kind, to);
                        match self.store.append_history(&entry).await {
                            Ok(()) => self.journal.mirror(&[entry]),
                            Err(e) => report.fail(
                                EffectKind::NotificationAudit,
                                &e.context("append notification_sent entry"),
                            ),
                        }
                    }
                }
                Err(e) => report.fail(EffectKind::Notification, &e),
            }
        }

        if matches!(to, OrderStatus::Ready | OrderStatus::Done) {
            report.netsuite_ready = policy::netsuite_ready(&report.order);
            info!(
                order_id = %report.order.id,
                netsuite_ready = report.netsuite_ready,
                "netsuite sync gate evaluated"
            );
        }

        debug!(
            order_id = %report.order.id,
            from = %from,
            to = %to,
            failures = report.failures.len(),
            "side effects finished"
        );
        report
    }

    /// Create the packing slip if the order does not have one yet, then set
    /// the flag and record a `packing_slip_created` entry in one commit.
    ///
    /// Returns `Ok(false)` when the flag was already set. `order` is only
    /// updated once the commit succeeded. Callers must hold the order's lock.
    pub async fn ensure_packing_slip(
        &self,
        order: &mut Order,
        actor: &Actor,
        automatic: bool,
    ) -> Result<bool> {
        if order.packing_slip_generated {
            return Ok(false);
        }

        let seed = PackingSlipSeed {
            order_id: order.id,
            invoice_number: order.invoice_number.clone(),
            so_number: order.so_number.clone(),
            actor_id: actor.id,
        };
        let inserted = self
            .slips
            .create(&seed)
            .await
            .context("packing slip service create failed")?;
        if !inserted {
            // A slip row exists but the flag never landed; adopt it.
            debug!(order_id = %order.id, "packing slip already on file; setting flag");
        }

        let now = Utc::now();
        let mut next = order.clone();
        next.mark_packing_slip_generated(actor.id, now);
        next.updated_at = now;
        let entry = HistoryEntry::packing_slip_created(
            next.id,
            actor,
            automatic,
            next.invoice_number.as_deref(),
            next.so_number.as_deref(),
        );

        self.store
            .commit(&next, std::slice::from_ref(&entry))
            .await
            .context("persist packing slip flag failed")?;
        self.journal.mirror(std::slice::from_ref(&entry));

        info!(
            order_id = %next.id,
            automatic,
            actor = %actor.name,
            "packing slip created"
        );
        *order = next;
        Ok(true)
    }
}
