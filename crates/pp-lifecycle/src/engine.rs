//! OrderLifecycle: the single writer of order status.
//!
//! # Request flow
//!
//! ```text
//!  acquire order lock ─► load ─► terminal? edit-locked? ─► merge + validate
//!        │                                                     │ missing -> Validation
//!        │                                                     ▼
//!        │                              commit(order, entries) atomically
//!        │                                                     │ error -> Persistence
//!        ▼                                                     ▼
//!  guard moves into effects ◄──────────── mirror journal, dispatch effects
//! ```
//!
//! The lock guard is handed to the side-effect run, so the next request for
//! the same order starts only after the previous request's effects finished.
//! Requests for different orders proceed in parallel.

use chrono::Utc;
use pp_audit::{AuditTrail, HistoryEntry};
use pp_db::OrderStore;
use pp_schemas::{Actor, DispatchMode, Order, OrderStatus, TransitionRequest};
use std::sync::Arc;
use tokio::sync::{broadcast, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::dispatcher::{EffectJob, EffectReport, Notifier, PackingSlipService, SideEffectDispatcher};
use crate::error::LifecycleError;
use crate::journal::AuditJournal;
use crate::locks::{EffectTracker, OrderLocks};
use crate::policy;
use crate::validator::{validate, MergedFields};

// ---------------------------------------------------------------------------
// OrderLifecycle
// ---------------------------------------------------------------------------

const REPORT_CHANNEL_CAPACITY: usize = 256;

pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    dispatcher: SideEffectDispatcher,
    journal: AuditJournal,
    locks: OrderLocks,
    effects: EffectTracker,
    mode: DispatchMode,
    reports: broadcast::Sender<EffectReport>,
}

impl OrderLifecycle {
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
        slips: Arc<dyn PackingSlipService>,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            dispatcher: SideEffectDispatcher::new(store.clone(), notifier, slips),
            store,
            journal: AuditJournal::disabled(),
            locks: OrderLocks::new(),
            effects: EffectTracker::new(),
            mode: DispatchMode::default(),
            reports,
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_journal(mut self, journal: AuditJournal) -> Self {
        self.dispatcher.set_journal(journal.clone());
        self.journal = journal;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Every finished side-effect run is published here. Reports sent while
    /// nobody is subscribed are dropped.
    pub fn subscribe_effects(&self) -> broadcast::Receiver<EffectReport> {
        self.reports.subscribe()
    }

    /// Resolve once no background side effect is running.
    pub async fn wait_idle(&self) {
        self.effects.wait_idle().await
    }

    pub fn effects_in_flight(&self) -> usize {
        self.effects.in_flight()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn load(&self, order_id: Uuid) -> Result<Order, LifecycleError> {
        self.store
            .load_order(order_id)
            .await
            .map_err(LifecycleError::Persistence)?
            .ok_or(LifecycleError::NotFound { order_id })
    }

    /// History outlives the order, so this does not require the order to exist.
    pub async fn history(&self, order_id: Uuid) -> Result<AuditTrail, LifecycleError> {
        let entries = self
            .store
            .history(order_id)
            .await
            .map_err(LifecycleError::Persistence)?;
        Ok(AuditTrail::new(entries))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Register a new order (intake). Only `Draft` and `Open` are valid
    /// starting points.
    pub async fn create_order(
        &self,
        initial: OrderStatus,
        actor: &Actor,
    ) -> Result<Order, LifecycleError> {
        if !matches!(initial, OrderStatus::Draft | OrderStatus::Open) {
            return Err(LifecycleError::InvalidInitialStatus { status: initial });
        }

        let order = Order::new(Uuid::new_v4(), initial);
        let entry = HistoryEntry::order_created(order.id, initial, actor);
        self.store
            .insert_order(&order, &entry)
            .await
            .map_err(LifecycleError::Persistence)?;
        self.journal.mirror(std::slice::from_ref(&entry));

        info!(order_id = %order.id, status = %initial, actor = %actor.name, "order created");
        Ok(order)
    }

    /// Move an order to `req.target`, persisting the candidate fields with it.
    ///
    /// Returns the committed snapshot. Side effects are not reflected in it;
    /// use [`OrderLifecycle::load`] after they finished to see the
    /// packing-slip flag.
    pub async fn request_transition(
        &self,
        order_id: Uuid,
        req: TransitionRequest,
        actor: &Actor,
    ) -> Result<Order, LifecycleError> {
        let guard = self.locks.acquire(order_id).await;
        let current = self.load(order_id).await?;

        if current.status.is_terminal() {
            debug!(order_id = %order_id, status = %current.status, "transition refused: terminal");
            return Err(LifecycleError::TerminalStatus {
                status: current.status,
            });
        }
        if policy::is_edit_locked(&current, actor.role) {
            debug!(order_id = %order_id, status = %current.status, "transition refused: edit locked");
            return Err(LifecycleError::EditLocked {
                status: current.status,
            });
        }

        let merged = MergedFields::merge(&current, &req.fields);
        let missing = validate(req.target, &merged);
        if !missing.is_empty() {
            debug!(
                order_id = %order_id,
                target = %req.target,
                missing = ?missing,
                "transition refused: validation"
            );
            return Err(LifecycleError::Validation {
                missing_fields: missing,
            });
        }

        let from = current.status;
        let to = req.target;
        let mut next = current.clone();
        let changes = merged.apply_to(&mut next);
        let fields_changed = changes.as_object().is_some_and(|m| !m.is_empty());

        let entry = if from != to {
            next.status = to;
            HistoryEntry::status_change(order_id, from, to, actor, req.notes.clone(), changes)
        } else if fields_changed {
            HistoryEntry::order_updated(order_id, actor, req.notes.clone(), changes)
        } else {
            debug!(order_id = %order_id, status = %from, "no-op save; nothing written");
            return Ok(current);
        };
        next.updated_at = Utc::now();

        self.store
            .commit(&next, std::slice::from_ref(&entry))
            .await
            .map_err(LifecycleError::Persistence)?;
        self.journal.mirror(std::slice::from_ref(&entry));

        info!(
            order_id = %order_id,
            from = %from,
            to = %to,
            action_type = %entry.action_type,
            actor = %actor.name,
            role = %actor.role,
            "order change committed"
        );

        if from != to {
            let job = EffectJob {
                order: next.clone(),
                from,
                to,
                actor: actor.clone(),
                message: req.notification_message,
            };
            self.run_effects(job, guard).await;
        }

        Ok(next)
    }

    /// Delete an order. History rows are kept.
    pub async fn delete_order(&self, order_id: Uuid, actor: &Actor) -> Result<(), LifecycleError> {
        let _guard = self.locks.acquire(order_id).await;
        let order = self.load(order_id).await?;

        if !policy::can_delete(&order, actor.role) {
            debug!(order_id = %order_id, status = %order.status, role = %actor.role, "delete refused");
            return Err(LifecycleError::DeletionNotAllowed {
                status: order.status,
                role: actor.role,
            });
        }

        let deleted = self
            .store
            .delete_order(order_id)
            .await
            .map_err(LifecycleError::Persistence)?;
        if !deleted {
            return Err(LifecycleError::NotFound { order_id });
        }

        info!(order_id = %order_id, status = %order.status, actor = %actor.name, "order deleted");
        Ok(())
    }

    /// Manual packing-slip creation. Shares the order lock and the monotonic
    /// flag with the automatic path, so an order never gets two slips.
    ///
    /// Returns `false` when a slip already existed.
    pub async fn create_packing_slip(
        &self,
        order_id: Uuid,
        actor: &Actor,
    ) -> Result<bool, LifecycleError> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.load(order_id).await?;

        if !policy::can_manage_packing_slip(&order) {
            return Err(LifecycleError::PackingSlipLocked {
                status: order.status,
            });
        }

        self.dispatcher
            .ensure_packing_slip(&mut order, actor, false)
            .await
            .map_err(LifecycleError::PackingSlipFailed)
    }

    async fn run_effects(&self, job: EffectJob, guard: OwnedMutexGuard<()>) {
        match self.mode {
            DispatchMode::Inline => {
                let report = self.dispatcher.dispatch(job).await;
                let _ = self.reports.send(report);
                drop(guard);
            }
            DispatchMode::Background => {
                let dispatcher = self.dispatcher.clone();
                let reports = self.reports.clone();
                self.effects.spawn(async move {
                    let _guard = guard;
                    let report = dispatcher.dispatch(job).await;
                    let _ = reports.send(report);
                });
            }
        }
    }
}
