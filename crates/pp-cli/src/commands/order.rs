//! `pp order ...`: drive the lifecycle against Postgres.
//!
//! Effects run inline so the process does not exit before the packing slip
//! and notification are done.

use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Subcommand};
use pp_db::PgStore;
use pp_lifecycle::{DispatchMode, OrderLifecycle, OrderPermissions};
use pp_schemas::{Order, OrderStatus, TransitionRequest};

use super::{build_journal, build_notifier, load_settings, opt_str, parse_actor, parse_order_id};

#[derive(Subcommand)]
pub enum OrderCmd {
    /// Register a new order (Draft or Open).
    Create {
        /// Initial status
        #[arg(long, default_value = "Open")]
        status: String,

        #[command(flatten)]
        ctx: ActorArgs,
    },

    /// Print an order snapshot.
    Show {
        order_id: String,
    },

    /// Print the audit history of an order, oldest first.
    History {
        order_id: String,
    },

    /// Print what a role may do with an order right now.
    Permissions {
        order_id: String,

        /// admin | client
        #[arg(long, default_value = "client")]
        role: String,
    },

    /// Request a status change, optionally filling gating fields.
    Transition {
        order_id: String,

        /// Target status (Draft | Open | "In Process" | Ready | Done | Cancelled)
        #[arg(long = "to")]
        target: String,

        #[arg(long = "so-number")]
        so_number: Option<String>,

        #[arg(long = "invoice-number")]
        invoice_number: Option<String>,

        /// Positive whole number
        #[arg(long)]
        pallets: Option<String>,

        /// Recorded on the history entry
        #[arg(long)]
        notes: Option<String>,

        /// Custom notification body
        #[arg(long)]
        message: Option<String>,

        #[command(flatten)]
        ctx: ActorArgs,
    },

    /// Create the packing slip manually (Ready or Done only).
    PackingSlip {
        order_id: String,

        #[command(flatten)]
        ctx: ActorArgs,
    },

    /// Delete an order. History is kept.
    Delete {
        order_id: String,

        #[command(flatten)]
        ctx: ActorArgs,
    },
}

/// Acting user plus the config that shapes notifications and the journal.
#[derive(Args)]
pub struct ActorArgs {
    #[arg(long = "actor-id")]
    actor_id: String,

    #[arg(long = "actor-name", default_value = "cli")]
    actor_name: String,

    /// admin | client
    #[arg(long = "actor-role", default_value = "admin")]
    actor_role: String,

    /// Layered config paths in merge order
    #[arg(long = "config")]
    config_paths: Vec<String>,
}

pub async fn run(cmd: OrderCmd) -> Result<()> {
    match cmd {
        OrderCmd::Create { status, ctx } => {
            let initial = OrderStatus::parse(&status)?;
            let actor = parse_actor(&ctx.actor_id, &ctx.actor_name, &ctx.actor_role)?;
            let lifecycle = connect(&ctx.config_paths).await?;
            let order = lifecycle.create_order(initial, &actor).await?;
            println!("created=true");
            print_order(&order);
        }

        OrderCmd::Show { order_id } => {
            let id = parse_order_id(&order_id)?;
            let order = connect(&[]).await?.load(id).await?;
            print_order(&order);
        }

        OrderCmd::History { order_id } => {
            let id = parse_order_id(&order_id)?;
            let trail = connect(&[]).await?.history(id).await?;
            println!("entries={}", trail.len());
            for e in trail.entries() {
                println!(
                    "{} {} from={} to={} by={} role={} metadata={}",
                    e.created_at.to_rfc3339(),
                    e.action_type,
                    e.status_from.map(|s| s.as_str()).unwrap_or("NULL"),
                    e.status_to.map(|s| s.as_str()).unwrap_or("NULL"),
                    e.changed_by_name,
                    e.changed_by_role,
                    e.metadata
                );
            }
        }

        OrderCmd::Permissions { order_id, role } => {
            let id = parse_order_id(&order_id)?;
            let role = pp_schemas::ActorRole::parse(&role)?;
            let order = connect(&[]).await?.load(id).await?;
            let p = OrderPermissions::for_order(&order, role);
            println!("{}", serde_json::to_string_pretty(&p)?);
        }

        OrderCmd::Transition {
            order_id,
            target,
            so_number,
            invoice_number,
            pallets,
            notes,
            message,
            ctx,
        } => {
            let id = parse_order_id(&order_id)?;
            let mut req = TransitionRequest::to(OrderStatus::parse(&target)?);
            req.fields.so_number = so_number;
            req.fields.invoice_number = invoice_number;
            req.fields.number_of_pallets = pallets;
            req.notes = notes;
            req.notification_message = message;

            let actor = parse_actor(&ctx.actor_id, &ctx.actor_name, &ctx.actor_role)?;
            let lifecycle = connect(&ctx.config_paths).await?;
            let mut reports = lifecycle.subscribe_effects();

            let mut order = lifecycle.request_transition(id, req, &actor).await?;
            println!("transitioned=true");

            // Inline mode: a report exists iff the status actually changed.
            if let Ok(report) = reports.try_recv() {
                println!("packing_slip_created={}", report.packing_slip_created);
                println!("netsuite_ready={}", report.netsuite_ready);
                if let Some(kind) = report.notification {
                    println!("notification={}", kind.as_str());
                }
                for f in &report.failures {
                    println!("effect_failed={:?} message={}", f.kind, f.message);
                }
                order = report.order;
            }
            print_order(&order);
        }

        OrderCmd::PackingSlip { order_id, ctx } => {
            let id = parse_order_id(&order_id)?;
            let actor = parse_actor(&ctx.actor_id, &ctx.actor_name, &ctx.actor_role)?;
            let created = connect(&ctx.config_paths)
                .await?
                .create_packing_slip(id, &actor)
                .await?;
            println!("packing_slip_created={created} order_id={id}");
        }

        OrderCmd::Delete { order_id, ctx } => {
            let id = parse_order_id(&order_id)?;
            let actor = parse_actor(&ctx.actor_id, &ctx.actor_name, &ctx.actor_role)?;
            connect(&ctx.config_paths).await?.delete_order(id, &actor).await?;
            println!("deleted=true order_id={id}");
        }
    }

    Ok(())
}

async fn connect(config_paths: &[String]) -> Result<OrderLifecycle> {
    let settings = load_settings(config_paths)?;
    let pool = pp_db::connect_from_env().await?;
    let store = Arc::new(PgStore::new(pool));
    let lifecycle = OrderLifecycle::new(store.clone(), build_notifier(&settings)?, store)
        .with_mode(DispatchMode::Inline)
        .with_journal(build_journal(&settings)?);
    Ok(lifecycle)
}

fn print_order(o: &Order) {
    println!("order_id={}", o.id);
    println!("status={}", o.status);
    println!("so_number={}", opt_str(&o.so_number));
    println!("invoice_number={}", opt_str(&o.invoice_number));
    println!(
        "number_of_pallets={}",
        o.number_of_pallets
            .map(|n| n.to_string())
            .unwrap_or_else(|| "NULL".to_string())
    );
    println!("packing_slip_generated={}", o.packing_slip_generated);
    println!("updated_at={}", o.updated_at.to_rfc3339());
}
