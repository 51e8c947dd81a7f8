use pp_schemas::{ActorRole, OrderField, OrderStatus};
use std::fmt;
use uuid::Uuid;

/// Why the lifecycle refused (or failed) a request.
///
/// Every variant except `Persistence` and `PackingSlipFailed` is a refusal:
/// nothing was written. `Persistence` means the atomic commit failed and
/// nothing was applied either.
#[derive(Debug)]
pub enum LifecycleError {
    Validation { missing_fields: Vec<OrderField> },
    DeletionNotAllowed { status: OrderStatus, role: ActorRole },
    TerminalStatus { status: OrderStatus },
    EditLocked { status: OrderStatus },
    PackingSlipLocked { status: OrderStatus },
    NotFound { order_id: Uuid },
    /// New orders start as `Draft` or `Open` only.
    InvalidInitialStatus { status: OrderStatus },
    /// Manual packing-slip creation failed in the collaborator.
    PackingSlipFailed(anyhow::Error),
    Persistence(anyhow::Error),
}

impl LifecycleError {
    /// Stable machine-readable code, used in HTTP bodies and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Validation { .. } => "VALIDATION_FAILED",
            LifecycleError::DeletionNotAllowed { .. } => "DELETION_NOT_ALLOWED",
            LifecycleError::TerminalStatus { .. } => "TERMINAL_STATUS",
            LifecycleError::EditLocked { .. } => "EDIT_LOCKED",
            LifecycleError::PackingSlipLocked { .. } => "PACKING_SLIP_LOCKED",
            LifecycleError::NotFound { .. } => "NOT_FOUND",
            LifecycleError::InvalidInitialStatus { .. } => "INVALID_INITIAL_STATUS",
            LifecycleError::PackingSlipFailed(_) => "PACKING_SLIP_FAILED",
            LifecycleError::Persistence(_) => "PERSISTENCE_FAILED",
        }
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::Validation { missing_fields } => {
                let names: Vec<&str> = missing_fields.iter().map(|f| f.as_str()).collect();
                write!(f, "{}: missing {}", self.code(), names.join(", "))
            }
            LifecycleError::DeletionNotAllowed { status, role } => {
                write!(f, "{}: {role} cannot delete an order in {status}", self.code())
            }
            LifecycleError::TerminalStatus { status } => {
                write!(f, "{}: order is {status} and cannot change", self.code())
            }
            LifecycleError::EditLocked { status } => {
                write!(f, "{}: clients cannot edit an order in {status}", self.code())
            }
            LifecycleError::PackingSlipLocked { status } => {
                write!(
                    f,
                    "{}: packing slips require Ready or Done (order is {status})",
                    self.code()
                )
            }
            LifecycleError::NotFound { order_id } => {
                write!(f, "{}: order {order_id}", self.code())
            }
            LifecycleError::InvalidInitialStatus { status } => {
                write!(f, "{}: orders cannot be created as {status}", self.code())
            }
            LifecycleError::PackingSlipFailed(e) => write!(f, "{}: {e:#}", self.code()),
            LifecycleError::Persistence(e) => write!(f, "{}: {e:#}", self.code()),
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifecycleError::PackingSlipFailed(e) | LifecycleError::Persistence(e) => {
                Some(&**e)
            }
            _ => None,
        }
    }
}
