use crate::server::model::order::{OrderStatus, StatusHistoryEntry};
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum TransitionError {
    #[display("a failure reason is required when marking an order as failed")]
    MissingFailureReason,
}

/// Notification record written for the order's owner on every transition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Notification {
    pub user_id: String,
    pub order_id: i64,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub reason: Option<String>,
    pub read: bool,
}

/// Emitted once, on entry into the delivered state.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PurchaseCompleted {
    pub order_id: i64,
    pub total: f64,
}

#[derive(Debug)]
pub(crate) struct Transition {
    pub entry: StatusHistoryEntry,
    pub notification: Notification,
    pub purchase_completed: Option<PurchaseCompleted>,
}

/// Build the effects of a manual status change.
///
/// Any state is reachable from any state; the admin board does not police
/// transition legality. The only precondition is that `FAILED` carries a
/// reason. A reason supplied with any other target status is dropped.
pub(crate) fn apply_transition(
    order_id: i64,
    user_id: &str,
    current: OrderStatus,
    total: f64,
    new_status: OrderStatus,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let reason = match new_status {
        OrderStatus::Failed => match reason.filter(|r| !r.trim().is_empty()) {
            Some(reason) => Some(reason),
            None => return Err(TransitionError::MissingFailureReason),
        },
        _ => None,
    };

    let entry = StatusHistoryEntry {
        status: new_status,
        reason: reason.clone(),
        created_at: now,
    };
    let notification = Notification {
        user_id: user_id.to_string(),
        order_id,
        old_status: current,
        new_status,
        reason,
        read: false,
    };
    let purchase_completed = (new_status == OrderStatus::Delivered).then(|| PurchaseCompleted {
        order_id,
        total,
    });

    Ok(Transition {
        entry,
        notification,
        purchase_completed,
    })
}
