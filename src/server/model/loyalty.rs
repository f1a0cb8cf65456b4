use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum TransactionStatus {
    Pending,
    Approved,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            s => Err(format!("Invalid TransactionStatus: {s}")),
        }
    }
}

/// The only transaction kind the ledger records today.
pub(crate) const GRANT_KIND: &str = "points_grant";

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PointsTransaction {
    pub id: i64,
    pub order_id: i64,
    pub user_id: String,
    pub points_amount: i64,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreditPointsResponse {
    /// points credited by this call; 0 when the grant already existed
    pub credited: i64,
    pub already_credited: bool,
}
