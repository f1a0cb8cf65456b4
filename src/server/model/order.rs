use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Catalog prices arrive either as plain numbers or as locale-formatted
/// strings (`"1.500"`); both are kept as-is until normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawPrice {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OrderStatus {
    Pending,
    Preparing,
    ReadyToDeliver,
    Delivering,
    Delivered,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::ReadyToDeliver => "ready_to_deliver",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    /// Parse a stored status value. Older records carry a `cancelled`
    /// taxonomy and a French vocabulary; both map onto the canonical enum.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" | "en attente" => Ok(Self::Pending),
            "preparing" | "en préparation" => Ok(Self::Preparing),
            "ready_to_deliver" | "prête à livrer" => Ok(Self::ReadyToDeliver),
            "delivering" | "en livraison" => Ok(Self::Delivering),
            "delivered" | "livrée" => Ok(Self::Delivered),
            "failed" | "cancelled" | "échouée" => Ok(Self::Failed),
            s => Err(format!("Invalid OrderStatus: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LineItem {
    pub dish_id: String,
    pub quantity: u32,
    /// unit price captured at order time; the catalog price is only a
    /// fallback for legacy rows that predate capture
    #[serde(default)]
    pub price: RawPrice,
    /// extra-list id -> indexes of the selected options within that list
    #[serde(default)]
    pub selected_extras: HashMap<String, Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DeliveryAddress {
    /// delivery zone, resolved against the quartier fee table
    pub quartier: String,
    pub details: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusHistoryEntry {
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Order {
    pub id: i64,
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub delivery_address: Option<DeliveryAddress>,
    pub payment_method: String,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub points_used: f64,
    pub points_reduction: f64,
    pub total: f64,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub history: Vec<StatusHistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostOrderRequest {
    pub user_id: String,
    pub items: Vec<LineItem>,
    pub delivery_address: Option<DeliveryAddress>,
    pub payment_method: String,
    pub delivery_fee: Option<f64>,
    pub points_used: Option<f64>,
    pub points_reduction: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostOrderResponse {
    pub id: i64,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub points_reduction: f64,
    pub total: f64,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetOrderResponse {
    pub order: Option<Order>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OrderSummary {
    pub id: i64,
    pub user_id: String,
    pub total: f64,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetOrdersResponse {
    pub orders: Vec<OrderSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatchOrderStatusRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub is_paid: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatchOrderStatusResponse {
    pub status: OrderStatus,
    pub entry: StatusHistoryEntry,
}
