use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Browser-facing init payload. Everything is optional at the type level so
/// that missing fields surface as the proxy's own structured 400 instead of
/// a deserialization error. Once validated, the same shape is forwarded to
/// the upstream gateway with absent fields dropped.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct InitPaymentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InitPaymentResponse {
    pub success: bool,
    #[serde(rename = "paymentUrl")]
    pub payment_url: String,
    #[serde(rename = "transactionId")]
    pub transaction_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentStatusParams {
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaymentStatusResponse {
    pub success: bool,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub status: &'static str,
}

/// OAuth2 token endpoint success body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// What the upstream gateway answers to `payments/init`.
#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamInitResponse {
    pub status: Option<String>,
    pub payment_url: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpstreamStatusResponse {
    pub status: Option<String>,
}

/// Structured error body the upstream may attach to a failed call.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct UpstreamErrorBody {
    pub status: Option<u16>,
    pub title: Option<String>,
    pub code: Option<String>,
    pub error_details: Option<Value>,
}
