use crate::server::controller::error::ApiError;
use crate::server::model::payment::{
    HealthResponse, InitPaymentRequest, InitPaymentResponse, PaymentStatusParams,
    PaymentStatusResponse,
};
use crate::server::state::AppState;
use actix_web::{get, post, web, Responder};

/// Code returned for malformed or missing caller input.
const INPUT_ERROR_CODE: &str = "FLASHP_INP_99";

fn invalid(message: &str) -> ApiError {
    ApiError::Validation {
        code: INPUT_ERROR_CODE,
        message: message.to_string(),
    }
}

fn validate_init(req: &InitPaymentRequest) -> Result<(), ApiError> {
    match req.amount {
        Some(amount) if amount.is_finite() && amount > 0.0 => {}
        _ => return Err(invalid("amount must be a positive number")),
    }
    for (field, value) in [
        ("description", &req.description),
        ("success_url", &req.success_url),
        ("failure_url", &req.failure_url),
    ] {
        match value {
            Some(v) if !v.trim().is_empty() => {}
            _ => return Err(invalid(&format!("{field} is required"))),
        }
    }
    Ok(())
}

#[post("/api/payment/init")]
/// initiate a payment against the upstream gateway
pub(crate) async fn post_payment_init(
    body: web::Json<InitPaymentRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    validate_init(&body)?;
    let (payment_url, transaction_id) = data.gateway().init_payment(&body).await?;
    Ok(web::Json(InitPaymentResponse {
        success: true,
        payment_url,
        transaction_id,
    }))
}

#[get("/api/payment/status")]
/// query the current state of a transaction
pub(crate) async fn get_payment_status(
    query: web::Query<PaymentStatusParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, ApiError> {
    let transaction_id = query
        .transaction_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| invalid("transaction_id is required"))?;
    let status = data.gateway().payment_status(transaction_id).await?;
    Ok(web::Json(PaymentStatusResponse {
        success: true,
        status,
    }))
}

#[get("/health")]
pub(crate) async fn health() -> impl Responder {
    web::Json(HealthResponse { status: "OK" })
}
