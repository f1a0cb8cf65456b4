use crate::server::model::payment::{
    InitPaymentRequest, UpstreamErrorBody, UpstreamInitResponse, UpstreamStatusResponse,
};
use crate::server::payment::token::{
    AccessTokenCache, AuthError, Clock, KeycloakExchanger, SystemClock, TokenExchanger,
};
use derive_more::{Display, Error};
use log::warn;
use serde_json::Value;

/// Code and status used when the upstream fails without a readable body.
pub(crate) const DEFAULT_ERROR_CODE: &str = "FLASHP_ERR_99";
const DEFAULT_ERROR_TITLE: &str = "payment processing failed";
const DEFAULT_ERROR_STATUS: u16 = 500;

/// The init call only succeeds when the gateway saved the payment.
const SAVED_STATUS: &str = "SAVED";

#[derive(Debug, Display, Error, PartialEq)]
pub(crate) enum GatewayError {
    #[display("authentication with the payment gateway failed")]
    AuthenticationFailed,
    #[display("{title}")]
    Upstream {
        http_status: u16,
        code: String,
        title: String,
        details: Option<Value>,
    },
}

impl From<AuthError> for GatewayError {
    fn from(_: AuthError) -> Self {
        Self::AuthenticationFailed
    }
}

fn default_upstream_error() -> GatewayError {
    GatewayError::Upstream {
        http_status: DEFAULT_ERROR_STATUS,
        code: DEFAULT_ERROR_CODE.to_string(),
        title: DEFAULT_ERROR_TITLE.to_string(),
        details: None,
    }
}

/// Map a failed upstream call onto the proxy's own error shape, keeping the
/// upstream's structured body when there is one.
fn upstream_error(http_status: u16, body: &[u8]) -> GatewayError {
    let parsed = serde_json::from_slice::<UpstreamErrorBody>(body).unwrap_or_default();
    GatewayError::Upstream {
        http_status: parsed.status.unwrap_or(http_status.max(400)),
        code: parsed.code.unwrap_or_else(|| DEFAULT_ERROR_CODE.to_string()),
        title: parsed
            .title
            .unwrap_or_else(|| DEFAULT_ERROR_TITLE.to_string()),
        details: parsed.error_details,
    }
}

/// Read the `payments/init` answer. Anything other than a 2xx carrying
/// `status == "SAVED"` and a non-empty `payment_url` is a failure.
pub(crate) fn parse_init_response(
    http_status: u16,
    body: &[u8],
) -> Result<(String, String), GatewayError> {
    if !(200..300).contains(&http_status) {
        return Err(upstream_error(http_status, body));
    }
    let parsed = match serde_json::from_slice::<UpstreamInitResponse>(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("gateway init answered an unreadable body, {}", e);
            return Err(default_upstream_error());
        }
    };
    let saved = parsed.status.as_deref() == Some(SAVED_STATUS);
    match parsed.payment_url {
        Some(url) if saved && !url.is_empty() => {
            Ok((url, parsed.transaction_id.unwrap_or_default()))
        }
        _ => {
            warn!(
                "gateway init did not save the payment, status={:?}",
                parsed.status
            );
            Err(default_upstream_error())
        }
    }
}

/// Read the `payments/{id}` answer, lowercasing the status string.
pub(crate) fn parse_status_response(http_status: u16, body: &[u8]) -> Result<String, GatewayError> {
    if !(200..300).contains(&http_status) {
        return Err(upstream_error(http_status, body));
    }
    match serde_json::from_slice::<UpstreamStatusResponse>(body) {
        Ok(UpstreamStatusResponse { status: Some(s) }) => Ok(s.to_lowercase()),
        _ => Err(default_upstream_error()),
    }
}

/// Thin client over the payment gateway's REST API, authenticated through
/// the token cache.
pub(crate) struct PaymentGateway<E: TokenExchanger, C: Clock = SystemClock> {
    http: reqwest::Client,
    base_url: String,
    tokens: AccessTokenCache<E, C>,
}

pub(crate) type LiveGateway = PaymentGateway<KeycloakExchanger, SystemClock>;

impl<E: TokenExchanger, C: Clock> PaymentGateway<E, C> {
    pub fn new(base_url: String, tokens: AccessTokenCache<E, C>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub async fn init_payment(
        &self,
        payload: &InitPaymentRequest,
    ) -> Result<(String, String), GatewayError> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .post(format!("{}/payments/init", self.base_url))
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                warn!("gateway init transport error, {}", e);
                default_upstream_error()
            })?;
        let http_status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        parse_init_response(http_status, &body)
    }

    pub async fn payment_status(&self, transaction_id: &str) -> Result<String, GatewayError> {
        let token = self.tokens.get_token().await?;
        let response = self
            .http
            .get(format!("{}/payments/{}", self.base_url, transaction_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!("gateway status transport error, {}", e);
                default_upstream_error()
            })?;
        let http_status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        parse_status_response(http_status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_requires_saved_and_payment_url() {
        let ok = parse_init_response(
            200,
            br#"{"status":"SAVED","payment_url":"https://pay.example/p/1","transaction_id":"tx-1"}"#,
        )
        .unwrap();
        assert_eq!(ok.0, "https://pay.example/p/1");
        assert_eq!(ok.1, "tx-1");

        // saved but no url
        assert!(parse_init_response(200, br#"{"status":"SAVED"}"#).is_err());
        // url but not saved
        assert!(parse_init_response(
            200,
            br#"{"status":"PENDING","payment_url":"https://pay.example/p/1"}"#
        )
        .is_err());
        // empty url
        assert!(
            parse_init_response(200, br#"{"status":"SAVED","payment_url":""}"#).is_err()
        );
    }

    #[test]
    fn upstream_error_body_is_proxied() {
        let err = parse_init_response(
            422,
            br#"{"status":422,"title":"amount too small","code":"FLASHP_AMT_01","error_details":{"min":100}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Upstream {
                http_status: 422,
                code: "FLASHP_AMT_01".to_string(),
                title: "amount too small".to_string(),
                details: Some(serde_json::json!({"min": 100})),
            }
        );
    }

    #[test]
    fn silent_upstream_defaults_to_err_99() {
        let err = parse_init_response(502, b"").unwrap_err();
        match err {
            GatewayError::Upstream {
                http_status, code, ..
            } => {
                assert_eq!(http_status, 502);
                assert_eq!(code, DEFAULT_ERROR_CODE);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unreadable_success_body_is_a_processing_failure() {
        let err = parse_init_response(200, b"not json").unwrap_err();
        match err {
            GatewayError::Upstream { http_status, code, .. } => {
                assert_eq!(http_status, 500);
                assert_eq!(code, DEFAULT_ERROR_CODE);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn status_is_lowercased() {
        let status = parse_status_response(200, br#"{"status":"SUCCESSFUL"}"#).unwrap();
        assert_eq!(status, "successful");
        assert!(parse_status_response(200, br#"{}"#).is_err());
        assert!(parse_status_response(404, br#"{"title":"not found"}"#).is_err());
    }
}
