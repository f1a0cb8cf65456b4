use crate::server::payment::gateway::GatewayError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Display, Error)]
pub(crate) enum ApiError {
    #[display("server is busy")]
    ServerIsBusy,
    #[display("{message}")]
    Validation { code: &'static str, message: String },
    #[display("resource not found")]
    ResourceNotFound,
    #[display("database error")]
    DbError,
    #[display("timeout occurred")]
    Timeout,
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

impl ApiError {
    fn code(&self) -> &str {
        match self {
            Self::ServerIsBusy => "SRV_BUSY",
            Self::Validation { code, .. } => code,
            Self::ResourceNotFound => "SRV_NOT_FOUND",
            Self::DbError => "SRV_DB",
            Self::Timeout => "SRV_TIMEOUT",
            Self::AuthenticationFailed => "FLASHP_ERR_99",
            Self::Upstream { code, .. } => code,
        }
    }

    fn details(&self) -> Option<&Value> {
        match self {
            Self::Upstream { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::AuthenticationFailed => Self::AuthenticationFailed,
            GatewayError::Upstream {
                http_status,
                code,
                title,
                details,
            } => Self::Upstream {
                http_status,
                code,
                title,
                details,
            },
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl error::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ServerIsBusy | Self::DbError | Self::AuthenticationFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { http_status, .. } => StatusCode::from_u16(*http_status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(ErrorBody {
                success: false,
                code: self.code(),
                message: self.to_string(),
                details: self.details(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::error::ResponseError;

    #[test]
    fn validation_maps_to_400_with_code() {
        let e = ApiError::Validation {
            code: "FLASHP_INP_99",
            message: "amount must be a positive number".to_string(),
        };
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(e.code(), "FLASHP_INP_99");
    }

    #[test]
    fn upstream_status_is_forwarded_when_sensible() {
        let e = ApiError::Upstream {
            http_status: 422,
            code: "FLASHP_AMT_01".to_string(),
            title: "amount too small".to_string(),
            details: None,
        };
        assert_eq!(e.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let weird = ApiError::Upstream {
            http_status: 200,
            code: "FLASHP_ERR_99".to_string(),
            title: "payment processing failed".to_string(),
            details: None,
        };
        assert_eq!(weird.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
