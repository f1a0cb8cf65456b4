use anyhow::{Context, Error};
use std::env;
use std::net::SocketAddrV4;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 3000;

/// Server configs
#[derive(Debug, Clone)]
pub(crate) struct ServerConfig {
    pub addr: SocketAddrV4,
    pub db_read_conn_str: String,
    pub db_write_conn_str: String,
    pub auth: AuthConfig,
    pub gateway_base_url: String,
    pub allowed_origins: Vec<String>,
}

/// OAuth2 client-credentials settings for the payment gateway realm
#[derive(Debug, Clone)]
pub(crate) struct AuthConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

impl ServerConfig {
    /// Load from the process environment, failing fast on any missing
    /// required variable so a misconfigured instance never serves traffic.
    pub fn from_env() -> Result<Self, Error> {
        let port = match env::var("PORT") {
            Ok(raw) => u16::from_str(raw.as_str()).context("PORT is not a valid port number")?,
            Err(_) => DEFAULT_PORT,
        };
        let addr = SocketAddrV4::new([0, 0, 0, 0].into(), port);

        let allowed_origins = required("ALLOWED_ORIGINS")?
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect::<Vec<_>>();
        if allowed_origins.is_empty() {
            anyhow::bail!("ALLOWED_ORIGINS must list at least one origin");
        }

        Ok(Self {
            addr,
            db_read_conn_str: required("DB_READ_POOL_CONN_STR")?,
            db_write_conn_str: required("DB_WRITE_POOL_CONN_STR")?,
            auth: AuthConfig {
                base_url: required("AUTH_BASE_URL")?,
                realm: required("AUTH_REALM")?,
                client_id: required("AUTH_CLIENT_ID")?,
                client_secret: required("AUTH_CLIENT_SECRET")?,
            },
            gateway_base_url: required("GATEWAY_BASE_URL")?,
            allowed_origins,
        })
    }
}

fn required(key: &str) -> Result<String, Error> {
    env::var(key).with_context(|| format!("required environment variable {key} is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_var_fails() {
        // none of the required vars are set in the test environment
        assert!(ServerConfig::from_env().is_err());
    }
}
