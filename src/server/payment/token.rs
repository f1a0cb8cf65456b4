use crate::server::model::config::AuthConfig;
use crate::server::model::payment::TokenResponse;
use chrono::{DateTime, Duration, Utc};
use derive_more::{Display, Error};
use log::{info, warn};
use tokio::sync::Mutex;

/// The cache stops serving a token this many seconds before its real
/// expiry so a request never leaves with a token about to die in flight.
pub(crate) const TOKEN_SAFETY_MARGIN_SECONDS: i64 = 100;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub(crate) enum AuthError {
    #[display("authentication with the payment gateway failed")]
    AuthenticationFailed,
}

pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub(crate) trait TokenExchanger: Send + Sync {
    async fn exchange(&self) -> Result<TokenResponse, AuthError>;
}

/// OAuth2 client-credentials exchange against the gateway's realm.
pub(crate) struct KeycloakExchanger {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl KeycloakExchanger {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: format!(
                "{}/realms/{}/protocol/openid-connect/token",
                config.base_url.trim_end_matches('/'),
                config.realm
            ),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

impl TokenExchanger for KeycloakExchanger {
    async fn exchange(&self) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                warn!("token exchange transport error, {}", e);
                AuthError::AuthenticationFailed
            })?;
        if !response.status().is_success() {
            warn!("token exchange rejected, status={}", response.status());
            return Err(AuthError::AuthenticationFailed);
        }
        response.json::<TokenResponse>().await.map_err(|e| {
            warn!("token endpoint returned an unreadable body, {}", e);
            AuthError::AuthenticationFailed
        })
    }
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Single-slot TTL cache around the client-credentials exchange.
///
/// Holding the slot lock across a miss means concurrent callers share one
/// exchange instead of each performing their own. Failures cache nothing;
/// the next call re-attempts the exchange.
pub(crate) struct AccessTokenCache<E, C = SystemClock> {
    exchanger: E,
    clock: C,
    slot: Mutex<Option<CachedToken>>,
}

impl<E, C> AccessTokenCache<E, C>
where
    E: TokenExchanger,
    C: Clock,
{
    pub fn new(exchanger: E, clock: C) -> Self {
        Self {
            exchanger,
            clock,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<String, AuthError> {
        let mut slot = self.slot.lock().await;
        let now = self.clock.now();
        if let Some(cached) = slot.as_ref() {
            if now < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let grant = self.exchanger.exchange().await?;
        let lifetime = (grant.expires_in - TOKEN_SAFETY_MARGIN_SECONDS).max(0);
        let expires_at = now + Duration::seconds(lifetime);
        info!("access token refreshed, usable for {}s", lifetime);
        *slot = Some(CachedToken {
            value: grant.access_token.clone(),
            expires_at,
        });
        Ok(grant.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct FakeClock(AtomicI64);

    impl FakeClock {
        fn new(start: i64) -> Self {
            Self(AtomicI64::new(start))
        }
        fn advance(&self, seconds: i64) {
            self.0.fetch_add(seconds, Ordering::SeqCst);
        }
    }

    impl Clock for &FakeClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::<Utc>::from_timestamp(self.0.load(Ordering::SeqCst), 0).unwrap()
        }
    }

    struct FakeExchanger {
        script: StdMutex<VecDeque<Result<(String, i64), AuthError>>>,
        calls: AtomicUsize,
    }

    impl FakeExchanger {
        fn new(script: Vec<Result<(String, i64), AuthError>>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenExchanger for &FakeExchanger {
        async fn exchange(&self) -> Result<TokenResponse, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected exchange");
            next.map(|(access_token, expires_in)| TokenResponse {
                access_token,
                expires_in,
            })
        }
    }

    #[tokio::test]
    async fn token_served_from_cache_until_safety_margin() {
        let clock = FakeClock::new(0);
        let exchanger = FakeExchanger::new(vec![
            Ok(("t1".to_string(), 1800)),
            Ok(("t2".to_string(), 1800)),
        ]);
        let cache = AccessTokenCache::new(&exchanger, &clock);

        assert_eq!(cache.get_token().await.unwrap(), "t1");
        assert_eq!(exchanger.calls(), 1);

        // still inside 1800 - 100 seconds
        clock.advance(1699);
        assert_eq!(cache.get_token().await.unwrap(), "t1");
        assert_eq!(exchanger.calls(), 1);

        // margin reached, exactly one re-exchange
        clock.advance(1);
        assert_eq!(cache.get_token().await.unwrap(), "t2");
        assert_eq!(exchanger.calls(), 2);
    }

    #[tokio::test]
    async fn failed_exchange_caches_nothing() {
        let clock = FakeClock::new(0);
        let exchanger = FakeExchanger::new(vec![
            Err(AuthError::AuthenticationFailed),
            Ok(("fresh".to_string(), 1800)),
        ]);
        let cache = AccessTokenCache::new(&exchanger, &clock);

        assert_eq!(
            cache.get_token().await,
            Err(AuthError::AuthenticationFailed)
        );
        assert_eq!(exchanger.calls(), 1);

        // no stale value is served; the next call retries the exchange
        assert_eq!(cache.get_token().await.unwrap(), "fresh");
        assert_eq!(exchanger.calls(), 2);
    }

    #[tokio::test]
    async fn short_lived_grant_expires_immediately() {
        let clock = FakeClock::new(0);
        let exchanger = FakeExchanger::new(vec![
            Ok(("a".to_string(), 50)),
            Ok(("b".to_string(), 50)),
        ]);
        let cache = AccessTokenCache::new(&exchanger, &clock);

        // expires_in below the margin clamps to zero lifetime
        assert_eq!(cache.get_token().await.unwrap(), "a");
        assert_eq!(cache.get_token().await.unwrap(), "b");
        assert_eq!(exchanger.calls(), 2);
    }
}
