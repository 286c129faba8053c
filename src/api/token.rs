use super::endpoint;
use super::request;
use super::response::{login, Envelope, Status};
use super::transport::Transport;
use super::Error;
use crate::model::Credentials;
use http::StatusCode;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Session credential handed out by `CrossLogin`.
///
/// The portal does not say how long a token lives; expiry is only noticed when a
/// request is refused.
#[derive(Clone)]
pub struct SessionToken {
    /// JSON document sent as the `token` header.
    pub header: String,
    /// Regional API base URL the session is bound to.
    pub api_base: String,
    pub issued_at: Instant,
    /// Increases with every physical login.
    pub generation: u64,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("api_base", &self.api_base)
            .field("issued_at", &self.issued_at)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Holds the current session token and the credentials used to renew it.
///
/// Renewal is a critical section: callers that queued up behind a running
/// login get its token instead of logging in again.
pub struct TokenStore {
    transport: Arc<dyn Transport>,
    login_url: String,
    credentials: RwLock<Credentials>,
    current: RwLock<Option<Arc<SessionToken>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl TokenStore {
    pub fn new(transport: Arc<dyn Transport>, login_url: String, credentials: Credentials) -> Self {
        TokenStore {
            transport,
            login_url,
            credentials: RwLock::new(credentials),
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Last known token, if any.
    pub fn current(&self) -> Option<Arc<SessionToken>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn credentials(&self) -> Credentials {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace credentials (reauthentication) and forget the current token.
    pub fn update_credentials(&self, credentials: Credentials) {
        *self
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = credentials;
        self.clear();
    }

    pub fn clear(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Obtain a token newer than `stale`.
    ///
    /// `stale` is the generation the caller found unusable, or `None` when it had
    /// no token at all. If another caller replaced the token while this one was
    /// waiting for the lock, that token is returned without a new login.
    pub async fn refresh(&self, stale: Option<u64>) -> Result<Arc<SessionToken>, Error> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(token) = self.current() {
            if stale.map_or(true, |generation| token.generation > generation) {
                log::debug!(
                    "Token generation {} already renewed, reusing it",
                    token.generation
                );
                return Ok(token);
            }
        }

        match self.login().await {
            Ok(token) => {
                let token = Arc::new(token);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(token.clone());
                Ok(token)
            }
            Err(error) => {
                if error.requires_reauthentication() {
                    self.clear();
                }
                Err(error)
            }
        }
    }

    /// Log in again regardless of the current token.
    pub async fn force_refresh(&self) -> Result<Arc<SessionToken>, Error> {
        let stale = self.current().map_or(0, |token| token.generation);
        self.refresh(Some(stale)).await
    }

    async fn login(&self) -> Result<SessionToken, Error> {
        let credentials = self.credentials();
        log::debug!("Logging in to SEMS portal as {}", credentials.username);

        let body = serde_json::to_string(&request::Login {
            account: &credentials.username,
            pwd: &credentials.password,
        })?;

        let reply = self
            .transport
            .post(&self.login_url, endpoint::ANONYMOUS_TOKEN, body)
            .await?;

        match reply.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::Auth(format!("login refused with HTTP {}", reply.status)))
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                return Err(Error::Transient(format!("login answered HTTP {}", reply.status)))
            }
            status if status.is_server_error() => {
                return Err(Error::Transient(format!("login answered HTTP {}", status)))
            }
            status if !status.is_success() => {
                return Err(Error::Api {
                    code: status.as_u16().to_string(),
                    message: String::from("unexpected HTTP status on login"),
                })
            }
            _ => {}
        }

        let envelope = Envelope::parse(&reply.body)?;
        /* No expiry codes apply to login itself */
        if let Status::Failed { code, message } = envelope.status(&[]) {
            log::error!("SEMS login failed with code {}: {}", code, message);
            return Err(Error::Auth(format!("{} (code {})", message, code)));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = login::session_token(envelope.data, envelope.api, generation)?;
        log::info!(
            "SEMS session established against {} (generation {})",
            token.api_base,
            token.generation
        );
        Ok(token)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::api::transport::Reply;
    use std::time::Duration;

    fn store(transport: &Arc<ScriptedTransport>) -> TokenStore {
        TokenStore::new(
            transport.clone(),
            "https://login.example/api/v2/Common/CrossLogin".into(),
            Credentials::new("user", "pass"),
        )
    }

    #[tokio::test]
    async fn refresh_stores_token() {
        let transport = Arc::new(ScriptedTransport::new());
        let tokens = store(&transport);
        assert!(tokens.current().is_none());

        let token = tokens.refresh(None).await.unwrap();

        assert_eq!(1, token.generation);
        assert_eq!("https://eu.semsportal.com/api/", token.api_base);
        assert_eq!(Some(1), tokens.current().map(|t| t.generation));
        assert_eq!(1, transport.logins());

        let (url, header, body) = transport.requests().remove(0);
        assert_eq!("https://login.example/api/v2/Common/CrossLogin", url);
        assert_eq!(endpoint::ANONYMOUS_TOKEN, header);
        assert_eq!(r#"{"account":"user","pwd":"pass"}"#, body);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_logs_in_once() {
        let transport = Arc::new(ScriptedTransport::new().with_login_delay(Duration::from_millis(50)));
        let tokens = Arc::new(store(&transport));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                tokio::spawn(async move { tokens.refresh(None).await })
            })
            .collect();

        for handle in handles {
            let token = handle.await.unwrap().unwrap();
            assert_eq!(1, token.generation);
        }
        assert_eq!(1, transport.logins());
    }

    #[tokio::test]
    async fn stale_generation_triggers_one_new_login() {
        let transport = Arc::new(ScriptedTransport::new());
        let tokens = store(&transport);

        let first = tokens.refresh(None).await.unwrap();
        let (second, third) = tokio::join!(
            tokens.refresh(Some(first.generation)),
            tokens.refresh(Some(first.generation))
        );

        assert_eq!(2, second.unwrap().generation);
        assert_eq!(2, third.unwrap().generation);
        assert_eq!(2, transport.logins());
    }

    #[tokio::test]
    async fn rejected_credentials_are_auth_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_login(Ok(Reply::ok(
            r#"{"code":1001,"msg":"Invalid credentials","data":null}"#,
        )));
        let tokens = store(&transport);

        let result = tokens.refresh(None).await;

        assert!(matches!(result, Err(Error::Auth(_))));
        assert!(tokens.current().is_none());
    }

    #[tokio::test]
    async fn http_unauthorized_on_login_is_auth_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_login(Ok(Reply {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        }));
        let tokens = store(&transport);

        assert!(matches!(tokens.refresh(None).await, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn proxy_timeout_on_login_is_transient() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_login(Ok(Reply {
            status: StatusCode::REQUEST_TIMEOUT,
            body: String::new(),
        }));
        let tokens = store(&transport);

        let error = tokens.refresh(None).await.unwrap_err();

        assert!(matches!(error, Error::Transient(_)));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn update_credentials_drops_token() {
        let transport = Arc::new(ScriptedTransport::new());
        let tokens = store(&transport);
        tokens.refresh(None).await.unwrap();

        tokens.update_credentials(Credentials::new("other", "secret"));

        assert!(tokens.current().is_none());
        assert_eq!("other", tokens.credentials().username);
        let token = tokens.refresh(None).await.unwrap();
        assert_eq!(2, token.generation);
    }

    #[tokio::test]
    async fn force_refresh_always_logs_in() {
        let transport = Arc::new(ScriptedTransport::new());
        let tokens = store(&transport);

        tokens.force_refresh().await.unwrap();
        tokens.force_refresh().await.unwrap();

        assert_eq!(2, transport.logins());
    }
}
