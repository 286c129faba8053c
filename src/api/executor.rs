use super::endpoint::{self, Endpoint};
use super::response::{Envelope, Status, TOKEN_EXPIRED_CODES};
use super::token::{SessionToken, TokenStore};
use super::transport::{Reply, Transport};
use super::Error;
use http::StatusCode;
use serde_json::Value;

use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Ceiling on attempts per call, the token renewal retry included.
    pub max_attempts: u32,
    /// Delay before the first transient retry; doubles afterwards.
    pub retry_delay: Duration,
    /// API codes meaning "log in again".
    pub expiry_codes: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            expiry_codes: TOKEN_EXPIRED_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// One logical API call.
#[derive(Debug, Clone)]
pub struct Operation<'a> {
    pub name: &'a str,
    pub endpoint: &'a Endpoint,
    pub body: String,
    /// Reads need a `data` payload; control acknowledgements may come without.
    pub requires_data: bool,
}

enum Outcome {
    Data(Value),
    TokenExpired,
}

/// Runs operations against a possibly expired session, renewing it on demand.
pub struct RetryingRequestExecutor {
    tokens: TokenStore,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RetryingRequestExecutor {
    pub fn new(tokens: TokenStore, transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        RetryingRequestExecutor {
            tokens,
            transport,
            policy,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Execute `operation`, returning the `data` member of the response.
    ///
    /// Transient failures are retried with a doubling delay. An expired session
    /// is renewed once per call. Every attempt, including one whose login
    /// failed transiently, counts towards `max_attempts`.
    pub async fn execute(&self, operation: &Operation<'_>) -> Result<Value, Error> {
        let mut attempts = 0;
        let mut delay = self.policy.retry_delay;
        let mut token = self.tokens.current();
        let mut stale: Option<u64> = None;
        let mut renewed = false;

        loop {
            if attempts >= self.policy.max_attempts {
                log::error!(
                    "SEMS - {} failed after {} attempts, aborting for now",
                    operation.name,
                    attempts
                );
                return Err(Error::OutOfRetries {
                    operation: operation.name.to_string(),
                    attempts,
                });
            }
            attempts += 1;

            let session = match token.take() {
                Some(session) => Ok(session),
                None => self.tokens.refresh(stale).await,
            };
            let result = match session {
                Ok(session) => {
                    let outcome = self.attempt(&session, operation).await;
                    outcome.map(|outcome| (session, outcome))
                }
                Err(error) => Err(error),
            };

            match result {
                Ok((_, Outcome::Data(data))) => return Ok(data),
                Ok((session, Outcome::TokenExpired)) => {
                    if renewed {
                        log::error!(
                            "SEMS - {} refused a freshly issued token",
                            operation.name
                        );
                        return Err(Error::OutOfRetries {
                            operation: operation.name.to_string(),
                            attempts,
                        });
                    }
                    log::debug!(
                        "SEMS - {}: token generation {} expired, renewing ({}/{})",
                        operation.name,
                        session.generation,
                        attempts,
                        self.policy.max_attempts
                    );
                    renewed = true;
                    stale = Some(session.generation);
                }
                Err(error) if error.is_retryable() => {
                    log::warn!(
                        "SEMS - {} failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation.name,
                        attempts,
                        self.policy.max_attempts,
                        error,
                        delay
                    );
                    if attempts < self.policy.max_attempts {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    /* keep the session unless it is the one found expired */
                    token = self
                        .tokens
                        .current()
                        .filter(|session| stale.map_or(true, |g| session.generation > g));
                }
                Err(error) => {
                    log::error!("SEMS - {} failed: {}", operation.name, error);
                    return Err(error);
                }
            }
        }
    }

    async fn attempt(
        &self,
        session: &SessionToken,
        operation: &Operation<'_>,
    ) -> Result<Outcome, Error> {
        let url = endpoint::url(&session.api_base, operation.endpoint);
        log::debug!("SEMS - Making {} to {}", operation.name, url);

        let reply = self
            .transport
            .post(&url, &session.header, operation.body.clone())
            .await?;

        self.classify(reply, operation)
    }

    fn classify(&self, reply: Reply, operation: &Operation<'_>) -> Result<Outcome, Error> {
        match reply.status {
            StatusCode::UNAUTHORIZED => return Ok(Outcome::TokenExpired),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                return Err(Error::Transient(format!("HTTP {}", reply.status)))
            }
            status if status.is_server_error() => {
                return Err(Error::Transient(format!("HTTP {}", status)))
            }
            status if !status.is_success() => {
                return Err(Error::Api {
                    code: status.as_u16().to_string(),
                    message: format!("{} answered HTTP {}", operation.name, status),
                })
            }
            _ => {}
        }

        if !operation.requires_data && reply.body.trim().is_empty() {
            return Ok(Outcome::Data(Value::Null));
        }

        let envelope = Envelope::parse(&reply.body)?;
        match envelope.status(&self.policy.expiry_codes) {
            Status::TokenExpired => Ok(Outcome::TokenExpired),
            Status::Failed { code, message } => Err(Error::Api { code, message }),
            Status::Success if operation.requires_data && envelope.data.is_null() => Err(
                Error::Parse(format!("{} response missing data field", operation.name)),
            ),
            Status::Success => Ok(Outcome::Data(envelope.data)),
        }
    }
}
