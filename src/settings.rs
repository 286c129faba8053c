use crate::api::endpoint;
use crate::api::executor::RetryPolicy;
use crate::api::{ClientOptions, Error};
use crate::model::Credentials;
use config::{Config, Environment, Source};
use serde::Deserialize;

use std::time::Duration;

/// Environment prefix: `SEMS_USERNAME`, `SEMS_PASSWORD`, `SEMS_STATION_ID`, ...
pub const ENV_PREFIX: &str = "SEMS";

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub username: String,
    pub password: String,
    /// Empty picks the first station of the account.
    pub station_id: String,
    /// Minimum seconds between two portal polls of the metrics route.
    pub poll_interval: u64,
    pub login_url: String,
    /// Seconds.
    pub request_timeout: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Seconds without a successful poll after which readings count as stale.
    pub stale_threshold: u64,
    /// Serve cached readings instead of polling between 23:55 and 00:10.
    pub midnight_skip: bool,
}

impl Settings {
    /// Read settings from `SEMS_*` environment variables.
    pub fn from_env() -> Result<Settings, Error> {
        Self::from_source(Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_source<T>(source: T) -> Result<Settings, Error>
    where
        T: Source + Send + Sync + 'static,
    {
        let mut settings = Config::default();
        settings
            .set_default("station_id", "")?
            .set_default("poll_interval", 60_i64)?
            .set_default("login_url", endpoint::LOGIN_URL)?
            .set_default("request_timeout", 30_i64)?
            .set_default("max_attempts", 3_i64)?
            .set_default("retry_delay_ms", 500_i64)?
            .set_default("stale_threshold", 600_i64)?
            .set_default("midnight_skip", true)?
            .merge(source)?;

        let settings: Settings = settings.try_into()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.username.trim().is_empty() {
            return Err(Error::Config(String::from("username must not be empty")));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config(String::from("max_attempts must be at least 1")));
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password).with_station_id(&self.station_id)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            login_url: self.login_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                retry_delay: Duration::from_millis(self.retry_delay_ms),
                ..RetryPolicy::default()
            },
        }
    }
}
