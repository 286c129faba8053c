#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

use chrono::{Local, NaiveTime, Timelike};
use rocket::http::ContentType;
use rocket::{Build, Rocket, State};
use sems_rs::{Error, PowerState, SemsClient, Settings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

mod metrics;

/// The portal reports phantom readings around the day rollover.
fn is_midnight_window(time: NaiveTime) -> bool {
    match (time.hour(), time.minute()) {
        (23, minute) => minute >= 55,
        (0, minute) => minute <= 10,
        _ => false,
    }
}

/// Structure containing state for API handlers.
pub struct StateData {
    client: SemsClient,
    poll_interval: u64,
    stale_threshold: u64,
    midnight_skip: bool,
    /// Timestamp of last successful poll of the portal
    timestamp: Mutex<Option<Instant>>,
    was_stale: AtomicBool,
    in_midnight_window: AtomicBool,
}

impl StateData {
    fn from_settings(settings: &Settings) -> Result<Self, Error> {
        Ok(StateData {
            client: SemsClient::new(settings.credentials(), settings.client_options())?,
            poll_interval: settings.poll_interval,
            stale_threshold: settings.stale_threshold,
            midnight_skip: settings.midnight_skip,
            timestamp: Mutex::new(None),
            was_stale: AtomicBool::new(false),
            in_midnight_window: AtomicBool::new(false),
        })
    }

    /// Updates `timestamp` to `now()`.
    fn touch(&self) {
        if let Ok(mut ts) = self.timestamp.lock() {
            *ts = Some(Instant::now());
        } else {
            log::trace!("Unable to lock timestamp mutex, will refresh again")
        }
    }

    /// Time since the last `touch()`, `None` before the first successful poll.
    fn data_age(&self) -> Option<Duration> {
        self.timestamp
            .lock()
            .ok()
            .and_then(|ts| ts.map(|ts| ts.elapsed()))
    }

    /// Checks whether `interval_secs` elapsed since last `touch()`
    fn interval_elapsed(&self, interval_secs: u64) -> bool {
        /* Never polled yet */
        self.data_age()
            .map_or(true, |elapsed| elapsed.as_secs() >= interval_secs)
    }

    fn is_stale(&self) -> bool {
        self.data_age()
            .map_or(false, |age| age.as_secs() > self.stale_threshold)
    }

    /// Logs transitions into and out of staleness, returns the current state.
    fn check_staleness(&self) -> bool {
        let stale = self.is_stale();
        let was_stale = self.was_stale.swap(stale, Ordering::SeqCst);
        if stale && !was_stale {
            log::warn!(
                "SEMS data is stale - last successful update was {:?} ago (threshold: {} seconds)",
                self.data_age().unwrap_or_default(),
                self.stale_threshold
            );
        } else if !stale && was_stale {
            log::info!("SEMS data is no longer stale - fresh data received");
        }
        stale
    }

    /// Whether to serve cached readings instead of polling at `now`.
    ///
    /// Only applies once there is something cached to serve.
    fn skip_for_midnight(&self, now: NaiveTime) -> bool {
        if !self.midnight_skip {
            return false;
        }
        let in_window = is_midnight_window(now);
        let was_in_window = self.in_midnight_window.swap(in_window, Ordering::SeqCst);
        if in_window && !was_in_window {
            log::info!("Entering midnight skip window - using cached data to avoid phantom values");
        } else if !in_window && was_in_window {
            log::info!("Exiting midnight skip window - resuming API fetches");
        }
        in_window && self.data_age().is_some()
    }
}

#[get("/metrics")]
async fn metrics_route(state: &State<StateData>) -> Result<String, Error> {
    if state.skip_for_midnight(Local::now().time()) {
        log::debug!("Midnight skip active - returning cached result");
    } else if state.interval_elapsed(state.poll_interval) {
        match state.client.fetch_station_data(None).await {
            Ok(snapshot) => {
                metrics::record(&snapshot);
                metrics::record_success(SystemTime::now());
                state.touch();
            }
            /* Keep serving the last readings, their age tells the scraper */
            Err(e) if state.data_age().is_some() => {
                log::warn!("SEMS poll failed, returning cached result: {}", e)
            }
            Err(e) => return Err(e),
        }
    } else {
        log::info!("interval time not yet elapsed since last run; returning cached result")
    }

    let stale = state.check_staleness();
    metrics::record_freshness(state.data_age(), stale);
    metrics::read()
}

#[get("/snapshot")]
async fn snapshot_route(state: &State<StateData>) -> Result<(ContentType, String), Error> {
    let snapshot = state.client.fetch_station_data(None).await?;
    metrics::record(&snapshot);
    metrics::record_success(SystemTime::now());
    state.touch();

    let body = serde_json::to_string_pretty(&snapshot)?;
    Ok((ContentType::JSON, body))
}

#[post("/inverters/<serial>/power/<power_state>")]
async fn power_route(
    state: &State<StateData>,
    serial: &str,
    power_state: &str,
) -> Result<String, Error> {
    let power_state: PowerState = power_state.parse().map_err(Error::InvalidInput)?;
    state.client.set_inverter_power(serial, power_state).await?;

    Ok(format!("{:?} accepted for {}\n", power_state, serial))
}

#[launch]
fn rocket() -> Rocket<Build> {
    env_logger::init();

    let state = match Settings::from_env().and_then(|settings| StateData::from_settings(&settings)) {
        Ok(state) => state,
        Err(e) => {
            log::error!("Unable to start: {}", e);
            std::process::exit(1);
        }
    };

    rocket::build()
        .manage(state)
        .mount("/", routes![metrics_route, snapshot_route, power_route])
}
