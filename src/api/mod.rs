pub mod endpoint;
pub mod error;
pub mod executor;
pub mod request;
pub mod response;
pub mod token;
pub mod transport;

use crate::model::{Credentials, NormalizedSnapshot, PowerState};
use crate::normalize;
pub use error::Error;
use executor::{Operation, RetryPolicy, RetryingRequestExecutor};
use token::TokenStore;
use transport::{HttpTransport, Transport};

use std::sync::Arc;
use std::time::Duration;

/// Knobs of a `SemsClient`; `Default` matches the public SEMS portal.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub login_url: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            login_url: endpoint::LOGIN_URL.to_string(),
            request_timeout: transport::DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Client for one SEMS portal account.
///
/// Calls may overlap; they share one session token, renewed at most once per
/// expiry no matter how many calls notice it.
pub struct SemsClient {
    executor: RetryingRequestExecutor,
}

impl SemsClient {
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new(options.request_timeout)?);
        Ok(Self::with_transport(credentials, options, transport))
    }

    pub fn with_transport(
        credentials: Credentials,
        options: ClientOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let tokens = TokenStore::new(transport.clone(), options.login_url, credentials);
        SemsClient {
            executor: RetryingRequestExecutor::new(tokens, transport, options.retry),
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        self.executor.tokens()
    }

    /// Check the credentials with a fresh login, independent of any data fetch.
    pub async fn authenticate(&self) -> Result<(), Error> {
        self.tokens().force_refresh().await.map(|_| ())
    }

    /// Swap credentials after the host collected new ones; the next call logs in again.
    pub fn update_credentials(&self, credentials: Credentials) {
        log::info!("SEMS credentials updated for {}", credentials.username);
        self.tokens().update_credentials(credentials);
    }

    /// List power station identifiers owned by the account.
    pub async fn station_ids(&self) -> Result<Vec<String>, Error> {
        let operation = Operation {
            name: "getPowerStationIds API call",
            endpoint: endpoint::STATION_IDS,
            body: String::new(),
            requires_data: true,
        };
        let data = self.executor.execute(&operation).await?;
        Ok(response::station_ids::station_ids(&data))
    }

    /// Fetch and normalize the monitor detail of a station.
    ///
    /// With no (or an empty) `station_id`, the configured one is used, and
    /// failing that the first station of the account.
    pub async fn fetch_station_data(
        &self,
        station_id: Option<&str>,
    ) -> Result<NormalizedSnapshot, Error> {
        let station_id = self.resolve_station(station_id).await?;

        let body = serde_json::to_string(&request::MonitorDetail {
            power_station_id: &station_id,
        })?;
        let operation = Operation {
            name: "getData API call",
            endpoint: endpoint::MONITOR_DETAIL,
            body,
            requires_data: true,
        };
        let data = self.executor.execute(&operation).await?;
        let snapshot = normalize::snapshot(&station_id, &data)?;

        log::debug!(
            "SEMS update complete for station {}: {} inverters, powerflow: {}",
            station_id,
            snapshot.inverters.len(),
            snapshot.powerflow.is_some()
        );
        Ok(snapshot)
    }

    /// Pause or resume an inverter.
    ///
    /// Returns once the portal acknowledged the command. The inverter may take
    /// about a minute to follow; fetch data again later to observe it.
    pub async fn set_inverter_power(&self, serial: &str, state: PowerState) -> Result<(), Error> {
        if serial.trim().is_empty() {
            return Err(Error::InvalidInput(String::from("empty inverter serial number")));
        }

        let body = serde_json::to_string(&request::RemoteControl::new(serial, state))?;
        let name = format!("power control command for inverter {}", serial);
        let operation = Operation {
            name: &name,
            endpoint: endpoint::REMOTE_CONTROL,
            body,
            requires_data: false,
        };
        self.executor.execute(&operation).await?;

        log::info!("SEMS accepted power {:?} for inverter {}", state, serial);
        Ok(())
    }

    async fn resolve_station(&self, station_id: Option<&str>) -> Result<String, Error> {
        if let Some(id) = station_id.map(str::trim).filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let configured = self.tokens().credentials().station_id;
        if !configured.trim().is_empty() {
            return Ok(configured.trim().to_string());
        }

        log::debug!("SEMS - No station ID provided, using first found");
        let id = self
            .station_ids()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoStation)?;
        log::debug!("SEMS - Found power station ID: {}", id);
        Ok(id)
    }
}


#[cfg(test)]
mod test {
    use super::testing::{monitor_detail_reply, ScriptedTransport};
    use super::transport::Reply;
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn client(transport: &Arc<ScriptedTransport>, credentials: Credentials) -> SemsClient {
        let mut options = ClientOptions::default();
        options.retry.retry_delay = Duration::ZERO;
        SemsClient::with_transport(credentials, options, transport.clone())
    }

    fn night_station() -> serde_json::Value {
        json!({
            "info": {"powerstation_id": "station-1", "stationname": "Test Solar Farm"},
            "kpi": {"currency": "EUR", "total_power": 18843.2},
            "inverter": [{
                "invert_full": {
                    "name": "Zolder",
                    "sn": "GW0000SN000TEST1",
                    "status": -1,
                    "pac": 0,
                    "tempperature": 0.0,
                    "eday": 0.0,
                    "etotal": 18843.2
                }
            }],
            "hasPowerflow": true,
            "homKit": {"sn": null, "homeKitLimit": false},
            "powerflow": {
                "pv": "", "pvStatus": 0,
                "load": "", "loadStatus": 1,
                "grid": "-817(W)", "gridStatus": -1,
                "bettery": "", "betteryStatus": 0,
                "genset": "", "soc": 0
            }
        })
    }

    #[tokio::test]
    async fn night_time_fetch_yields_absent_values() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(monitor_detail_reply(night_station())));
        let client = client(&transport, Credentials::new("user", "pass"));

        let snapshot = client.fetch_station_data(Some("station-1")).await.unwrap();

        let inverter = &snapshot.inverters["GW0000SN000TEST1"];
        assert_eq!(Some(Decimal::ZERO), inverter.output_power);
        let powerflow = snapshot.powerflow.unwrap();
        assert_eq!(None, powerflow.load);
        assert_eq!(None, powerflow.photovoltaic);
        assert_eq!(Some("-817".parse().unwrap()), powerflow.grid);
        assert_eq!("station-1", snapshot.station_id);

        let (_, _, body) = transport.requests().pop().unwrap();
        assert_eq!(r#"{"powerStationId":"station-1"}"#, body);
    }

    #[tokio::test]
    async fn fetch_recovers_from_expired_token() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(Reply::ok(
            r#"{"hasError":true,"code":100002,"msg":"The authorization has expired, please log in again.","data":null}"#,
        )));
        transport.push_call(Ok(monitor_detail_reply(night_station())));
        let client = client(&transport, Credentials::new("user", "pass"));
        client.authenticate().await.unwrap();

        let snapshot = client.fetch_station_data(Some("station-1")).await.unwrap();

        assert_eq!(1, snapshot.inverters.len());
        /* authenticate plus one renewal */
        assert_eq!(2, transport.logins());
    }

    #[tokio::test]
    async fn discovers_first_station_when_none_configured() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(Reply::ok(
            r#"{"code":0,"data":"12345678-1234-5678-9abc-123456789abc","msg":"操作成功"}"#,
        )));
        transport.push_call(Ok(monitor_detail_reply(night_station())));
        let client = client(&transport, Credentials::new("user", "pass"));

        let snapshot = client.fetch_station_data(None).await.unwrap();

        assert_eq!("12345678-1234-5678-9abc-123456789abc", snapshot.station_id);
        let requests = transport.requests();
        assert!(requests[1].0.ends_with("/PowerStation/GetPowerStationIdByOwner"));
        assert_eq!(
            r#"{"powerStationId":"12345678-1234-5678-9abc-123456789abc"}"#,
            requests[2].2
        );
    }

    #[tokio::test]
    async fn configured_station_skips_discovery() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(monitor_detail_reply(night_station())));
        let credentials = Credentials::new("user", "pass").with_station_id("configured");
        let client = client(&transport, credentials);

        let snapshot = client.fetch_station_data(Some("  ")).await.unwrap();

        assert_eq!("configured", snapshot.station_id);
        assert_eq!(1, transport.calls());
    }

    #[tokio::test]
    async fn no_station_on_account() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(Reply::ok(r#"{"code":0,"data":[]}"#)));
        let client = client(&transport, Credentials::new("user", "pass"));

        assert_eq!(Err(Error::NoStation), client.fetch_station_data(None).await);
    }

    #[tokio::test]
    async fn malformed_payload_is_parse_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(monitor_detail_reply(json!(["not", "an", "object"]))));
        let client = client(&transport, Credentials::new("user", "pass"));

        assert!(matches!(
            client.fetch_station_data(Some("station-1")).await,
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn power_off_returns_without_polling() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(Reply::ok(r#"{"code":0,"msg":"操作成功","data":null}"#)));
        let client = client(&transport, Credentials::new("user", "pass"));

        client
            .set_inverter_power("GW0000SN000TEST1", PowerState::Off)
            .await
            .unwrap();

        /* login plus the command, nothing else */
        assert_eq!(1, transport.calls());
        let (url, _, body) = transport.requests().pop().unwrap();
        assert_eq!(
            "https://eu.semsportal.com/api/PowerStation/SaveRemoteControlInverter",
            url
        );
        assert_eq!(
            r#"{"InverterSN":"GW0000SN000TEST1","InverterStatusSettingMark":"1","InverterStatus":"0"}"#,
            body
        );
    }

    #[tokio::test]
    async fn power_command_retries_after_expiry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_call(Ok(Reply {
            status: http::StatusCode::UNAUTHORIZED,
            body: String::new(),
        }));
        transport.push_call(Ok(Reply::ok("")));
        let client = client(&transport, Credentials::new("user", "pass"));

        client
            .set_inverter_power("GW0000SN000TEST1", PowerState::On)
            .await
            .unwrap();

        assert_eq!(2, transport.logins());
        let (_, _, body) = transport.requests().pop().unwrap();
        assert!(body.ends_with(r#""InverterStatus":"1"}"#));
    }

    #[tokio::test]
    async fn empty_serial_is_rejected_locally() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport, Credentials::new("user", "pass"));

        assert!(matches!(
            client.set_inverter_power(" ", PowerState::On).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn authenticate_reports_rejection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_login(Ok(Reply::ok(r#"{"code":1001,"msg":"Invalid credentials"}"#)));
        let client = client(&transport, Credentials::new("user", "wrong"));

        let error = client.authenticate().await.unwrap_err();

        assert!(error.requires_reauthentication());
    }

    #[tokio::test]
    async fn login_and_fetch_over_http() {
        let mut server = mockito::Server::new_async().await;
        let api = format!("{}/api/", server.url());
        let login = server
            .mock("POST", "/api/v2/Common/CrossLogin")
            .match_header("token", endpoint::ANONYMOUS_TOKEN)
            .match_body(mockito::Matcher::Json(
                json!({"account": "user", "pwd": "pass"}),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "code": "0",
                    "msg": "操作成功",
                    "data": {"uid": "u", "timestamp": 1, "token": "t"},
                    "api": api
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let detail = server
            .mock("POST", "/api/v3/PowerStation/GetMonitorDetailByPowerstationId")
            .match_header(
                "token",
                mockito::Matcher::Regex(r#""token":"t""#.to_string()),
            )
            .match_body(mockito::Matcher::Json(json!({"powerStationId": "station-1"})))
            .with_status(200)
            .with_body(
                json!({"code": 0, "msg": "操作成功", "data": night_station()}).to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let options = ClientOptions {
            login_url: format!("{}/api/v2/Common/CrossLogin", server.url()),
            ..ClientOptions::default()
        };
        let client = SemsClient::new(Credentials::new("user", "pass"), options).unwrap();

        let snapshot = client.fetch_station_data(Some("station-1")).await.unwrap();

        assert!(snapshot.inverters.contains_key("GW0000SN000TEST1"));
        login.assert_async().await;
        detail.assert_async().await;
    }
}
