pub type Endpoint = str;

pub const LOGIN_URL: &str = "https://www.semsportal.com/api/v2/Common/CrossLogin";

/* Relative to the `api` base URL handed out by the login call */
pub const STATION_IDS: &Endpoint = "PowerStation/GetPowerStationIdByOwner";
pub const MONITOR_DETAIL: &Endpoint = "v3/PowerStation/GetMonitorDetailByPowerstationId";
/* Undocumented; request shape must not change */
pub const REMOTE_CONTROL: &Endpoint = "PowerStation/SaveRemoteControlInverter";

/// `token` header sent with the login request, before any session exists.
pub const ANONYMOUS_TOKEN: &str = r#"{"version":"","client":"ios","language":"en"}"#;

pub fn url(api_base: &str, endpoint: &Endpoint) -> String {
    format!(
        "{}/{}",
        api_base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
