use crate::api::token::SessionToken;
use crate::api::Error;
use serde_json::Value;

use std::time::Instant;

/// Build a session token out of a successful `CrossLogin` envelope.
///
/// The `data` object is sent back verbatim as the `token` header of later
/// requests, with the `api` base URL appended to it the way the portal's own
/// clients do.
pub fn session_token(data: Value, api: Option<String>, generation: u64) -> Result<SessionToken, Error> {
    let mut data = match data {
        Value::Object(map) => map,
        other => {
            return Err(Error::Parse(format!(
                "login response data was not an object: {}",
                other
            )))
        }
    };

    if !data.get("token").map_or(false, Value::is_string) {
        return Err(Error::Parse(String::from("login response carries no token")));
    }

    let api = api
        .filter(|api| !api.is_empty())
        .ok_or_else(|| Error::Parse(String::from("login response carries no api url")))?;

    data.insert(String::from("api"), Value::String(api.clone()));

    Ok(SessionToken {
        header: Value::Object(data).to_string(),
        api_base: api,
        issued_at: Instant::now(),
        generation,
    })
}
