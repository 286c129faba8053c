pub mod login;
pub mod station_ids;

use serde::Deserialize;
use serde_json::Value;

/// Codes the portal answers with when the session token is no longer accepted.
pub const TOKEN_EXPIRED_CODES: &[&str] = &["100001", "100002"];

const SUCCESS_CODE: &str = "0";

/// `code` arrives either as a number or as a string (`0`, `"0"`, `100002`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code(pub String);

impl<'de> serde::Deserialize<'de> for Code {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(Code(s.trim().to_string())),
            Value::Number(n) => Ok(Code(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "unexpected response code: {}",
                other
            ))),
        }
    }
}

/* Envelope shared by every portal response */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub code: Option<Code>,
    #[serde(default)]
    pub msg: Option<String>,
    /// Sometimes sent as an explicit `null`.
    #[serde(default)]
    pub has_error: Option<bool>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub api: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum Status {
    Success,
    TokenExpired,
    Failed { code: String, message: String },
}

impl Envelope {
    pub fn parse(text: &str) -> Result<Envelope, super::Error> {
        serde_json::from_str(text).map_err(|e| {
            super::Error::Parse(format!("{} (response was: {})", e, truncate(text)))
        })
    }

    /// Classify the envelope. The structured `code` decides; `msg` is a
    /// localized string and only carried along as error text.
    ///
    /// A body without `code` is never a success: proxies and gateways answer
    /// with JSON of their own.
    pub fn status(&self, expiry_codes: &[String]) -> Status {
        let code = self.code.as_ref().map(|c| c.0.as_str());
        match code {
            Some(code) if expiry_codes.iter().any(|c| c == code) => Status::TokenExpired,
            Some(SUCCESS_CODE) if self.has_error != Some(true) => Status::Success,
            _ => Status::Failed {
                code: code.unwrap_or("unknown").to_string(),
                message: self
                    .msg
                    .clone()
                    .unwrap_or_else(|| "(no error message received)".to_string()),
            },
        }
    }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
