use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Credentials rejected by the portal; the host must ask for new ones.
    #[error("authentication rejected: {0}")]
    Auth(String),
    /// Network failure, timeout or a temporarily unavailable server.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Well-formed business-level failure unrelated to the session.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("{operation} failed after {attempts} attempts")]
    OutOfRetries { operation: String, attempts: u32 },
    #[error("invalid response: {0}")]
    Parse(String),
    #[error("no power station found for this account")]
    NoStation,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether another attempt within the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Parse(error.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error.to_string())
    }
}

fn html(status: Status, title: &str, detail: String) -> response::Result<'static> {
    let body = format!(
        "<html><body><h3>{}</h3><code>{}</code></body></html>",
        title, detail
    );
    Response::build()
        .status(status)
        .sized_body(body.len(), Cursor::new(body))
        .header(ContentType::new("text", "html"))
        .ok()
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::Auth(_) => html(
                Status::Forbidden,
                "403 Forbidden",
                format!("Error while authenticating to SEMS portal: {}", self),
            ),
            Error::Transient(_) | Error::OutOfRetries { .. } => html(
                Status::ServiceUnavailable,
                "503 Service Unavailable",
                self.to_string(),
            ),
            Error::InvalidInput(_) => html(Status::BadRequest, "400 Bad Request", self.to_string()),
            _ => html(
                Status::InternalServerError,
                "Unknown exception",
                format!("{:?}", self),
            ),
        }
    }
}
