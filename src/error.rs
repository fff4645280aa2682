//! Centralized HTTP error surface (§7 External interfaces / error handling).
//! Grounded in the teacher's `(Status, Json<Value>)` tuple returns sprinkled
//! across src/routes/*.rs, generalized into one enum with a single
//! `Responder` impl so every control-plane handler returns a plain
//! `Result<T, RelayError>` instead of hand-building a status/body pair at
//! each call site — the same centralization `thiserror` buys in the pack's
//! other CLI-shaped crates (sblanchard-SerialAgent, iwismer-rusty-timer).

use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("group {0} not found")]
    GroupNotFound(String),

    #[error("user {0} is not a member of this group")]
    NotAMember(String),

    #[error("user {0} is banned from this group")]
    Banned(String),

    #[error("user {0} is muted in this group")]
    Muted(String),

    #[error("user {0} lacks admin privileges for this action")]
    NotAdmin(String),

    #[error("cannot remove the only admin: this member is the only admin left in the group")]
    LastAdmin,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RelayError {
    fn status(&self) -> Status {
        match self {
            RelayError::GroupNotFound(_) => Status::NotFound,
            RelayError::NotAMember(_) | RelayError::Banned(_) | RelayError::NotAdmin(_) => {
                Status::Forbidden
            }
            RelayError::Muted(_) => Status::Forbidden,
            RelayError::LastAdmin => Status::BadRequest,
            RelayError::BadRequest(_) => Status::UnprocessableEntity,
            RelayError::Storage(_) => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for RelayError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        tracing::warn!(%status, error = %self, "request failed");
        Responder::respond_to((status, body), request)
    }
}
