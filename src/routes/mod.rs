// Route module decomposition — each API area in its own file.
// Shared request guards live here; route functions in submodules.

mod config;
mod conversation;
mod events;
mod system;
mod tasks;

// --- Re-exports (all route functions used by lib.rs mount) ---

pub use config::{get_config_section, get_prompt_history, revert_prompts, set_config_section};
pub use conversation::{send_message, start_conversation};
pub use events::{
    cancel_event, event_activity, event_progress, get_event, pay_deposit,
};
pub use system::{get_info_snapshot, health, not_found, stats, too_many_requests};
pub use tasks::{approve_task, cleanup_tasks, pending_tasks, reject_task};

// --- Shared request guards ---

use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

/// Multi-tenant isolation: every non-public endpoint requires `X-Team-Id`.
pub struct TeamId(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TeamId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.headers().get_one("X-Team-Id") {
            Some(id) if !id.trim().is_empty() => Outcome::Success(TeamId(id.trim().to_string())),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// The standard JSON error tuple used across all routes.
pub type ApiError = (Status, rocket::serde::json::Json<serde_json::Value>);

pub fn api_error(status: Status, message: &str) -> ApiError {
    (
        status,
        rocket::serde::json::Json(serde_json::json!({"error": message})),
    )
}
