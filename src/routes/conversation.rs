use crate::catalog::CatalogCache;
use crate::db::Db;
use crate::llm::LlmGateway;
use crate::mail::Outbox;
use crate::models::*;
use crate::pipeline::{self, EventLocks, Services};
use crate::rate_limit::{RateLimitConfig, RateLimited, RateLimiter};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};

use super::{ApiError, TeamId, api_error};

#[allow(clippy::too_many_arguments)]
#[post("/api/v1/conversations", format = "json", data = "<body>")]
pub fn start_conversation(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    gateway: &State<LlmGateway>,
    locks: &State<EventLocks>,
    outbox: &State<Outbox>,
    rate_limiter: &State<RateLimiter>,
    rate_config: &State<RateLimitConfig>,
    team: TeamId,
    body: Json<StartConversation>,
) -> Result<RateLimited<TurnResponse>, ApiError> {
    let email = body.client_email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(api_error(Status::BadRequest, "client_email must be a valid email"));
    }
    if body.email_body.trim().is_empty() || body.email_body.len() > 20_000 {
        return Err(api_error(Status::BadRequest, "email_body must be 1-20000 characters"));
    }

    let rl = rate_limiter.check_with_info(
        &format!("send_msg:{}", team.0),
        rate_config.messages_max,
        rate_config.messages_window_secs,
    );
    if !rl.allowed {
        return Err(rate_limited_error(&rl));
    }

    let _ = db.upsert_client(&team.0, &email, body.client_name.as_deref());

    let thread_id = uuid::Uuid::new_v4().to_string();
    let msg = InboundMessage {
        tenant_id: team.0.clone(),
        client_email: email,
        thread_id: thread_id.clone(),
        body: body.email_body.trim().to_string(),
        subject: body.subject.clone(),
        extras: InboundExtras::default(),
    };

    let services = Services {
        db: db.inner(),
        catalogs: catalogs.inner(),
        gateway: gateway.inner(),
        locks: locks.inner(),
        outbox: outbox.inner(),
    };
    let mut response = pipeline::run_turn(&services, &msg);
    response.session_id = Some(thread_id);

    Ok(RateLimited::new(Json(response), rl))
}

#[allow(clippy::too_many_arguments)]
#[post("/api/v1/messages", format = "json", data = "<body>")]
pub fn send_message(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    gateway: &State<LlmGateway>,
    locks: &State<EventLocks>,
    outbox: &State<Outbox>,
    rate_limiter: &State<RateLimiter>,
    rate_config: &State<RateLimitConfig>,
    team: TeamId,
    body: Json<SendMessageBody>,
) -> Result<RateLimited<TurnResponse>, ApiError> {
    let email = body.client_email.trim().to_lowercase();
    let thread_id = body.thread_id.trim().to_string();
    if thread_id.is_empty() {
        return Err(api_error(Status::BadRequest, "thread_id is required"));
    }
    if !email.contains('@') {
        return Err(api_error(Status::BadRequest, "client_email must be a valid email"));
    }
    if body.body.trim().is_empty() || body.body.len() > 20_000 {
        return Err(api_error(Status::BadRequest, "body must be 1-20000 characters"));
    }

    let rl = rate_limiter.check_with_info(
        &format!("send_msg:{}", team.0),
        rate_config.messages_max,
        rate_config.messages_window_secs,
    );
    if !rl.allowed {
        return Err(rate_limited_error(&rl));
    }

    let msg = InboundMessage {
        tenant_id: team.0.clone(),
        client_email: email,
        thread_id,
        body: body.body.trim().to_string(),
        subject: body.subject.clone(),
        extras: body.extras.clone().unwrap_or_default(),
    };

    let services = Services {
        db: db.inner(),
        catalogs: catalogs.inner(),
        gateway: gateway.inner(),
        locks: locks.inner(),
        outbox: outbox.inner(),
    };
    let response = pipeline::run_turn(&services, &msg);

    Ok(RateLimited::new(Json(response), rl))
}

fn rate_limited_error(rl: &crate::rate_limit::RateLimitInfo) -> ApiError {
    (
        Status::TooManyRequests,
        Json(serde_json::json!({
            "error": "Rate limited",
            "retry_after_secs": rl.retry_after_secs,
            "limit": rl.limit,
            "remaining": 0
        })),
    )
}
