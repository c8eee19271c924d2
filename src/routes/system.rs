use crate::db::Db;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, catch, get};

use super::{ApiError, TeamId, api_error};

/// The only public endpoint — no tenant header required.
#[get("/api/v1/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "venue-desk",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/api/v1/stats")]
pub fn stats(db: &State<Db>, team: TeamId) -> Json<serde_json::Value> {
    let conn = db.conn();
    let count = |sql: &str| -> i64 {
        conn.query_row(sql, rusqlite::params![team.0], |r| r.get(0))
            .unwrap_or(0)
    };

    let events_total = count("SELECT COUNT(*) FROM events WHERE tenant_id = ?1");
    let events_lead = count("SELECT COUNT(*) FROM events WHERE tenant_id = ?1 AND status = 'lead'");
    let events_option =
        count("SELECT COUNT(*) FROM events WHERE tenant_id = ?1 AND status = 'option'");
    let events_confirmed =
        count("SELECT COUNT(*) FROM events WHERE tenant_id = ?1 AND status = 'confirmed'");
    let events_cancelled =
        count("SELECT COUNT(*) FROM events WHERE tenant_id = ?1 AND status = 'cancelled'");
    let pending_tasks =
        count("SELECT COUNT(*) FROM tasks WHERE tenant_id = ?1 AND status = 'pending'");
    let messages = count("SELECT COUNT(*) FROM messages WHERE tenant_id = ?1");
    let clients = count("SELECT COUNT(*) FROM clients WHERE tenant_id = ?1");

    Json(serde_json::json!({
        "events": {
            "total": events_total,
            "lead": events_lead,
            "option": events_option,
            "confirmed": events_confirmed,
            "cancelled": events_cancelled,
        },
        "pending_tasks": pending_tasks,
        "messages": messages,
        "clients": clients,
    }))
}

/// Point-in-time info-page data; 404 once the TTL expired.
#[get("/api/v1/info/<snapshot_id>")]
pub fn get_info_snapshot(
    db: &State<Db>,
    team: TeamId,
    snapshot_id: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    db.get_snapshot(&team.0, snapshot_id)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .map(Json)
        .ok_or_else(|| api_error(Status::NotFound, "Snapshot not found or expired"))
}

#[catch(404)]
pub fn not_found() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Not found"}))
}

#[catch(429)]
pub fn too_many_requests() -> Json<serde_json::Value> {
    Json(serde_json::json!({"error": "Too many requests"}))
}
