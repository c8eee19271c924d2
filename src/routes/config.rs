use crate::catalog::CatalogCache;
use crate::db::Db;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post};

use super::{ApiError, TeamId, api_error};

/// The configurable sections; anything else is a 404.
const SECTIONS: &[&str] = &[
    "global-deposit",
    "hil-mode",
    "email-format",
    "llm-provider",
    "pre-filter",
    "detection-mode",
    "prompts",
    "venue",
    "site-visit",
    "managers",
    "products",
    "menus",
    "catalog",
    "faq",
];

#[get("/api/v1/config/<section>")]
pub fn get_config_section(
    db: &State<Db>,
    team: TeamId,
    section: &str,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !SECTIONS.contains(&section) {
        return Err(api_error(Status::NotFound, "Unknown config section"));
    }
    let value = db
        .get_config(&team.0, section)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .unwrap_or(serde_json::Value::Null);
    Ok(Json(serde_json::json!({"section": section, "value": value})))
}

#[post("/api/v1/config/<section>", format = "json", data = "<body>")]
pub fn set_config_section(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    team: TeamId,
    section: &str,
    body: Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !SECTIONS.contains(&section) {
        return Err(api_error(Status::NotFound, "Unknown config section"));
    }

    // Prompt edits are versioned before the write goes through.
    if section == "prompts" {
        let _ = db.push_prompt_history(&team.0, &body);
    }

    db.set_config(&team.0, section, &body)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
    catalogs.invalidate(&team.0);

    Ok(Json(serde_json::json!({"section": section, "saved": true})))
}

#[get("/api/v1/config/prompts/history")]
pub fn get_prompt_history(
    db: &State<Db>,
    team: TeamId,
) -> Result<Json<serde_json::Value>, ApiError> {
    let history = db
        .prompt_history(&team.0)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
    let entries: Vec<serde_json::Value> = history
        .into_iter()
        .map(|(idx, prompts, saved_at)| {
            serde_json::json!({"idx": idx, "prompts": prompts, "saved_at": saved_at})
        })
        .collect();
    Ok(Json(serde_json::json!({"history": entries, "count": entries.len()})))
}

#[post("/api/v1/config/prompts/revert/<idx>")]
pub fn revert_prompts(
    db: &State<Db>,
    catalogs: &State<CatalogCache>,
    team: TeamId,
    idx: i64,
) -> Result<Json<serde_json::Value>, ApiError> {
    let prompts = db
        .prompt_history_at(&team.0, idx)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?
        .ok_or_else(|| api_error(Status::NotFound, "No prompt version at that index"))?;
    let _ = db.push_prompt_history(&team.0, &prompts);
    db.set_config(&team.0, "prompts", &prompts)
        .map_err(|e| api_error(Status::InternalServerError, &e.to_string()))?;
    catalogs.invalidate(&team.0);
    Ok(Json(serde_json::json!({"reverted_to": idx, "prompts": prompts})))
}
