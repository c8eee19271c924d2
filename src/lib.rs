pub mod catalog;
pub mod change;
pub mod compose;
pub mod conflict;
pub mod dates;
pub mod db;
pub mod detect;
pub mod error;
pub mod gate;
pub mod llm;
pub mod logger;
pub mod mail;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod routes;
pub mod steps;
pub mod tasks;

use catalog::CatalogCache;
use db::Db;
use llm::LlmGateway;
use mail::Outbox;
use pipeline::EventLocks;
use rate_limit::{RateLimitConfig, RateLimiter};
use rocket_cors::CorsOptions;
use std::env;

pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_path = env::var("DATABASE_PATH").unwrap_or_else(|_| "data/venue.db".to_string());
    rocket_with_db(&db_path)
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, RateLimitConfig::from_env())
}

pub fn rocket_with_db_and_config(
    db_path: &str,
    rate_config: RateLimitConfig,
) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, rate_config)
}

fn build_rocket(db_path: &str, rate_config: RateLimitConfig) -> rocket::Rocket<rocket::Build> {
    // Ensure data directory exists
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let db = Db::new(db_path);
    let outbox = Outbox::new();

    // Subscribe the mail dispatcher BEFORE handing the Outbox to Rocket
    let mail_receiver = outbox.sender.subscribe();
    let sweeper_db_path = db_path.to_string();

    let cors = CorsOptions::default()
        .to_cors()
        .expect("Failed to create CORS");

    rocket::build()
        .manage(db)
        .manage(outbox)
        .manage(CatalogCache::default())
        .manage(LlmGateway::from_env())
        .manage(EventLocks::default())
        .manage(rate_config)
        .manage(RateLimiter::new())
        .attach(cors)
        .register(
            "/",
            rocket::catchers![routes::too_many_requests, routes::not_found],
        )
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::stats,
                routes::start_conversation,
                routes::send_message,
                routes::pending_tasks,
                routes::approve_task,
                routes::reject_task,
                routes::cleanup_tasks,
                routes::get_event,
                routes::cancel_event,
                routes::pay_deposit,
                routes::event_progress,
                routes::event_activity,
                routes::get_config_section,
                routes::set_config_section,
                routes::get_prompt_history,
                routes::revert_prompts,
                routes::get_info_snapshot,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_liftoff(
            "Mail Dispatcher",
            move |_rocket| {
                Box::pin(async move {
                    mail::spawn_dispatcher(mail_receiver);
                    println!("📨 Mail dispatcher started");
                })
            },
        ))
        .attach(rocket::fairing::AdHoc::on_liftoff("Task Sweeper", {
            move |_rocket| {
                Box::pin(async move {
                    tasks::spawn_sweeper(sweeper_db_path);
                    println!("🧹 Task/snapshot sweeper started");
                })
            }
        }))
}
