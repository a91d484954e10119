pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use crate::{config::AppConfig, db::DbPool, services::lifecycle::OrderLifecycleService};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub lifecycle: Arc<OrderLifecycleService>,
}
