use std::sync::Arc;

use smartbox_core::actuator::CompartmentActuator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: smartbox_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Sends open signals to compartments.
    pub actuator: Arc<dyn CompartmentActuator>,
}
