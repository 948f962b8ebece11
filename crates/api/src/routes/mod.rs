pub mod alarm;
pub mod health;
pub mod internal;
pub mod notifications;
pub mod records;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .merge(alarm::router())
        .merge(records::router())
        .merge(internal::router())
        .with_state(state)
}
