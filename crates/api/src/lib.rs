//! Walwal notification API.
//!
//! Endpoints:
//! - GET  /health
//! - GET  /api/notifications: cursor-paginated history
//! - POST /api/notifications/{id}/read
//! - POST|DELETE /api/alarm/token, POST /api/alarm/token/refresh: push tokens
//! - POST /api/records/{id}/comments: post a comment and fan out
//! - POST /api/records/{id}/boosts: add boosts and evaluate milestones
//! - POST /api/internal/broadcasts, POST /api/internal/tokens/prune: scheduler hooks

pub mod middleware;
pub mod routes;
pub mod state;
