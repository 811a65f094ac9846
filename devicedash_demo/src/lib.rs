//! In-memory device API speaking the dashboard's GraphQL operations.
//!
//! `POST /query` answers queries and mutations; `GET /query` upgrades to the
//! graphql-transport-ws sub-protocol for `deviceUpdated`.

pub mod graphql;
pub mod sampler;
pub mod state;
pub mod store;
pub mod ws;

use axum::{routing::get, Router};

pub use state::AppState;
pub use store::Store;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", get(ws::ws_handler).post(graphql::graphql_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}
