pub mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/catalog", get(handlers::catalog))
        .route("/catalog/ask", post(handlers::ask))
        .route("/orders", post(handlers::place_order))
        .route("/orders/mine", get(handlers::my_orders))
}
