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
        .route("/meals", post(handlers::create_listing))
        .route("/meals/mine", get(handlers::my_listings))
        .route("/meals/past", get(handlers::past_orders))
        .route("/meals/sweep", post(handlers::sweep))
}
