pub mod dto;
pub mod handlers;
pub mod repo;
pub mod session;

use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signin", post(handlers::sign_in))
        .route("/auth/signout", post(handlers::sign_out))
        .route("/me", get(handlers::me))
        .route("/me/role", put(handlers::set_role))
        .route("/me/details", put(handlers::set_details))
}
