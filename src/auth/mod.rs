use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod bridge;
pub mod credentials;
mod dto;
pub mod handlers;
pub mod password;
pub mod session;
pub mod token;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/assertion", post(handlers::assertion_login))
        .route("/auth/me", get(handlers::me))
}
