use axum::{Router, routing::get};

pub mod basket;
pub mod catalog;
pub mod contacts;
pub mod jobs;
pub mod orders;
pub mod partner;
pub mod system;

/// Endpoints anyone may call.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .merge(catalog::router())
}

/// Endpoints that need a bearer token.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/partner", partner::router())
        .nest("/basket", basket::router())
        .nest("/order", orders::router())
        .nest("/jobs", jobs::router())
        .nest("/user/contact", contacts::router())
}
