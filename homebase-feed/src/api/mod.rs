//! HTTP API handlers for homebase-feed

pub mod auth;
pub mod feed;
pub mod health;

pub use auth::role_middleware;
pub use feed::get_feed;
pub use health::health_routes;
