pub mod badge;
pub mod color;
pub mod config;
pub mod config_validator;
pub mod error;
pub mod handlers;
pub mod health;
pub mod memory;
pub mod middleware;
pub mod parser;
pub mod providers;
pub mod rate_limiter;
pub mod redis;
pub mod render;
pub mod resolver;
pub mod response;
pub mod server;
pub mod store;

pub use badge::{BadgeData, BadgeRequest, ShieldKind};
pub use config::Config;
pub use error::{BadgeError, ParseError, Result};
pub use handlers::AppState;
pub use server::create_app;
pub use store::CacheStore;
