pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{BeaverServer, ServerBuilder, build_app, build_auth_state};
