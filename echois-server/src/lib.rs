pub mod config;
pub mod http;
pub mod state;

pub use config::ServerConfig;
pub use http::create_router;
pub use state::AppState;
