pub mod config;
pub mod error;
pub mod headers;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod translate;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use proxy::{Gateway, ProxyResult};
pub use server::{build_router, AppState};
