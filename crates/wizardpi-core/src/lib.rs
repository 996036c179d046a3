pub mod error;
pub mod types;
pub mod config;
pub mod store;
pub mod session;
pub mod bridge;
pub mod sync;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
