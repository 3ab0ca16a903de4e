pub mod config;
pub mod observability;
pub mod runtime;

pub use config::AppConfig;
pub use runtime::{DictRuntime, RuntimeError};
