pub mod app;
pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod form;
pub mod headers;
pub mod log_buffer;
pub mod mock;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod transport;

pub use error::{Error, Result};
