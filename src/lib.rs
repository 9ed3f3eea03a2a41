mod api;
pub mod args;
pub mod auth;
pub mod commands;
mod config;
pub mod dashboard;
pub mod error;
pub mod model;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::Error;
pub use error::Result;
