mod api;
pub mod args;
mod cache;
pub mod commands;
mod config;
mod error;
pub mod forecast;
pub mod model;
pub mod report;
mod session;
mod source;
mod utils;
mod web;


pub use api::Mode;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
