pub mod api;
pub mod cli;
pub mod config;
pub mod credits;
pub mod error;
pub mod http;
pub mod paginate;
pub mod reviews;
pub mod search;
pub mod store;
pub mod types;

pub use error::{Error, Result};
