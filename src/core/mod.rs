pub mod abort;
pub mod config;
pub mod error;
pub mod types;
