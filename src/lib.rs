pub mod config;
pub mod driver;
pub mod errors;
pub mod resolve;
pub mod runner;
pub mod stats;
pub mod summary;
pub mod types;
