// Library exports for msgpurge crate
// This allows tests and the binary to use the modules

pub mod api_client;
pub mod config;
pub mod deletion_runner;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod retry;
pub mod run_log;
pub mod stats;
