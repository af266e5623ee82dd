pub mod config;
pub mod engine;
pub mod errors;
pub mod generate;
pub mod manifest;
pub mod metrics_api;
pub mod model;
pub mod providers;
pub mod registry;
pub mod report;
pub mod scenario;
