//! Infrastructure module - upstream client, persistence, config, logging

pub mod config;
pub mod database_connection;
pub mod holdings_repository;
pub mod logging;
pub mod status_repository;
pub mod transaction_repository;
pub mod upstream;

pub use config::{AppConfig, PipelineConfig, UpstreamConfig};
pub use database_connection::DatabaseConnection;
pub use holdings_repository::HoldingsRepository;
pub use status_repository::LoadStatusRepository;
pub use transaction_repository::TransactionRepository;
pub use upstream::{HttpUpstreamClient, UpstreamClient};
