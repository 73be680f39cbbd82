//! Infrastructure layer for HTTP, session handling, and external integrations
//!
//! This module provides the cookie-session HTTP client, the page collaborator
//! that drives navigation and form submission, the ownership-endpoint client,
//! configuration, logging, and the output sinks.

pub mod config;  // Configuration structures and persistence
pub mod export;  // JSON and CSV output sinks
pub mod http_client;
pub mod logging;  // Logging infrastructure
pub mod ownership_endpoint;
pub mod page_session;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, LoggingConfig};
pub use export::{write_raw, write_table, ExportError};
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::{init_logging_with_config, get_log_directory};
pub use ownership_endpoint::OwnershipEndpoint;
pub use page_session::{PageMarker, PageSession, SessionError};
