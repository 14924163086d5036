//! # filedrop server library
//!
//! A small HTTP file-sharing server. Clients upload files into a storage
//! directory and download them again; both directions are gated by a single
//! shared password. `GET /` renders a listing page with upload and download
//! forms.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use server::{Config, HttpServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.auth.password = "secret".to_string();
//!     config.validate()?;
//!
//!     let server = HttpServer::bind(config).await?;
//!     server.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, overrides and validation
//! - [`files`]: Storage directory operations
//! - [`http`]: Routes, handlers and the listening server

pub mod config;
pub mod files;
pub mod http;

pub use config::{Config, ConfigError, ConfigOverrides, DownloadRoot};
pub use files::{FileStore, PendingUpload, StoreError};
pub use http::{router, ApiError, AppState, HttpServer};
