//! Variomedia DNS Export
//!
//! Pulls customers, domains and DNS records from the Variomedia REST API and
//! flattens the address records into rotating CSV files, either once at
//! startup or on demand over HTTP.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod server;
pub mod startup;
pub mod variomedia;
pub mod writer;

pub use config::{Cli, ExportSettings};
pub use error::ExportError;
pub use export::{run_export, ExportReport, ExportRequest};
pub use variomedia::{VariomediaApi, VariomediaClient};
