/*!
 * snowprobe - ServiceNow application interrogator
 *
 * Reads an application table through the Table REST API and reports on it:
 * - Lists the table's records
 * - Flags business rules edited by someone other than their creator
 * - Extracts the table schema from the data dictionary
 * - Creates a record from an XML payload
 *
 * All network access goes through [`client::TableClient`], which classifies
 * failures into HTTP, connection, transport and decode errors.
 */

pub mod cli_style;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod payload;
pub mod records;
pub mod rules;
pub mod schema;
pub mod xml;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use client::{TableApi, TableClient};
pub use config::{ConnectionParams, ProbeConfig};
pub use error::{ProbeError, Result};
pub use payload::{Record, RemotePayload};
pub use schema::{FieldType, TableSchema};
pub use xml::RecordDraft;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
