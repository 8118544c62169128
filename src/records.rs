/*!
 * Application table reads and writes
 */

use tracing::info;

use crate::client::TableApi;
use crate::error::Result;
use crate::payload::RemotePayload;
use crate::xml::RecordDraft;

/// Read every record of the application table, optionally filtered
pub fn list_records(api: &impl TableApi, table: &str, query: &str) -> Result<RemotePayload> {
    api.fetch(table, query)
}

/// Submit `draft` as a new record of the application table
pub fn create_record(api: &impl TableApi, table: &str, draft: &RecordDraft) -> Result<RemotePayload> {
    let body = draft.to_xml()?;
    let created = api.create(table, "", body)?;
    info!("{}", created.as_value());
    Ok(created)
}
