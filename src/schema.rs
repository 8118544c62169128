/*!
 * Table schema metadata
 *
 * The schema of an application table is read from `sys_dictionary` and kept
 * as an ordered map of field name to type tag. Tables extending `task` also
 * inherit its columns, so both dictionaries are requested.
 */

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::client::TableApi;
use crate::error::Result;
use crate::payload::{field_text, RemotePayload};

/// Table holding column definitions
pub const DICTIONARY_TABLE: &str = "sys_dictionary";

/// Filter selecting the columns of `application` and of `task`
pub fn schema_query(application: &str) -> String {
    format!("sysparm_query=name={}^ORname=task", application)
}

/// Declared internal type of a column, e.g. `string` or `reference`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldType(String);

impl FieldType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field name to type tag mapping for one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub table: String,
    pub fields: IndexMap<String, FieldType>,
}

impl TableSchema {
    /// Build from a `sys_dictionary` response.
    ///
    /// The table's own row (empty `element`) is skipped. A repeated element
    /// keeps its first position and takes the last type seen.
    pub fn from_dictionary(table: &str, dictionary: &RemotePayload) -> Self {
        let mut fields = IndexMap::new();

        for entry in dictionary.records() {
            let element = match field_text(entry, "element") {
                Some(e) if !e.is_empty() => e,
                _ => continue,
            };
            let tag = field_text(entry, "internal_type").unwrap_or_default();
            info!("{}: {}", element, tag);
            fields.insert(element, FieldType::new(tag));
        }

        Self {
            table: table.to_string(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.table)?;
        for (i, (name, tag)) in self.fields.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}: {}", sep, name, tag)?;
        }
        write!(f, " }}")
    }
}

/// Read the dictionary of `application` and build its schema
pub fn pull_schema(api: &impl TableApi, application: &str) -> Result<TableSchema> {
    info!("Retrieving schema for {} table...", application);
    let dictionary = api.fetch(DICTIONARY_TABLE, &schema_query(application))?;
    Ok(TableSchema::from_dictionary(application, &dictionary))
}
