//! In-memory Table API used by unit tests

use std::cell::RefCell;
use std::collections::HashMap;

use reqwest::StatusCode;
use serde_json::Value;

use crate::client::TableApi;
use crate::error::{ProbeError, Result};
use crate::payload::RemotePayload;

/// Serves canned bodies per table and records every call
#[derive(Debug, Default)]
pub struct StaticTables {
    tables: HashMap<String, Value>,
    calls: RefCell<Vec<(String, String)>>,
    bodies: RefCell<Vec<String>>,
}

impl StaticTables {
    pub fn with(mut self, table: &str, body: Value) -> Self {
        self.tables.insert(table.to_string(), body);
        self
    }

    /// `(table, query)` of every fetch and create, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }

    /// Bodies passed to `create`
    pub fn bodies(&self) -> Vec<String> {
        self.bodies.borrow().clone()
    }

    fn respond(&self, table: &str, query: &str) -> Result<RemotePayload> {
        self.calls
            .borrow_mut()
            .push((table.to_string(), query.to_string()));
        self.tables
            .get(table)
            .cloned()
            .map(RemotePayload::new)
            .ok_or_else(|| ProbeError::Http {
                status: StatusCode::NOT_FOUND,
                url: table.to_string(),
                body: r#"{"error":{"message":"Invalid table"}}"#.to_string(),
            })
    }
}

impl TableApi for StaticTables {
    fn fetch(&self, table: &str, query: &str) -> Result<RemotePayload> {
        self.respond(table, query)
    }

    fn create(&self, table: &str, query: &str, body: String) -> Result<RemotePayload> {
        self.bodies.borrow_mut().push(body);
        self.respond(table, query)
    }
}
