/*!
 * Remote Record Fetcher
 *
 * Blocking Table API client. Every call either returns the decoded response
 * body untouched or a [`ProbeError`] naming which of the four failure tiers
 * was hit:
 *
 * 1. [`ProbeError::Http`]: the instance answered with a non-2xx status
 * 2. [`ProbeError::Connection`]: the instance could not be reached
 * 3. [`ProbeError::Transport`]: any other request failure
 * 4. [`ProbeError::Decode`]: a 2xx whose body is not JSON
 *
 * The client logs each outcome but never prints and never exits; that is
 * left to the outermost caller.
 */

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::ConnectionParams;
use crate::error::{ProbeError, Result, INACTIVE_INSTANCE_HINT};
use crate::payload::RemotePayload;

const JSON: &str = "application/json";
const XML: &str = "application/xml";

/// Read and create access to Table API collections
pub trait TableApi {
    /// Read every record of `table`, with `query` appended verbatim as the
    /// query string (empty = no filter)
    fn fetch(&self, table: &str, query: &str) -> Result<RemotePayload>;

    /// Create a record in `table` from an XML body
    fn create(&self, table: &str, query: &str, body: String) -> Result<RemotePayload>;
}

/// Table API client bound to one instance and set of credentials
#[derive(Debug)]
pub struct TableClient {
    http: Client,
    params: ConnectionParams,
}

impl TableClient {
    /// Build a client. `timeout = None` waits on the instance indefinitely.
    pub fn new(params: ConnectionParams, timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Transport(describe(&e)))?;

        Ok(Self { http, params })
    }

    /// `{instance}/api/now/table/{table}`
    pub fn table_url(&self, table: &str) -> String {
        format!(
            "{}/api/now/table/{}",
            self.params.instance.trim_end_matches('/'),
            table
        )
    }

    fn request_url(&self, table: &str, query: &str) -> String {
        let url = self.table_url(table);
        let query = query.trim_start_matches('?');
        if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(
            &self.params.username,
            Some(self.params.password.expose_secret()),
        )
    }

    /// Send a prepared request and classify the outcome
    fn execute(&self, table: &str, url: &str, request: RequestBuilder) -> Result<RemotePayload> {
        debug!(url, "Sending request");

        let response = request
            .send()
            .map_err(|e| self.fail(table, classify_send_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text() {
                Ok(raw) => render_error_body(&raw),
                Err(e) => format!("(error body unreadable: {})", describe(&e)),
            };
            return Err(self.fail(
                table,
                ProbeError::Http {
                    status,
                    url: url.to_string(),
                    body,
                },
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .map_err(|e| self.fail(table, ProbeError::Transport(describe(&e))))?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Ok(RemotePayload::new(value)),
            Err(e) => Err(self.fail(
                table,
                ProbeError::Decode {
                    content_type,
                    reason: e.to_string(),
                },
            )),
        }
    }

    /// Log a failure once, then hand it back to the caller
    fn fail(&self, table: &str, err: ProbeError) -> ProbeError {
        match &err {
            ProbeError::Http { status, body, .. } => {
                error!(table, category = %err.category(), status = status.as_u16(), body = %body, "{}", err);
            }
            ProbeError::Decode { reason, .. } => {
                error!(table, category = %err.category(), reason = %reason, "A problem occurred decoding the response from ServiceNow.");
                if err.is_inactive_instance() {
                    error!(table, "{}", INACTIVE_INSTANCE_HINT);
                }
            }
            _ => {
                error!(table, category = %err.category(), "{}", err);
            }
        }
        err
    }
}

impl TableApi for TableClient {
    fn fetch(&self, table: &str, query: &str) -> Result<RemotePayload> {
        let url = self.request_url(table, query);
        info!(table, "Retrieving all {} records...", table);

        let request = self.authorized(self.http.get(&url)).header(ACCEPT, JSON);
        let payload = self.execute(table, &url, request)?;

        info!(table, records = payload.records().len(), "Successfully retrieved all {} records", table);
        Ok(payload)
    }

    fn create(&self, table: &str, query: &str, body: String) -> Result<RemotePayload> {
        let url = self.request_url(table, query);
        info!(table, "Creating {} record...", table);

        let request = self
            .authorized(self.http.post(&url))
            .header(CONTENT_TYPE, XML)
            .header(ACCEPT, JSON)
            .body(body);
        let payload = self.execute(table, &url, request)?;

        info!(table, "Successfully created {} record", table);
        Ok(payload)
    }
}

/// Connection failures get their own tier; everything else is transport.
fn classify_send_error(err: &reqwest::Error) -> ProbeError {
    if err.is_connect() {
        ProbeError::Connection(describe(err))
    } else {
        ProbeError::Transport(describe(err))
    }
}

/// Error text including its source chain; reqwest's own message alone omits
/// the underlying cause.
fn describe(err: &dyn StdError) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Compact JSON when the error body is JSON, trimmed raw text otherwise
fn render_error_body(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value.to_string(),
        Err(_) => raw.trim().to_string(),
    }
}
