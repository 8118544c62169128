/*!
 * Error types for snowprobe
 */

use std::fmt;
use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_HTTP: i32 = 3;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_TRANSPORT: i32 = 5;
pub const EXIT_DECODE: i32 = 6;

/// Printed after a decode failure when the instance answered with an HTML page
pub const INACTIVE_INSTANCE_HINT: &str =
    "A json object was not returned. Verify that your instance is active and try again.";

const DECODE_FAILURE: &str = "A problem occurred decoding the response from ServiceNow.";

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The instance answered with a non-2xx status
    #[error("{status} for url: {url} -- {body}")]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// The instance could not be reached (DNS, refused, TLS, connect timeout)
    #[error(
        "There seems to be something wrong with your internet connection. \
         Double check your connection and script parameters. -- {0}"
    )]
    Connection(String),

    /// Any other request failure
    #[error("There is an issue with your connection to ServiceNow. -- {0}")]
    Transport(String),

    /// A successful response whose body is not JSON
    #[error("{}", decode_message(.content_type.as_deref()))]
    Decode {
        content_type: Option<String>,
        reason: String,
    },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The record payload could not be built
    #[error("Payload error: {0}")]
    Payload(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn decode_message(content_type: Option<&str>) -> String {
    if is_html(content_type) {
        format!("{} {}", DECODE_FAILURE, INACTIVE_INSTANCE_HINT)
    } else {
        DECODE_FAILURE.to_string()
    }
}

/// Exact match only; parameters such as `; charset=utf-8` do not count.
fn is_html(content_type: Option<&str>) -> bool {
    content_type == Some("text/html")
}

impl ProbeError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ProbeError::Http { .. } => EXIT_HTTP,
            ProbeError::Connection(_) => EXIT_CONNECTION,
            ProbeError::Transport(_) => EXIT_TRANSPORT,
            ProbeError::Decode { .. } => EXIT_DECODE,
            ProbeError::Config(_) => EXIT_CONFIG,
            ProbeError::Payload(_) | ProbeError::Io(_) => EXIT_FAILURE,
        }
    }

    /// True when a decode failure came back as an HTML page
    pub fn is_inactive_instance(&self) -> bool {
        match self {
            ProbeError::Decode { content_type, .. } => is_html(content_type.as_deref()),
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProbeError::Http { .. } => ErrorCategory::Remote,
            ProbeError::Connection(_) => ErrorCategory::Network,
            ProbeError::Transport(_) => ErrorCategory::Transport,
            ProbeError::Decode { .. } => ErrorCategory::Decode,
            ProbeError::Config(_) => ErrorCategory::Configuration,
            ProbeError::Payload(_) => ErrorCategory::Payload,
            ProbeError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The instance rejected the request
    Remote,
    /// The instance could not be reached
    Network,
    /// Other request failures
    Transport,
    /// Response body was not JSON
    Decode,
    /// Configuration errors
    Configuration,
    /// Outgoing payload errors
    Payload,
    /// Local I/O errors
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Remote => write!(f, "remote"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Transport => write!(f, "transport"),
            ErrorCategory::Decode => write!(f, "decode"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Payload => write!(f, "payload"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}
