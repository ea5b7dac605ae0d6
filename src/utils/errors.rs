#![forbid(unsafe_code)]

use poem_openapi::Object;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("userdir_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),
}

/// StoreError enumerates the request-scoped failures of the user record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("NOT_FOUND: no record for user {}", .0)]
    NotFound(String),

    /// The file exists but does not hold a valid user document.
    #[error("CORRUPT: record for user {} is unreadable: {}", .username, .reason)]
    Corrupt { username: String, reason: String },

    #[error("READ_ERROR: unable to read {}: {}", .path, .source)]
    ReadError { path: String, source: std::io::Error },

    #[error("WRITE_ERROR: unable to write {}: {}", .path, .source)]
    WriteError { path: String, source: std::io::Error },

    // Not raised by the store; reserved for input checks at the request layer.
    #[allow(dead_code)]
    #[error("VALIDATION_ERROR: {}", .0)]
    ValidationError(String),
}

impl StoreError {
    /// The HTTP status code this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            StoreError::NotFound(_) => 404,
            StoreError::ValidationError(_) => 400,
            StoreError::Corrupt { .. }
            | StoreError::ReadError { .. }
            | StoreError::WriteError { .. } => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpResult:
// ---------------------------------------------------------------------------
/// The body of every non-200 JSON response.
#[derive(Object, Debug)]
pub struct HttpResult {
    pub result_code: String,
    pub result_msg: String,
}

impl HttpResult {
    pub fn new(result_code: String, result_msg: String) -> Self {
        Self {result_code, result_msg}
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::StoreError;

    #[test]
    fn status_mapping() {
        assert_eq!(StoreError::NotFound("bob".to_string()).http_status(), 404);
        let corrupt = StoreError::Corrupt {username: "bob".to_string(), reason: "eof".to_string()};
        assert_eq!(corrupt.http_status(), 500);
        let write = StoreError::WriteError {
            path: "/x/bob.json".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(write.http_status(), 500);
        assert_eq!(StoreError::ValidationError("bad".to_string()).http_status(), 400);
    }

    #[test]
    fn not_found_message_names_user() {
        let msg = StoreError::NotFound("bob".to_string()).to_string();
        assert!(msg.starts_with("NOT_FOUND"));
        assert!(msg.contains("bob"));
    }
}
