#![forbid(unsafe_code)]

use poem_openapi::Object;
use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("numclass_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Inaccessible logger configuration file.
    #[error("Unable to access the Log4rs configuration file: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    #[error("Unable to build the fun fact HTTP client: {}", .0)]
    FactClientError(String),
}

// ***************************************************************************
//                              HttpResult
// ***************************************************************************
/// Generic body for responses that carry no domain payload.
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
