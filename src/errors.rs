use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Key '{0}' is empty")]
    MissingKey(&'static str),

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Unable to read config file '{path}': {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML Error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Environment config Error: {0}")]
    Env(#[from] envy::Error),

    #[error("{0} is not implemented for this backend")]
    NotImplemented(&'static str),

    #[error("{operation} failed with status {status} after {attempts} attempts")]
    TransientApi {
        operation: &'static str,
        status: StatusCode,
        attempts: usize,
    },

    #[error("HTTP Error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned unexpected status {status}")]
    UnexpectedStatus { operation: &'static str, status: StatusCode },

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command '{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Installation failed: {0}")]
    InstallationFailed(String),

    #[error("Installation did not finish within {0:?}")]
    InstallationTimeout(std::time::Duration),

    #[error("Cancelled before step '{step}'")]
    Cancelled { step: &'static str },

    #[error("'{0}' is not a plain file name")]
    InvalidFileName(String),
}

impl Error {
    /// Configuration errors abort a run before anything external is touched.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingKey(_) | Error::InvalidVersion { .. } | Error::ConfigFile { .. } | Error::Yaml(_) | Error::Env(_)
        )
    }
}
