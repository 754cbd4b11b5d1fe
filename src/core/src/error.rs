use thiserror::Error;

/// Secure import error types
#[derive(Error, Debug)]
pub enum ImportError {
    /// Invalid or incomplete configuration, detected before any work starts
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Chart pull, push, sign or render failure
    #[error("Chart error: {chart} - {message}")]
    ChartError { chart: String, message: String },

    /// Rendered chart output could not be parsed
    #[error("Discovery error: {0}")]
    DiscoveryError(String),

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// OCI image error (malformed reference, unreadable layout)
    #[error("OCI image error: {0}")]
    OciImageError(String),

    /// External tool (helm, trivy, copa, cosign, docker) failed
    #[error("Tool error: {tool} - {message}")]
    ToolError { tool: String, message: String },

    /// Scanner output could not be interpreted
    #[error("Scan report error: {0}")]
    ScanReportError(String),

    /// Per-image pipeline failure, attributed to a stage and an image
    #[error("{stage} failed for {reference}: {source}")]
    Stage {
        stage: String,
        reference: String,
        #[source]
        source: Box<ImportError>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ImportError {
    /// Wrap an error with the pipeline stage and image it belongs to.
    pub fn at_stage(self, stage: impl ToString, reference: impl ToString) -> Self {
        ImportError::Stage {
            stage: stage.to_string(),
            reference: reference.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImportError {
    fn from(err: serde_yaml::Error) -> Self {
        ImportError::SerializationError(err.to_string())
    }
}

/// Result type alias for secure import operations
pub type Result<T> = std::result::Result<T, ImportError>;
