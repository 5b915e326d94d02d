//! Detection error kinds shared by every pipeline stage

/// Errors raised while ingesting, normalizing, scoring or matching telemetry
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("Unknown data type: {0}. Must be one of: network, endpoint, authentication, email, threat_intelligence")]
    UnknownDataType(String),

    #[error("Invalid data in column '{column}': {message}")]
    DataFormat { column: String, message: String },

    #[error("Insufficient data: {rows} row(s) available, at least {required} required")]
    InsufficientData { rows: usize, required: usize },

    #[error("Internal processing error: {0}")]
    InternalProcessing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectionError {
    /// Shorthand for a [`DetectionError::DataFormat`]
    pub fn data_format(column: impl Into<String>, message: impl Into<String>) -> Self {
        DetectionError::DataFormat {
            column: column.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the caller's input rather than by the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DetectionError::UnknownDataType(_)
                | DetectionError::DataFormat { .. }
                | DetectionError::InsufficientData { .. }
        )
    }
}

impl From<csv::Error> for DetectionError {
    fn from(err: csv::Error) -> Self {
        let message = err.to_string();
        let column = match err.position() {
            Some(pos) => format!("<line {}>", pos.line()),
            None => "<csv>".to_string(),
        };

        match err.into_kind() {
            csv::ErrorKind::Io(io) => DetectionError::Io(io),
            _ => DetectionError::DataFormat { column, message },
        }
    }
}
