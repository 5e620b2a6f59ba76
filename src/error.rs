use thiserror::Error;

/// Main error type for the Canvas-Recorder library
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Encoder and recorder errors
///
/// Every variant is fatal for the run that produced it. A failed run has to be
/// restarted from scratch.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("No supported format among candidates: {}", tried.join(", "))]
    NoSupportedFormat { tried: Vec<String> },

    #[error("Unsupported encoder configuration: {reason}")]
    UnsupportedConfig { reason: String },

    #[error("Encoder fault: {reason}")]
    EncoderFault { reason: String },

    #[error("Encoder adapter used after close")]
    ClosedAdapter,

    #[error("Cannot {operation} while adapter is {state}")]
    InvalidState { operation: String, state: String },
}

/// Frame rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Frame source failed at progress {progress}: {reason}")]
    SourceFailed { progress: f64, reason: String },

    #[error("Invalid surface size: {width}x{height}")]
    InvalidSurface { width: u32, height: u32 },

    #[error("Failed to save preview: {path}")]
    PreviewFailed { path: String },
}

/// Artifact assembly and download errors
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write artifact {path}: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("Invalid artifact filename: {name}")]
    InvalidFilename { name: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using RecorderError
pub type Result<T> = std::result::Result<T, RecorderError>;

impl RecorderError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error is recoverable (can be retried)
    ///
    /// Runs are never retried by the pipeline; only transient IO failures
    /// outside of a run are worth another attempt by the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Output(OutputError::WriteFailed { .. }))
    }

    /// Whether this error signals misuse of the encoder API rather than a
    /// runtime condition
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::Encoder(EncoderError::ClosedAdapter | EncoderError::InvalidState { .. })
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Encoder(EncoderError::NoSupportedFormat { tried }) => {
                format!(
                    "None of the video formats ({}) can be recorded here. Is ffmpeg installed with libx264/libvpx?",
                    tried.join(", ")
                )
            }
            Self::Encoder(EncoderError::UnsupportedConfig { reason }) => {
                format!("The encoder rejected the configuration: {}", reason)
            }
            Self::Encoder(EncoderError::EncoderFault { reason }) => {
                format!("Encoding failed and no video was saved: {}", reason)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

impl EncoderError {
    pub(crate) fn fault<S: Into<String>>(reason: S) -> Self {
        Self::EncoderFault { reason: reason.into() }
    }

    pub(crate) fn unsupported<S: Into<String>>(reason: S) -> Self {
        Self::UnsupportedConfig { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_supported_format_lists_candidates() {
        let err = EncoderError::NoSupportedFormat {
            tried: vec!["video/mp4".to_string(), "video/webm".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "No supported format among candidates: video/mp4, video/webm"
        );
    }

    #[test]
    fn test_encoder_errors_are_not_recoverable() {
        let err: RecorderError = EncoderError::fault("boom").into();
        assert!(!err.is_recoverable());
        assert!(!err.is_programming_error());

        let err: RecorderError = EncoderError::ClosedAdapter.into();
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_user_message_for_fault() {
        let err: RecorderError = EncoderError::fault("pipe closed").into();
        assert!(err.user_message().contains("pipe closed"));
    }
}
