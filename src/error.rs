//! Error handling for Lookout
//!
//! All errors carry a stable code and, where it makes sense, recovery
//! suggestions that the CLI can surface to the user.

use thiserror::Error;

/// Result type alias for Lookout operations
pub type Result<T> = std::result::Result<T, LookoutError>;

/// Main error type for Lookout operations
#[derive(Error, Debug)]
pub enum LookoutError {
    // File Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid image file: {reason}")]
    InvalidImage { reason: String },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    // Audio Validation Errors
    #[error("Audio contains no samples")]
    EmptyAudio,

    // Model Errors
    #[error("Weights file error: {reason}")]
    WeightsError { reason: String },

    #[error("Tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Speech Engine Errors
    #[error("Unknown engine: {name}")]
    UnknownEngine { name: String },

    #[error("Engine '{engine}' failed: {reason}")]
    EngineError { engine: String, reason: String },

    // Device Errors
    #[error("Device error: {reason}")]
    DeviceError { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LookoutError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            LookoutError::FileNotFound { .. } => "FILE_NOT_FOUND",
            LookoutError::InvalidImage { .. } => "INVALID_IMAGE",
            LookoutError::InvalidAudio { .. } => "INVALID_AUDIO",
            LookoutError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            LookoutError::EmptyAudio => "EMPTY_AUDIO",
            LookoutError::WeightsError { .. } => "WEIGHTS_ERROR",
            LookoutError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            LookoutError::InvalidConfig { .. } => "INVALID_CONFIG",
            LookoutError::UnknownEngine { .. } => "UNKNOWN_ENGINE",
            LookoutError::EngineError { .. } => "ENGINE_ERROR",
            LookoutError::DeviceError { .. } => "DEVICE_ERROR",
            LookoutError::Io(_) => "IO_ERROR",
            LookoutError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            LookoutError::FileNotFound { .. } => true,
            LookoutError::InvalidImage { .. } => true,
            LookoutError::InvalidAudio { .. } => true,
            LookoutError::UnsupportedFormat { .. } => true,
            LookoutError::EngineError { .. } => true,
            LookoutError::DeviceError { .. } => true,
            _ => false,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LookoutError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            LookoutError::InvalidImage { .. } => vec![
                "Only binary PPM (P6) images are supported",
                "Convert the image with e.g. 'convert photo.jpg photo.ppm'",
            ],
            LookoutError::InvalidAudio { .. } => vec![
                "Try converting the file to 16-bit PCM WAV first",
                "Check if the file plays in another application",
            ],
            LookoutError::UnsupportedFormat { .. } => vec![
                "Supported image format: binary PPM (P6), 8 bits per channel",
                "Supported audio format: PCM WAV",
            ],
            LookoutError::WeightsError { .. } => vec![
                "Verify the weights file matches the selected architecture",
                "Re-download the weights file; it may be truncated",
            ],
            LookoutError::UnknownEngine { .. } => vec![
                "Run 'lookout-cli engines' to list registered engines",
            ],
            LookoutError::EngineError { .. } => vec![
                "Check that the bridge service is running and reachable",
                "Try the mock engine to isolate the problem",
            ],
            LookoutError::DeviceError { .. } => vec![
                "Check that an audio device is connected and not in use",
                "File-based commands work without any audio device",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = LookoutError::FileNotFound {
            path: "frame.ppm".to_string(),
            source: None,
        };
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");

        let err = LookoutError::WeightsError {
            reason: "truncated".to_string(),
        };
        assert_eq!(err.error_code(), "WEIGHTS_ERROR");
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = LookoutError::EngineError {
            engine: "bridge-stt".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_shape_mismatch_not_recoverable() {
        let err = LookoutError::ShapeMismatch {
            expected: "[3, 416, 416]".to_string(),
            actual: "[3, 415, 415]".to_string(),
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.error_code(), "SHAPE_MISMATCH");
    }
}
