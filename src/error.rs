use thiserror::Error;

/// Boxed transport-level error coming out of a control surface implementation
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal errors surfaced by the capture and comparison pipeline
///
/// Stabilization problems and bounded waits that run out are not represented
/// here: they are logged and the pipeline carries on.
#[derive(Debug, Error)]
pub enum VrtError {
    /// A control session with the target could not be established
    #[error("failed to attach to target {target}: {source}")]
    Attach {
        target: String,
        #[source]
        source: TransportError,
    },

    /// A single control-surface command failed mid-sequence
    #[error("{command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: TransportError,
    },

    /// A raster payload could not be decoded into pixels
    #[error("failed to decode {label} image: {source}")]
    Decode {
        label: &'static str,
        #[source]
        source: image::ImageError,
    },

    /// The diff buffer could not be encoded into a raster
    #[error("failed to encode diff image: {0}")]
    Encode(#[source] image::ImageError),

    /// Pixel buffers handed to the differ do not match the stated size
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("comparison is missing its {0} capture")]
    MissingCapture(&'static str),
}

impl VrtError {
    pub fn command(command: &'static str, source: impl Into<TransportError>) -> Self {
        VrtError::Command {
            command,
            source: source.into(),
        }
    }

    /// Name of the failing command, if this is a command failure
    pub fn command_name(&self) -> Option<&'static str> {
        match self {
            VrtError::Command { command, .. } => Some(command),
            _ => None,
        }
    }
}

pub type VrtResult<T> = std::result::Result<T, VrtError>;
