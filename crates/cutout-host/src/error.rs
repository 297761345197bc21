//! Error types for the host crate.

use cutout_pipeline::{Dimensions, PipelineError};

use crate::session::SessionId;

/// Broad class of a failure, used to decide how the flow reacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request from the UI: answered in the callback response.
    Input,
    /// Resource limits: logged, processing continues.
    Resource,
    /// The user never answered: the node passes its input through.
    Timeout,
    /// Anything else: logged, session completed empty, passthrough.
    Internal,
}

/// Session table failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A session with this id is already live.
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),

    /// No live session with this id.
    #[error("session {0} not found")]
    NotFound(SessionId),
}

/// The UI channel refused a message.
#[derive(Debug, thiserror::Error)]
#[error("failed to publish {event}: {reason}")]
pub struct ChannelError {
    /// Event name that failed.
    pub event: String,
    /// Transport-specific description.
    pub reason: String,
}

/// Errors surfaced by the host layer.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Image processing failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Session lookup or creation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Sending to the UI failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A request or message body was not valid JSON for its schema.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// Encoding the preview image failed.
    #[error("failed to encode preview: {0}")]
    Preview(#[from] image::ImageError),

    /// No handler is registered for this route.
    #[error("no handler for route {0}")]
    UnknownRoute(String),

    /// The UI drew on a canvas larger than the host will rasterize.
    #[error("canvas {canvas} exceeds {limit} pixels")]
    CanvasTooLarge {
        /// Canvas size from the request.
        canvas: Dimensions,
        /// Configured pixel limit.
        limit: u64,
    },

    /// The input is larger than the configured warning threshold.
    #[error("image {dimensions} exceeds {limit} pixels")]
    Oversized {
        /// Size of the offending image.
        dimensions: Dimensions,
        /// Configured pixel limit.
        limit: u64,
    },

    /// The user did not answer in time.
    #[error("no answer from the UI within the wait timeout")]
    TimedOut,
}

impl HostError {
    /// Class of this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Pipeline(
                PipelineError::InsufficientPoints { .. } | PipelineError::EmptyCanvas,
            )
            | Self::Session(SessionError::NotFound(_))
            | Self::Json(_)
            | Self::UnknownRoute(_)
            | Self::CanvasTooLarge { .. } => ErrorKind::Input,
            Self::Oversized { .. } => ErrorKind::Resource,
            Self::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Internal,
        }
    }

    /// Log at the level this error's kind calls for: expected failures
    /// warn, internal ones are errors.
    pub(crate) fn log(&self, session_id: &SessionId, context: &str) {
        match self.kind() {
            ErrorKind::Internal => {
                tracing::error!(session_id = %session_id, error = %self, "{context}");
            }
            kind => tracing::warn!(session_id = %session_id, ?kind, error = %self, "{context}"),
        }
    }
}
