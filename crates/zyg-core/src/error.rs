//! Error types for the bridge and the renderer port.

/// Failure reported by a [`Renderer`](crate::Renderer) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RendererError {
    #[error("renderer call `{call}` failed with code {code}")]
    Call { call: &'static str, code: i32 },
    #[error("renderer call `{call}` returned an invalid handle")]
    InvalidHandle { call: &'static str },
    #[error("invalid argument to `{call}`: {reason}")]
    InvalidArgument {
        call: &'static str,
        reason: &'static str,
    },
}

/// Errors that abort a traversal or session operation.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid mesh `{object}`: {reason}")]
    InvalidMesh { object: String, reason: String },
    #[error("invalid image `{name}`: {reason}")]
    InvalidImage { name: String, reason: String },
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),
}
