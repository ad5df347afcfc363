use std::path::PathBuf;

use frame_codec::CodecError;

/// Errors surfaced to the pipeline side and to startup code.
///
/// Nothing here is ever sent to a WebSocket client; protocol-level problems
/// are logged and dropped by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("network engine is not running")]
    EngineGone,

    #[error("network engine dropped the request without answering")]
    NoResponse,

    #[error("blocking bridge call issued from inside an async runtime")]
    BlockingInsideRuntime,

    #[error("app directory `{}` for route `{name}` could not be found", path.display())]
    AppDirNotFound { name: String, path: PathBuf },

    #[error("failed to start network engine: {0}")]
    Startup(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
