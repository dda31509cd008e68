pub mod backend;
pub mod cli;
pub mod config;
pub mod frame_pump;
pub mod graphics;
pub mod mock;
pub mod networking;
pub mod pose;
pub mod runtime;
pub mod session;
pub mod xr;

#[cfg(test)]
mod session_tests;

pub use backend::{BackendOpener, PlatformContext, XrBackend};
pub use config::XrConfig;
pub use pose::HeadPose;
pub use session::{SessionState, XrSession};

use thiserror::Error;

/// Engine-level error type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot {op} while the session is {state:?}")]
    InvalidTransition {
        op: &'static str,
        state: SessionState,
    },

    #[error("OpenXR loader unavailable: {0}")]
    Loader(String),

    #[error("required OpenXR extension {0} is not available")]
    MissingExtension(&'static str),

    #[error("OpenXR {call} failed: {result:?}")]
    OpenXr {
        call: &'static str,
        result: openxr::sys::Result,
    },

    #[error("Vulkan {call} failed: {message}")]
    Vulkan { call: &'static str, message: String },

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("InfraNet connection is closed")]
    Disconnected,

    #[error("thread: {0}")]
    Thread(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Tags an `openxr::Result` with the call that produced it.
pub(crate) trait XrResultExt<T> {
    fn xr(self, call: &'static str) -> EngineResult<T>;
}

impl<T> XrResultExt<T> for openxr::Result<T> {
    fn xr(self, call: &'static str) -> EngineResult<T> {
        self.map_err(|result| EngineError::OpenXr { call, result })
    }
}
