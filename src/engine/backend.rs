//! Seam between the session state machine and whatever produces poses.

use std::ffi::c_void;

use crate::engine::config::{BackendKind, XrConfig};
use crate::engine::{EngineResult, HeadPose};

/// Host handles forwarded by `initialize`.
#[derive(Debug, Clone, Copy)]
pub enum PlatformContext {
    /// Raw `JavaVM*` and a global ref to the application `Context`.
    /// Both must outlive every backend opened with them.
    Android { vm: *mut c_void, context: *mut c_void },
    Desktop,
}

// The pointers are process-global JNI handles, valid on any attached thread.
unsafe impl Send for PlatformContext {}
unsafe impl Sync for PlatformContext {}

/// An opened XR engine.
///
/// Opening a backend initializes it; dropping it shuts it down and must release
/// every native resource it holds.
pub trait XrBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn resume(&mut self) -> EngineResult<()>;

    fn pause(&mut self) -> EngineResult<()>;

    /// Latest tracked pose, or `None` when the engine has nothing valid yet.
    fn head_pose(&self) -> EngineResult<Option<HeadPose>>;
}

pub type BackendOpener =
    Box<dyn Fn(&PlatformContext, &XrConfig) -> EngineResult<Box<dyn XrBackend>> + Send + Sync>;

/// Opens the backend named by `config.backend`.
pub fn open_backend(ctx: &PlatformContext, config: &XrConfig) -> EngineResult<Box<dyn XrBackend>> {
    match config.backend {
        BackendKind::OpenXr => Ok(Box::new(crate::engine::xr::OpenXrBackend::open(ctx, config)?)),
        BackendKind::Mock => Ok(Box::new(crate::engine::mock::MockBackend::open(
            crate::engine::mock::MockProbe::default(),
        )?)),
    }
}

pub fn default_opener() -> BackendOpener {
    Box::new(open_backend)
}
