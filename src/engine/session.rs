//! Session lifecycle.
//!
//! `XrSession` owns at most one open backend and walks it through
//! Uninitialized -> Active <-> Paused -> Uninitialized. Every transition returns a
//! `Result`, so misuse is visible instead of silently ignored.

use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};

use crate::engine::backend::{BackendOpener, default_opener};
use crate::engine::{EngineError, EngineResult, HeadPose, PlatformContext, XrBackend, XrConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Paused,
}

pub struct XrSession {
    config: XrConfig,
    opener: BackendOpener,
    state: SessionState,
    backend: Option<Box<dyn XrBackend>>,
    /// Last pose the backend reported as valid. Cleared on shutdown.
    last_pose: Mutex<Option<HeadPose>>,
}

impl XrSession {
    pub fn new(config: XrConfig) -> Self {
        Self::with_opener(config, default_opener())
    }

    pub fn with_opener(config: XrConfig, opener: BackendOpener) -> Self {
        Self {
            config,
            opener,
            state: SessionState::Uninitialized,
            backend: None,
            last_pose: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &XrConfig {
        &self.config
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Opens the engine. A no-op when already initialized.
    /// On failure the session stays `Uninitialized`.
    pub fn initialize(&mut self, ctx: &PlatformContext) -> EngineResult<()> {
        if self.state != SessionState::Uninitialized {
            debug!("initialize ignored, session already {:?}", self.state);
            return Ok(());
        }

        let backend = (self.opener)(ctx, &self.config)?;
        info!("XR session initialized ({} backend)", backend.name());
        self.backend = Some(backend);
        self.state = SessionState::Active;
        Ok(())
    }

    pub fn resume(&mut self) -> EngineResult<()> {
        match self.state {
            SessionState::Uninitialized => Err(self.invalid("resume")),
            SessionState::Active => Ok(()),
            SessionState::Paused => {
                self.backend_mut("resume")?.resume()?;
                self.state = SessionState::Active;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) -> EngineResult<()> {
        match self.state {
            SessionState::Uninitialized => Err(self.invalid("pause")),
            SessionState::Paused => Ok(()),
            SessionState::Active => {
                self.backend_mut("pause")?.pause()?;
                self.state = SessionState::Paused;
                Ok(())
            }
        }
    }

    /// Drops the engine and returns to `Uninitialized`. Safe to call in any state.
    pub fn shutdown(&mut self) -> EngineResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(backend) = self.backend.take() {
            info!("XR session shutting down ({} backend)", backend.name());
            drop(backend);
        }
        self.state = SessionState::Uninitialized;
        *self.last_pose.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Best current pose. Never fails.
    ///
    /// Uninitialized sessions return `HeadPose::IDENTITY`. If the engine has no valid
    /// pose right now, the last good one is repeated (or IDENTITY if there is none).
    pub fn head_pose(&self) -> HeadPose {
        let Some(backend) = self.backend.as_ref() else {
            return HeadPose::IDENTITY;
        };

        // Query outside the lock so concurrent readers only contend on the store.
        let current = backend.head_pose();
        let mut last = self.last_pose.lock().unwrap_or_else(PoisonError::into_inner);
        match current {
            Ok(Some(pose)) => {
                if last.is_none_or(|l| l.timestamp_ns <= pose.timestamp_ns) {
                    *last = Some(pose);
                }
                pose
            }
            Ok(None) => last.unwrap_or(HeadPose::IDENTITY),
            Err(e) => {
                warn!("head pose query failed: {}", e);
                last.unwrap_or(HeadPose::IDENTITY)
            }
        }
    }

    fn invalid(&self, op: &'static str) -> EngineError {
        EngineError::InvalidTransition {
            op,
            state: self.state,
        }
    }

    fn backend_mut(&mut self, op: &'static str) -> EngineResult<&mut Box<dyn XrBackend>> {
        let state = self.state;
        self.backend
            .as_mut()
            .ok_or(EngineError::InvalidTransition { op, state })
    }
}

impl Drop for XrSession {
    fn drop(&mut self) {
        self.release();
    }
}
