//! Process-wide session.
//!
//! JNI entry points have no place to keep state, so they all reach this one
//! session. Lifecycle calls take the write lock; pose queries take the read lock
//! and can run concurrently with each other, never with a lifecycle change.

use std::sync::{OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::engine::{EngineResult, HeadPose, PlatformContext, SessionState, XrConfig, XrSession};

/// A session behind the single-writer, multi-reader lock.
pub struct Runtime {
    session: RwLock<XrSession>,
}

impl Runtime {
    pub fn new(session: XrSession) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub fn into_session(self) -> XrSession {
        self.session.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    // A panic mid-transition cannot leave the session half-updated (state is written
    // last), so poisoned locks are taken as-is.
    fn read(&self) -> RwLockReadGuard<'_, XrSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, XrSession> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn initialize(&self, ctx: &PlatformContext) -> EngineResult<()> {
        self.write().initialize(ctx)
    }

    pub fn resume(&self) -> EngineResult<()> {
        self.write().resume()
    }

    pub fn pause(&self) -> EngineResult<()> {
        self.write().pause()
    }

    pub fn shutdown(&self) -> EngineResult<()> {
        self.write().shutdown()
    }

    pub fn head_pose(&self) -> HeadPose {
        self.read().head_pose()
    }

    pub fn state(&self) -> SessionState {
        self.read().state()
    }

    pub fn config(&self) -> XrConfig {
        self.read().config().clone()
    }
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Installs a preconfigured session. Returns it back if the runtime already exists.
pub fn install(session: XrSession) -> Result<(), XrSession> {
    RUNTIME.set(Runtime::new(session)).map_err(Runtime::into_session)
}

/// The process runtime, built from `XrConfig::from_env()` on first use.
pub fn global() -> &'static Runtime {
    RUNTIME.get_or_init(|| Runtime::new(XrSession::new(XrConfig::from_env())))
}

pub fn initialize(ctx: &PlatformContext) -> EngineResult<()> {
    global().initialize(ctx)
}

pub fn resume() -> EngineResult<()> {
    global().resume()
}

pub fn pause() -> EngineResult<()> {
    global().pause()
}

pub fn shutdown() -> EngineResult<()> {
    global().shutdown()
}

pub fn head_pose() -> HeadPose {
    global().head_pose()
}

pub fn state() -> SessionState {
    global().state()
}

pub fn config() -> XrConfig {
    global().config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::BackendKind;
    use crate::engine::mock::{MockBackend, MockCall, MockProbe};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn mock_runtime() -> (Runtime, MockProbe) {
        let probe = MockProbe::default();
        let session = XrSession::with_opener(XrConfig::default(), MockBackend::opener(probe.clone()));
        (Runtime::new(session), probe)
    }

    // The only test that touches the process-wide runtime.
    #[test]
    fn global_runtime_install_once() {
        let mut config = XrConfig::default();
        config.backend = BackendKind::Mock;
        config.app_name = "installed".to_string();
        let probe = MockProbe::default();
        assert!(install(XrSession::with_opener(config, MockBackend::opener(probe.clone()))).is_ok());

        let again = install(XrSession::new(XrConfig::default()));
        assert!(again.is_err());

        assert_eq!(head_pose(), HeadPose::IDENTITY);
        assert_eq!(state(), SessionState::Uninitialized);
        assert!(resume().is_err());

        initialize(&PlatformContext::Desktop).unwrap();
        assert_eq!(state(), SessionState::Active);
        assert!(!head_pose().is_sentinel());
        shutdown().unwrap();
        assert_eq!(state(), SessionState::Uninitialized);
        assert_eq!(super::config().app_name, "installed");
        assert_eq!(probe.count(MockCall::Drop), 1);
    }

    #[test]
    fn second_install_hands_the_session_back() {
        let lock = OnceLock::new();
        let _ = lock.set(Runtime::new(XrSession::new(XrConfig::default())));

        let mut config = XrConfig::default();
        config.app_name = "second".to_string();
        let returned = lock
            .set(Runtime::new(XrSession::new(config)))
            .map_err(Runtime::into_session)
            .unwrap_err();
        assert_eq!(returned.config().app_name, "second");
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let (runtime, _probe) = mock_runtime();
        let runtime = Arc::new(runtime);
        runtime.initialize(&PlatformContext::Desktop).unwrap();

        let poisoner = runtime.clone();
        let result: thread::Result<()> = thread::spawn(move || {
            let _guard = poisoner.write();
            panic!("lifecycle call panicked");
        })
        .join();
        assert!(result.is_err());
        assert!(runtime.session.is_poisoned());

        assert_eq!(runtime.state(), SessionState::Active);
        assert!(!runtime.head_pose().is_sentinel());
        runtime.pause().unwrap();
        assert_eq!(runtime.state(), SessionState::Paused);
    }

    #[test]
    fn readers_run_alongside_lifecycle_writer() {
        let (runtime, probe) = mock_runtime();
        let runtime = Arc::new(runtime);
        runtime.initialize(&PlatformContext::Desktop).unwrap();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..3)
            .map(|_| {
                let runtime = runtime.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut seen = 0;
                    loop {
                        let pose = runtime.head_pose();
                        assert!(!pose.is_sentinel());
                        assert!(pose.is_unit_orientation(1e-5));
                        seen += 1;
                        if done.load(Ordering::Acquire) {
                            break seen;
                        }
                    }
                })
            })
            .collect();

        for _ in 0..50 {
            runtime.pause().unwrap();
            runtime.resume().unwrap();
        }
        done.store(true, Ordering::Release);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(probe.count(MockCall::Pause), 50);
        assert_eq!(probe.count(MockCall::Resume), 50);
        assert_eq!(runtime.state(), SessionState::Active);
    }

    #[test]
    fn shutdown_is_always_ok() {
        let (runtime, probe) = mock_runtime();
        runtime.shutdown().unwrap();
        runtime.initialize(&PlatformContext::Desktop).unwrap();
        runtime.shutdown().unwrap();
        runtime.shutdown().unwrap();
        assert_eq!(runtime.head_pose(), HeadPose::IDENTITY);
        assert_eq!(probe.count(MockCall::Drop), 1);

        let session = runtime.into_session();
        assert_eq!(session.state(), SessionState::Uninitialized);
    }
}
