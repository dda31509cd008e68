//! OpenXR event + frame loop.
//!
//! A session only reaches RUNNING (and only produces display times worth locating
//! against) if someone polls events and keeps the frame loop going. The pump does
//! that on its own thread and publishes each predicted display time through an
//! atomic so pose queries never touch the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use openxr as xr;

use crate::engine::{EngineError, EngineResult, XrResultExt};

/// Poll interval while the session is idle or paused.
const IDLE_POLL: Duration = Duration::from_millis(20);
/// How long shutdown waits for the runtime to walk the session to STOPPING.
const EXIT_DEADLINE: Duration = Duration::from_millis(500);

/// State shared between the pump thread and pose queries.
#[derive(Default)]
pub struct PumpShared {
    predicted_display_ns: AtomicI64,
    paused: AtomicBool,
    stop: AtomicBool,
    running: AtomicBool,
    finished: AtomicBool,
}

impl PumpShared {
    /// Latest predicted display time, if a frame has been waited on.
    pub fn display_time(&self) -> Option<xr::Time> {
        match self.predicted_display_ns.load(Ordering::Acquire) {
            0 => None,
            ns => Some(xr::Time::from_nanos(ns)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

pub struct FramePumpParts {
    pub instance: xr::Instance,
    pub session: xr::Session<xr::Vulkan>,
    pub frame_waiter: xr::FrameWaiter,
    pub frame_stream: xr::FrameStream<xr::Vulkan>,
    pub view_type: xr::ViewConfigurationType,
    pub blend_mode: xr::EnvironmentBlendMode,
}

pub struct FramePump {
    shared: Arc<PumpShared>,
    handle: Option<JoinHandle<()>>,
}

impl FramePump {
    pub fn spawn(parts: FramePumpParts) -> EngineResult<Self> {
        let shared = Arc::new(PumpShared::default());
        let thread_shared = shared.clone();

        let handle = thread::Builder::new()
            .name("xrphone-frame-pump".to_string())
            .spawn(move || {
                if let Err(e) = run(parts, &thread_shared) {
                    error!("[FramePump] stopped: {}", e);
                }
                thread_shared.running.store(false, Ordering::Release);
                thread_shared.finished.store(true, Ordering::Release);
            })
            .map_err(|e| EngineError::Thread(format!("frame pump spawn: {}", e)))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn shared(&self) -> &Arc<PumpShared> {
        &self.shared
    }

    pub fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Release);
    }

    /// Asks the loop to end the session and joins it.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("[FramePump] thread panicked");
            }
        }
    }
}

impl Drop for FramePump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(parts: FramePumpParts, shared: &PumpShared) -> EngineResult<()> {
    let FramePumpParts {
        instance,
        session,
        mut frame_waiter,
        mut frame_stream,
        view_type,
        blend_mode,
    } = parts;

    let mut events = xr::EventDataBuffer::new();
    let mut running = false;
    let mut exit_deadline: Option<Instant> = None;

    loop {
        if shared.stop.load(Ordering::Acquire) && exit_deadline.is_none() {
            if !running {
                return Ok(());
            }
            // The runtime answers with STOPPING, which ends the session below.
            if let Err(e) = session.request_exit() {
                warn!("[FramePump] request_exit: {:?}", e);
                return Ok(());
            }
            exit_deadline = Some(Instant::now() + EXIT_DEADLINE);
        }
        if exit_deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("[FramePump] runtime did not stop the session in time");
            return Ok(());
        }

        while let Some(event) = instance.poll_event(&mut events).xr("poll_event")? {
            match event {
                xr::Event::SessionStateChanged(e) => {
                    debug!("[FramePump] session state {:?}", e.state());
                    match e.state() {
                        xr::SessionState::READY => {
                            session.begin(view_type).xr("session begin")?;
                            running = true;
                            shared.running.store(true, Ordering::Release);
                            info!("[FramePump] session running");
                        }
                        xr::SessionState::STOPPING => {
                            session.end().xr("session end")?;
                            running = false;
                            shared.running.store(false, Ordering::Release);
                            info!("[FramePump] session stopped");
                            if exit_deadline.is_some() {
                                return Ok(());
                            }
                        }
                        xr::SessionState::EXITING | xr::SessionState::LOSS_PENDING => {
                            info!("[FramePump] session exiting ({:?})", e.state());
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                xr::Event::InstanceLossPending(_) => {
                    warn!("[FramePump] instance loss pending");
                    return Ok(());
                }
                xr::Event::EventsLost(e) => {
                    warn!("[FramePump] {} events lost", e.lost_event_count());
                }
                _ => {}
            }
        }

        if !running || (shared.paused.load(Ordering::Acquire) && exit_deadline.is_none()) {
            thread::sleep(IDLE_POLL);
            continue;
        }

        let state = frame_waiter.wait().xr("wait_frame")?;
        frame_stream.begin().xr("begin_frame")?;
        shared
            .predicted_display_ns
            .store(state.predicted_display_time.as_nanos(), Ordering::Release);
        // No layers: nothing is rendered, the frame only keeps the session alive.
        frame_stream
            .end(state.predicted_display_time, blend_mode, &[])
            .xr("end_frame")?;
    }
}
