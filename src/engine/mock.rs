//! Mock engine.
//!
//! Simulates a standing user slowly turning in place. Every call is recorded on a
//! shared `MockProbe` so tests can see exactly what the session did.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::debug;

use crate::engine::backend::BackendOpener;
use crate::engine::{EngineError, EngineResult, HeadPose, PlatformContext, XrBackend, XrConfig};

/// Standing eye height in metres.
const EYE_HEIGHT: f32 = 1.6;
/// Yaw rate in radians per second.
const YAW_RATE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    Open,
    Resume,
    Pause,
    HeadPose,
    Drop,
}

#[derive(Default)]
struct ProbeState {
    calls: Vec<MockCall>,
    fail_next_open: bool,
    tracking_lost: bool,
}

/// Shared handle for observing and steering mock backends.
#[derive(Clone, Default)]
pub struct MockProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl MockProbe {
    fn with_state<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn record(&self, call: MockCall) {
        self.with_state(|s| s.calls.push(call));
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn count(&self, call: MockCall) -> usize {
        self.with_state(|s| s.calls.iter().filter(|c| **c == call).count())
    }

    /// The next `open` fails with `EngineError::Unsupported`.
    pub fn fail_next_open(&self) {
        self.with_state(|s| s.fail_next_open = true);
    }

    /// While set, `head_pose` reports no valid pose.
    pub fn set_tracking_lost(&self, lost: bool) {
        self.with_state(|s| s.tracking_lost = lost);
    }

    fn tracking_lost(&self) -> bool {
        self.with_state(|s| s.tracking_lost)
    }
}

/// Pose clock that stops while paused.
struct MockClock {
    opened: Instant,
    paused_total: Duration,
    paused_since: Option<Instant>,
}

impl MockClock {
    fn new() -> Self {
        Self {
            opened: Instant::now(),
            paused_total: Duration::ZERO,
            paused_since: None,
        }
    }

    fn elapsed(&self) -> Duration {
        let now = self.paused_since.unwrap_or_else(Instant::now);
        now.duration_since(self.opened).saturating_sub(self.paused_total)
    }

    fn pause(&mut self) {
        if self.paused_since.is_none() {
            self.paused_since = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += since.elapsed();
        }
    }
}

pub struct MockBackend {
    probe: MockProbe,
    clock: MockClock,
}

impl MockBackend {
    pub fn open(probe: MockProbe) -> EngineResult<Self> {
        probe.record(MockCall::Open);
        if probe.with_state(|s| std::mem::take(&mut s.fail_next_open)) {
            return Err(EngineError::Unsupported("mock open failure requested".to_string()));
        }
        debug!("mock backend opened");
        Ok(Self {
            probe,
            clock: MockClock::new(),
        })
    }

    /// Opener that hands every new backend the same probe.
    pub fn opener(probe: MockProbe) -> BackendOpener {
        Box::new(move |_ctx: &PlatformContext, _config: &XrConfig| {
            Ok(Box::new(MockBackend::open(probe.clone())?) as Box<dyn XrBackend>)
        })
    }

    fn pose_at(elapsed: Duration) -> HeadPose {
        // Never 0, which would read as the sentinel.
        let timestamp_ns = (elapsed.as_nanos() as i64).max(1);
        let yaw = elapsed.as_secs_f32() * YAW_RATE;
        HeadPose::new(
            timestamp_ns,
            [0.0, EYE_HEIGHT, 0.0],
            HeadPose::yaw_orientation(yaw),
        )
    }
}

impl XrBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn resume(&mut self) -> EngineResult<()> {
        self.probe.record(MockCall::Resume);
        self.clock.resume();
        Ok(())
    }

    fn pause(&mut self) -> EngineResult<()> {
        self.probe.record(MockCall::Pause);
        self.clock.pause();
        Ok(())
    }

    fn head_pose(&self) -> EngineResult<Option<HeadPose>> {
        self.probe.record(MockCall::HeadPose);
        if self.probe.tracking_lost() {
            return Ok(None);
        }
        Ok(Some(Self::pose_at(self.clock.elapsed())))
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.probe.record(MockCall::Drop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poses_are_unit_and_never_sentinel() {
        let backend = MockBackend::open(MockProbe::default()).unwrap();
        for _ in 0..4 {
            let p = backend.head_pose().unwrap().unwrap();
            assert!(!p.is_sentinel());
            assert!(p.is_unit_orientation(1e-5));
            assert_eq!(p.position, [0.0, EYE_HEIGHT, 0.0]);
        }
    }

    #[test]
    fn pose_clock_freezes_while_paused() {
        let mut backend = MockBackend::open(MockProbe::default()).unwrap();
        backend.pause().unwrap();
        let a = backend.head_pose().unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let b = backend.head_pose().unwrap().unwrap();
        assert_eq!(a, b);

        backend.resume().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let c = backend.head_pose().unwrap().unwrap();
        assert!(c.timestamp_ns > b.timestamp_ns);
    }

    #[test]
    fn probe_records_lifecycle() {
        let probe = MockProbe::default();
        {
            let mut backend = MockBackend::open(probe.clone()).unwrap();
            backend.pause().unwrap();
            backend.resume().unwrap();
        }
        assert_eq!(
            probe.calls(),
            vec![MockCall::Open, MockCall::Pause, MockCall::Resume, MockCall::Drop]
        );
    }

    #[test]
    fn requested_open_failure_happens_once() {
        let probe = MockProbe::default();
        probe.fail_next_open();
        assert!(MockBackend::open(probe.clone()).is_err());
        assert!(MockBackend::open(probe.clone()).is_ok());
        assert_eq!(probe.count(MockCall::Open), 2);
    }

    #[test]
    fn lost_tracking_reports_none() {
        let probe = MockProbe::default();
        let backend = MockBackend::open(probe.clone()).unwrap();
        probe.set_tracking_lost(true);
        assert!(backend.head_pose().unwrap().is_none());
    }
}
