#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};
    use std::thread;
    use std::time::{Duration, Instant};

    use crate::engine::mock::{MockBackend, MockCall, MockProbe};
    use crate::engine::{
        EngineError, EngineResult, HeadPose, PlatformContext, SessionState, XrBackend, XrConfig, XrSession,
    };

    fn mock_session() -> (XrSession, MockProbe) {
        let probe = MockProbe::default();
        let session = XrSession::with_opener(XrConfig::default(), MockBackend::opener(probe.clone()));
        (session, probe)
    }

    #[test]
    fn initialize_then_pose_is_live() {
        let (mut s, _probe) = mock_session();

        s.initialize(&PlatformContext::Desktop).unwrap();

        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.backend_name(), Some("mock"));
        let pose = s.head_pose();
        assert!(!pose.is_sentinel());
        assert!(pose.is_unit_orientation(1e-5));
    }

    #[test]
    fn pose_before_initialize_is_identity() {
        let (s, probe) = mock_session();

        assert_eq!(s.head_pose(), HeadPose::IDENTITY);
        // Nothing was opened just to answer the query.
        assert!(probe.calls().is_empty());
    }

    #[test]
    fn shutdown_allows_reinitialize() {
        let (mut s, probe) = mock_session();
        let ctx = PlatformContext::Desktop;

        s.initialize(&ctx).unwrap();
        s.shutdown().unwrap();
        assert_eq!(s.state(), SessionState::Uninitialized);
        assert_eq!(s.head_pose(), HeadPose::IDENTITY);

        s.initialize(&ctx).unwrap();
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(probe.count(MockCall::Open), 2);
        assert_eq!(probe.count(MockCall::Drop), 1);
    }

    #[test]
    fn pause_resume_alternation() {
        let (mut s, probe) = mock_session();
        s.initialize(&PlatformContext::Desktop).unwrap();

        for _ in 0..3 {
            s.pause().unwrap();
            assert_eq!(s.state(), SessionState::Paused);
            s.resume().unwrap();
            assert_eq!(s.state(), SessionState::Active);
        }

        assert_eq!(probe.count(MockCall::Pause), 3);
        assert_eq!(probe.count(MockCall::Resume), 3);
    }

    #[test]
    fn repeated_pause_or_resume_is_idempotent() {
        let (mut s, probe) = mock_session();
        s.initialize(&PlatformContext::Desktop).unwrap();

        s.resume().unwrap();
        s.pause().unwrap();
        s.pause().unwrap();

        assert_eq!(s.state(), SessionState::Paused);
        assert_eq!(probe.count(MockCall::Resume), 0);
        assert_eq!(probe.count(MockCall::Pause), 1);
    }

    #[test]
    fn lifecycle_before_initialize_is_rejected() {
        let (mut s, _probe) = mock_session();

        assert!(matches!(
            s.resume(),
            Err(EngineError::InvalidTransition { op: "resume", state: SessionState::Uninitialized })
        ));
        assert!(matches!(
            s.pause(),
            Err(EngineError::InvalidTransition { op: "pause", .. })
        ));
        // Shutdown is always allowed.
        s.shutdown().unwrap();
    }

    #[test]
    fn failed_initialize_stays_uninitialized() {
        let (mut s, probe) = mock_session();
        probe.fail_next_open();

        assert!(s.initialize(&PlatformContext::Desktop).is_err());
        assert_eq!(s.state(), SessionState::Uninitialized);
        assert_eq!(s.head_pose(), HeadPose::IDENTITY);

        // Host retries.
        s.initialize(&PlatformContext::Desktop).unwrap();
        assert_eq!(s.state(), SessionState::Active);
    }

    #[test]
    fn second_initialize_is_a_no_op() {
        let (mut s, probe) = mock_session();
        s.initialize(&PlatformContext::Desktop).unwrap();
        s.initialize(&PlatformContext::Desktop).unwrap();
        assert_eq!(probe.count(MockCall::Open), 1);
    }

    #[test]
    fn tracking_loss_repeats_last_good_pose() {
        let (mut s, probe) = mock_session();
        s.initialize(&PlatformContext::Desktop).unwrap();
        s.pause().unwrap();

        let good = s.head_pose();
        probe.set_tracking_lost(true);
        assert_eq!(s.head_pose(), good);

        probe.set_tracking_lost(false);
        assert!(!s.head_pose().is_sentinel());
    }

    #[test]
    fn tracking_loss_without_history_is_identity() {
        let (mut s, probe) = mock_session();
        probe.set_tracking_lost(true);
        s.initialize(&PlatformContext::Desktop).unwrap();
        assert_eq!(s.head_pose(), HeadPose::IDENTITY);
    }

    #[test]
    fn dropping_session_releases_backend() {
        let (mut s, probe) = mock_session();
        s.initialize(&PlatformContext::Desktop).unwrap();
        drop(s);
        assert_eq!(probe.calls().last(), Some(&MockCall::Drop));
    }

    /// Backend whose pose query only returns once `expected` queries are in flight.
    struct RendezvousBackend {
        inside: Arc<AtomicUsize>,
        expected: usize,
    }

    impl XrBackend for RendezvousBackend {
        fn name(&self) -> &'static str {
            "rendezvous"
        }

        fn resume(&mut self) -> EngineResult<()> {
            Ok(())
        }

        fn pause(&mut self) -> EngineResult<()> {
            Ok(())
        }

        fn head_pose(&self) -> EngineResult<Option<HeadPose>> {
            let n = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            let deadline = Instant::now() + Duration::from_secs(2);
            while self.inside.load(Ordering::SeqCst) < self.expected && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            let met = self.inside.load(Ordering::SeqCst) >= self.expected;
            Ok(met.then(|| HeadPose::new(n as i64, [0.0, 1.6, 0.0], [0.0, 0.0, 0.0, 1.0])))
        }
    }

    #[test]
    fn pose_queries_run_in_parallel_under_read_lock() {
        const READERS: usize = 4;
        let inside = Arc::new(AtomicUsize::new(0));
        let opener_inside = inside.clone();
        let mut session = XrSession::with_opener(
            XrConfig::default(),
            Box::new(move |_ctx: &PlatformContext, _config: &XrConfig| {
                Ok(Box::new(RendezvousBackend {
                    inside: opener_inside.clone(),
                    expected: READERS,
                }) as Box<dyn XrBackend>)
            }),
        );
        session.initialize(&PlatformContext::Desktop).unwrap();
        let session = Arc::new(RwLock::new(session));

        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                let session = session.clone();
                thread::spawn(move || session.read().unwrap().head_pose())
            })
            .collect();

        // Each query only yields a live pose if all of them were in the backend at once.
        for reader in readers {
            assert!(!reader.join().unwrap().is_sentinel());
        }
        assert_eq!(inside.load(Ordering::SeqCst), READERS);
    }

    #[test]
    fn last_pose_keeps_the_newest_sample() {
        let (mut s, probe) = mock_session();
        s.initialize(&PlatformContext::Desktop).unwrap();

        let first = s.head_pose();
        thread::sleep(Duration::from_millis(2));
        let second = s.head_pose();
        assert!(second.timestamp_ns > first.timestamp_ns);

        probe.set_tracking_lost(true);
        assert_eq!(s.head_pose(), second);
    }
}
