    use super::*;

    fn snapshot_with(dispatched: u64, timeouts: u64, time_us: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_enqueued: dispatched,
            events_enqueued_oob: timeouts,
            events_dispatched: dispatched,
            timeouts_dispatched: timeouts,
            events_cleared: 0,
            starts: 1,
            stops: 1,
            dispatch_time_us: time_us,
        }
    }

    #[test]
    fn test_metrics_new() {
        let metrics = HandlerMetrics::new();
        assert_eq!(metrics.events_dispatched.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.starts.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_dispatch() {
        let metrics = HandlerMetrics::new();
        metrics.record_dispatched(10);
        metrics.record_dispatched(30);
        metrics.record_timeout(20);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_dispatched, 2);
        assert_eq!(snapshot.timeouts_dispatched, 1);
        assert_eq!(snapshot.dispatch_time_us, 60);
        assert_eq!(snapshot.avg_dispatch_time_us(), 20.0);
    }

    #[test]
    fn test_outstanding() {
        let metrics = HandlerMetrics::new();
        for _ in 0..5 {
            metrics.record_enqueued();
        }
        metrics.record_enqueued_oob();
        metrics.record_dispatched(1);
        metrics.record_cleared(2);

        assert_eq!(metrics.snapshot().outstanding(), 3);
    }

    #[test]
    fn test_lifecycle_counts() {
        let metrics = HandlerMetrics::new();
        metrics.record_start();
        metrics.record_stop();
        metrics.record_start();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.starts, 2);
        assert_eq!(snapshot.stops, 1);
    }

    #[test]
    fn test_zero_division() {
        let snapshot = snapshot_with(0, 0, 0);
        assert_eq!(snapshot.avg_dispatch_time_us(), 0.0);
        assert_eq!(snapshot.outstanding(), 0);
    }
