    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_of_queue_errors() {
        let queue: EventQueue<u32> = EventQueue::default();
        assert_eq!(queue.try_dequeue().unwrap_err().status(), EventStatus::NonePending);

        queue.dequeue_wait_abort();
        assert_eq!(queue.dequeue_wait().unwrap_err().status(), EventStatus::WaitAbort);
    }

    #[test]
    fn test_config_drives_handler() {
        let config: EventsConfig = ConfigLoader::load_str(
            r#"
            [[handlers]]
            name = "wallet manager"
            queue_capacity = 8
            "#,
        )
        .unwrap();

        let handler_config = config.handler_or_default("wallet manager");
        assert_eq!(handler_config.queue_capacity, 8);

        enum Nothing {}
        impl Event for Nothing {
            fn type_name(&self) -> &'static str {
                match *self {}
            }
        }

        let handler = EventHandler::<Nothing>::with_config(handler_config, Vec::new(), None)
            .with_alarm_clock(AlarmClock::new(config.alarm_clock.clone()));
        handler.set_timeout_dispatcher(Duration::from_secs(60), |_, _, _: &()| {}, ());
        handler.start().unwrap();
        assert!(handler.is_running());
        handler.destroy();
    }
