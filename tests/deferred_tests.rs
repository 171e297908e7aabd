//! Integration tests for deferred and repeating callbacks

mod common;
use common::{counter, host, recorder, sample_args, Seen};
use deferral::{delay, every, schedule_callback, Error, Value};
use std::rc::Rc;

mod one_shot {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fires_once_with_args_and_handle_receiver() {
        let host = host();
        let (log, func) = recorder(&host);
        let handle = schedule_callback(&host, func, 50, sample_args(), None, false).unwrap();
        assert!(!handle.has_executed());

        host.run_for(49);
        assert!(log.borrow().is_empty());

        host.run_for(1);
        {
            let calls = log.borrow();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].time, 50);
            assert_eq!(calls[0].args, sample_args());
            assert_eq!(calls[0].has_executed_during, Some(false));
            match &calls[0].this {
                Seen::Handle(h) => assert!(h.same_handle(&handle)),
                Seen::Value(_) => panic!("Expected the handle as receiver"),
            }
        }
        assert!(handle.has_executed());

        // cancel after natural completion is a no-op
        handle.cancel().cancel();
        host.run_for(500);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_this_arg_is_the_receiver() {
        let host = host();
        let (log, func) = recorder(&host);
        let this_arg = Value::new_object();
        schedule_callback(&host, func, 50, sample_args(), Some(this_arg.clone()), false).unwrap();

        host.run_for(50);
        let calls = log.borrow();
        assert_eq!(calls[0].args, sample_args());
        match &calls[0].this {
            Seen::Value(v) => assert!(v.same_value(&this_arg)),
            Seen::Handle(_) => panic!("Expected this_arg as receiver"),
        }
    }

    #[test]
    fn test_array_this_arg_with_no_args() {
        let host = host();
        let (log, func) = recorder(&host);
        let this_arg = Value::new_array(vec![]);
        schedule_callback(&host, func, 50, Vec::new(), Some(this_arg.clone()), false).unwrap();

        host.run_for(50);
        let calls = log.borrow();
        assert!(calls[0].args.is_empty());
        assert!(matches!(&calls[0].this, Seen::Value(v) if v.same_value(&this_arg)));
    }

    #[test]
    fn test_exec_runs_immediately_and_cancels() {
        let host = host();
        let (count, func) = counter();
        let handle = delay(&host, 50, func).unwrap();

        handle.exec().unwrap();
        assert_eq!(count.get(), 1);
        assert!(handle.has_executed());
        assert!(!handle.is_pending());

        host.run_for(50);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_exec_keep_pending_fires_again_on_schedule() {
        let host = host();
        let (count, func) = counter();
        let handle = delay(&host, 50, func).unwrap();

        handle.exec_with(false).unwrap();
        assert_eq!(count.get(), 1);
        assert!(handle.is_pending());

        host.run_for(50);
        assert_eq!(count.get(), 2);
        assert!(!handle.is_pending());
    }

    #[test]
    fn test_exec_uses_scheduled_args_and_receiver() {
        let host = host();
        let (log, func) = recorder(&host);
        let this_arg = Value::from("receiver");
        let handle =
            schedule_callback(&host, func, 50, sample_args(), Some(this_arg.clone()), false).unwrap();

        handle.exec().unwrap();
        let calls = log.borrow();
        assert_eq!(calls[0].time, 0);
        assert_eq!(calls[0].args, sample_args());
        assert!(matches!(&calls[0].this, Seen::Value(v) if *v == this_arg));
    }

    #[test]
    fn test_exec_after_cancel_runs_but_does_not_rearm() {
        let host = host();
        let (count, func) = counter();
        let handle = delay(&host, 50, func).unwrap();

        handle.cancel();
        handle.exec_with(false).unwrap();
        assert_eq!(count.get(), 1);
        assert!(!handle.is_pending());

        host.run_for(100);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let host = host();
        let (count, func) = counter();
        let handle = delay(&host, 50, func).unwrap();

        handle.cancel();
        host.run_for(50);
        assert_eq!(count.get(), 0);
        assert!(!handle.has_executed());
    }

    #[test]
    fn test_zero_delay_is_allowed() {
        let host = host();
        let (count, func) = counter();
        let handle = delay(&host, 0, func).unwrap();
        assert_eq!(count.get(), 0);

        host.run_for(0);
        assert_eq!(count.get(), 1);
        assert!(handle.has_executed());
    }

    #[test]
    fn test_negative_delay_is_rejected() {
        let host = host();
        let (count, func) = counter();
        let err = schedule_callback(&host, func, -50, Vec::new(), None, false).unwrap_err();

        assert!(matches!(err, Error::InvalidDelay { delay_ms: -50, .. }));
        assert!(!host.has_pending_timers());
        host.run_for(100);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_dropped_handle_still_fires() {
        let host = host();
        let (count, func) = counter();
        drop(delay(&host, 10, func).unwrap());

        host.run_for(10);
        assert_eq!(count.get(), 1);
    }
}

mod repeating {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fires_every_interval() {
        let host = host();
        let (log, func) = recorder(&host);
        let handle = schedule_callback(&host, func, 50, Vec::new(), None, true).unwrap();

        host.run_for(120);
        {
            let calls = log.borrow();
            let times: Vec<u64> = calls.iter().map(|c| c.time).collect();
            assert_eq!(times, vec![50, 100]);
            assert!(calls.iter().all(|c| c.has_executed_during == Some(false)));
        }
        assert!(handle.has_executed());
        assert!(handle.is_pending());

        handle.cancel();
        host.run_for(500);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_cancel_right_after_scheduling() {
        let host = host();
        let (count, func) = counter();
        let handle = every(&host, 50, func).unwrap();

        handle.cancel();
        host.run_for(1000);
        assert_eq!(count.get(), 0);
        assert!(!handle.has_executed());
    }

    #[test]
    fn test_at_least_floor_elapsed_over_interval() {
        let host = host();
        let (count, func) = counter();
        let handle = every(&host, 7, func).unwrap();

        host.run_for(1000);
        assert!(count.get() >= 1000 / 7);
        handle.cancel();
    }

    #[test]
    fn test_callback_cancels_itself_through_receiver() {
        let host = host();
        let (count, func) = counter();
        let handle = every(&host, 50, move |this, args| {
            func(this, args)?;
            if let Some(handle) = this.handle() {
                handle.cancel();
            }
            Ok(())
        })
        .unwrap();

        host.run_for(500);
        assert_eq!(count.get(), 1);
        assert!(handle.has_executed());
        assert!(!handle.is_pending());
        assert!(!host.has_pending_timers());
    }

    #[test]
    fn test_exec_cancels_interval() {
        let host = host();
        let (count, func) = counter();
        let handle = every(&host, 50, func).unwrap();

        handle.exec().unwrap();
        assert_eq!(count.get(), 1);
        assert!(handle.has_executed());

        host.run_for(200);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_exec_keep_pending_does_not_shift_schedule() {
        let host = host();
        let (log, func) = recorder(&host);
        let handle = every(&host, 50, func).unwrap();

        host.run_for(30);
        handle.exec_with(false).unwrap();
        host.run_for(90);

        let times: Vec<u64> = log.borrow().iter().map(|c| c.time).collect();
        assert_eq!(times, vec![30, 50, 100]);
        handle.cancel();
    }

    #[test]
    fn test_has_executed_returns_to_true_each_tick() {
        let host = host();
        let (count, func) = counter();
        let handle = every(&host, 50, func).unwrap();

        handle.exec_with(false).unwrap();
        host.run_for(50);
        assert_eq!(count.get(), 2);
        assert!(handle.has_executed());

        host.run_for(70);
        assert_eq!(count.get(), 3);
        assert!(handle.has_executed());
        handle.cancel();
    }

    #[test]
    fn test_errors_do_not_stop_ticks() {
        let host = host();
        let ticks = Rc::new(std::cell::Cell::new(0));
        let t = ticks.clone();
        let handle = every(&host, 10, move |_, _| {
            t.set(t.get() + 1);
            if t.get() % 2 == 1 {
                anyhow::bail!("odd tick {}", t.get());
            }
            Ok(())
        })
        .unwrap();

        let result = host.run_for(50);
        assert_eq!(ticks.get(), 5);
        assert_eq!(result.uncaught_errors, 3);
        // the last tick failed
        assert!(!handle.has_executed());

        let errors = host.drain_uncaught_errors();
        let messages: Vec<String> = errors.iter().map(|e| e.error.to_string()).collect();
        assert_eq!(messages, vec!["odd tick 1", "odd tick 3", "odd tick 5"]);
        assert!(errors.iter().all(|e| Some(e.timer_id) == handle.timer_id()));
        handle.cancel();
    }

    #[test]
    fn test_instances_are_independent() {
        let host = host();
        let (count_a, func_a) = counter();
        let (count_b, func_b) = counter();
        let a = every(&host, 10, func_a).unwrap();
        let b = every(&host, 10, func_b).unwrap();

        host.run_for(20);
        a.cancel();
        host.run_for(20);

        assert_eq!(count_a.get(), 2);
        assert_eq!(count_b.get(), 4);
        assert!(!a.same_handle(&b));
        assert_ne!(a.timer_id(), b.timer_id());
        b.cancel();
    }
}
