#[cfg(test)]
mod tests {
    use multi_promise::{MultiPromise, Spawner};
    use std::collections::HashMap;
    use std::sync::{Arc, Barrier};
    use std::{thread, time::Duration};

    #[test]
    fn test_ordered_accumulation_across_threads() {
        let p = MultiPromise::<i32, String>::new();
        let producer = p.clone();
        let sender = thread::spawn(move || {
            for v in 1..=50 {
                producer.fulfill(v);
            }
            producer.complete();
        });
        let receiver = {
            let p = p.clone();
            thread::spawn(move || {
                let mut seen = vec![];
                p.receive(|v| seen.push(v), |err| panic!("unexpected error {err}"));
                seen
            })
        };
        sender.join().expect("The sender thread has panicked");
        let expected: Vec<i32> = (1..=50).collect();
        assert_eq!(receiver.join().expect("The receiver thread has panicked"), expected);
        assert_eq!(p.wait(), (expected, None));
    }

    #[test]
    fn test_idempotent_termination() {
        let completed = MultiPromise::<i32, String>::new();
        completed.fulfill(1);
        completed.complete();
        completed.complete();
        completed.error("ignored".into());
        assert_eq!(completed.wait(), (vec![1], None));

        let failed = MultiPromise::<i32, String>::new();
        failed.error("first".into());
        failed.complete();
        failed.error("second".into());
        assert_eq!(failed.wait(), (vec![], Some("first".to_string())));
    }

    #[test]
    fn test_sticky_first_error() {
        let p = MultiPromise::<i32, &str>::new();
        p.fulfill(1);
        p.error("errA");
        p.error("errB");
        p.fulfill(2);
        assert_eq!(p.wait(), (vec![1], Some("errA")));
    }

    #[test]
    fn test_racing_terminators_never_panic() {
        const RACERS: usize = 8;
        let p = MultiPromise::<usize, usize>::new();
        let start = Arc::new(Barrier::new(RACERS));
        let racers: Vec<_> = (0..RACERS)
            .map(|i| {
                let p = p.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    p.fulfill(i);
                    if i % 2 == 0 {
                        p.complete();
                    } else {
                        p.error(i);
                    }
                })
            })
            .collect();
        for racer in racers {
            racer.join().expect("racer panicked");
        }
        let (values, error) = p.wait();
        assert!(!values.is_empty());
        assert_eq!(p.wait(), (values, error));
    }

    #[test]
    fn test_then_doubles_values() {
        let p = MultiPromise::<i32, String>::new();
        for v in [1, 2, 3] {
            p.fulfill(v);
        }
        p.complete();
        let child = p.then(|x| Ok(x * 2));
        assert_eq!(child.wait(), (vec![2, 4, 6], None));
    }

    #[test]
    fn test_on_error_skipped_on_success() {
        let p = MultiPromise::<i32, String>::new();
        let child = p.on_error(|_| panic!("on_error must not run"));
        p.fulfill(1);
        p.fulfill(2);
        p.complete();
        assert_eq!(child.wait(), (vec![1, 2], None));
    }

    #[test]
    fn test_then_passes_parent_error_through() {
        let p = MultiPromise::<i32, String>::new();
        let child = p.then(|x| Ok(x + 100));
        p.fulfill(1);
        p.error("parent failed".into());
        assert_eq!(child.wait(), (vec![101], Some("parent failed".to_string())));
    }

    /// A failed value callback ends the child. Values after the failing one
    /// are dropped from the child even though the parent already holds them.
    #[test]
    fn test_map_truncates_after_first_error() {
        let p = MultiPromise::<i32, String>::new();
        for v in [-1, 0, 1] {
            p.fulfill(v);
        }
        p.complete();
        let child = p.map(
            |x| {
                if x == 0 {
                    Err("division by zero".to_string())
                } else {
                    Ok(2 / x)
                }
            },
            |err| err,
        );
        assert_eq!(child.wait(), (vec![-2], Some("division by zero".to_string())));
        assert_eq!(p.wait(), (vec![-1, 0, 1], None));
    }

    #[test]
    fn test_map_latch_ignores_later_parent_error() {
        let p = MultiPromise::<i32, String>::new();
        let child = p.map(
            |x| if x > 1 { Err(format!("too big: {x}")) } else { Ok(x) },
            |err| panic!("error callback must not run after the latch: {err}"),
        );
        p.fulfill(1);
        p.fulfill(2);
        p.fulfill(3);
        p.error("parent failed".into());
        assert_eq!(child.wait(), (vec![1], Some("too big: 2".to_string())));
    }

    #[test]
    fn test_map_rewrites_error_and_type() {
        let p = MultiPromise::<&str, String>::new();
        let child = p.map(|s| Ok::<_, usize>(s.len()), |err| err.len());
        p.fulfill("a");
        p.fulfill("abc");
        p.error("1234".into());
        assert_eq!(child.wait(), (vec![1, 3], Some(4)));
    }

    #[test]
    fn test_map_on_named_spawner() {
        let spawner = Spawner::new().name("multi-map");
        let p = MultiPromise::<i32, String>::new();
        let child = p
            .map_on(
                &spawner,
                |x| Ok((x, thread::current().name().map(String::from))),
                |err| err,
            )
            .unwrap();
        p.fulfill(5);
        p.complete();
        let (values, error) = child.wait();
        assert_eq!(error, None);
        assert_eq!(values, vec![(5, Some("multi-map".to_string()))]);
    }

    #[test]
    fn test_late_receiver_replays_everything() {
        let p = MultiPromise::<i32, String>::new();
        p.fulfill(1);
        p.fulfill(2);
        p.error("end".into());
        let first = p.then(|x| Ok(x));
        let second = p.then(|x| Ok(x));
        thread::sleep(Duration::from_millis(5));
        let third = p.then(|x| Ok(x));
        for child in [first, second, third] {
            assert_eq!(child.wait(), (vec![1, 2], Some("end".to_string())));
        }
    }

    #[test]
    fn test_receive_misses_nothing_under_many_producers() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 2_000;
        let p = MultiPromise::<(usize, usize), String>::new();

        let receiver = {
            let p = p.clone();
            thread::spawn(move || {
                let mut seen: Vec<(usize, usize)> = vec![];
                p.receive(|v| seen.push(v), |err| panic!("unexpected error {err}"));
                (seen, p.is_done())
            })
        };

        let start = Arc::new(Barrier::new(PRODUCERS));
        let producers: Vec<_> = (0..PRODUCERS)
            .map(|id| {
                let p = p.clone();
                let start = start.clone();
                thread::spawn(move || {
                    start.wait();
                    for seq in 0..PER_PRODUCER {
                        p.fulfill((id, seq));
                        if seq % 256 == 0 {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().expect("producer panicked");
        }
        p.complete();

        let (seen, ended) = receiver.join().expect("receiver panicked");
        assert!(ended);
        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);

        // Each producer's own values arrive in the order it pushed them.
        let mut next: HashMap<usize, usize> = HashMap::new();
        for (id, seq) in &seen {
            let expected = next.entry(*id).or_insert(0);
            assert_eq!(*seq, *expected);
            *expected += 1;
        }
        assert!(next.values().all(|count| *count == PER_PRODUCER));

        assert_eq!(p.wait().0, seen);
    }
}
