mod common;

use common::{CountingRunner, digits, init_tracing};
use jitstream::{ItemFilter, JitCollection, JitError, Jiterator, Populator, PopulatorBuilder};

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

// Populator that waits for a go signal before pushing the digits.
fn gated_digits(name: &str) -> (Populator<String>, mpsc::Sender<()>) {
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let populator = PopulatorBuilder::new().name(name).build(move |it| {
        go_rx.recv()?;
        for digit in digits() {
            it.push(digit)?;
        }
        Ok(())
    });
    (populator, go_tx)
}

fn paced_digits(pause: Duration) -> Populator<String> {
    Populator::new(move |it| {
        for digit in digits() {
            it.push(digit)?;
            thread::sleep(pause);
        }
        Ok(())
    })
}

#[test]
fn test_collection_collects_paced_digits() {
    init_tracing();
    let populator = paced_digits(Duration::from_millis(20));
    populator.populate().unwrap();

    let collection = populator.result().unwrap();
    let seen: Result<Vec<String>, _> = collection.iter().collect();

    assert_eq!(seen.unwrap(), digits());
    assert_eq!(collection.size().unwrap(), 10);
}

#[test]
fn test_get_waits_only_for_requested_index() {
    let (populator, go) = gated_digits("indexed");
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    let reader = collection.clone();
    let handle = thread::spawn(move || reader.get(5));

    thread::sleep(Duration::from_millis(30));
    assert!(!handle.is_finished(), "get should block before the item exists");

    go.send(()).unwrap();
    assert_eq!(handle.join().unwrap().unwrap(), "5");
}

#[test]
fn test_get_out_of_bounds_after_completion() {
    let populator = paced_digits(Duration::ZERO);
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    assert!(matches!(
        collection.get(10),
        Err(JitError::IndexOutOfBounds { index: 10, len: 10 })
    ));
}

#[test]
fn test_reiterable_after_completion() {
    let populator = paced_digits(Duration::ZERO);
    populator.populate().unwrap();
    let collection = populator.result().unwrap();
    collection.wait_complete().unwrap();

    let first: Vec<String> = collection.iter().map(Result::unwrap).collect();
    let second: Vec<String> = (&collection).into_iter().map(Result::unwrap).collect();

    assert_eq!(first, digits());
    assert_eq!(second, digits(), "Each iteration should replay every item");
}

#[test]
fn test_concurrent_iterations_while_loading() {
    let (populator, go) = gated_digits("live");
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let iter = collection.iter();
            thread::spawn(move || iter.map(Result::unwrap).collect::<Vec<String>>())
        })
        .collect();

    go.send(()).unwrap();

    for reader in readers {
        assert_eq!(reader.join().unwrap(), digits());
    }
}

#[test]
fn test_adds_while_loading_land_after_mirrored_items() {
    let (populator, go) = gated_digits("parked");
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    collection.add("x".to_string());
    collection.add_all(["y".to_string(), "z".to_string()]);
    go.send(()).unwrap();

    let mut expected = digits();
    expected.extend(["x", "y", "z"].map(String::from));
    assert_eq!(collection.to_vec().unwrap(), expected);
}

#[test]
fn test_adds_after_completion_apply_immediately() {
    let populator = paced_digits(Duration::ZERO);
    populator.populate().unwrap();
    let collection = populator.result().unwrap();
    collection.wait_complete().unwrap();

    collection.add("10".to_string());

    assert_eq!(collection.loaded_len(), 11);
    assert_eq!(collection.get(10).unwrap(), "10");
}

#[test]
fn test_declared_size_answers_early_then_real_count_wins() {
    let (populator, go) = gated_digits("sized");
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    collection.set_size(42);
    let start = Instant::now();
    assert_eq!(collection.size().unwrap(), 42, "Declared size answers early");
    assert!(start.elapsed() < Duration::from_secs(1));

    go.send(()).unwrap();
    collection.wait_complete().unwrap();
    assert_eq!(collection.size().unwrap(), 10, "Real count wins after completion");
}

#[test]
fn test_failure_surfaces_on_every_read() {
    let populator = Populator::new(|it| {
        for digit in digits() {
            it.push(digit)?;
        }
        Err("boom".into())
    });
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    let err = collection.size().unwrap_err();
    assert_eq!(err.root_message(), "boom");

    let results: Vec<_> = collection.iter().collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap_err().root_message(), "boom");

    assert!(matches!(collection.get(0), Err(JitError::Load(_))));
    assert!(collection.is_complete());
}

#[test]
fn test_live_iteration_sees_failure() {
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let populator = Populator::new(move |it| {
        it.push(1)?;
        go_rx.recv()?;
        Err("boom".into())
    });
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    let mut iter = collection.iter();
    assert_eq!(iter.next().unwrap().unwrap(), 1);

    go_tx.send(()).unwrap();
    let err = iter.next().unwrap().unwrap_err();
    assert_eq!(err.root_message(), "boom");
    assert!(iter.next().is_none());
}

#[test]
fn test_contains_and_index_queries() {
    let (populator, go) = gated_digits("search");
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    let reader = collection.clone();
    let handle = thread::spawn(move || reader.contains(&"7".to_string()));
    go.send(()).unwrap();
    assert!(handle.join().unwrap().unwrap());

    assert!(!collection.contains(&"missing".to_string()).unwrap());
    assert!(collection
        .contains_all(&["1".to_string(), "9".to_string()])
        .unwrap());
    assert!(!collection
        .contains_all(&["1".to_string(), "11".to_string()])
        .unwrap());

    collection.add("3".to_string());
    assert_eq!(collection.index_of(&"3".to_string()).unwrap(), Some(3));
    assert_eq!(collection.last_index_of(&"3".to_string()).unwrap(), Some(10));
    assert_eq!(collection.index_of(&"42".to_string()).unwrap(), None);
}

#[test]
fn test_positional_writes() {
    let populator = paced_digits(Duration::from_millis(5));
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    // Waits for index 2 to exist, then applies in place.
    assert_eq!(collection.set(2, "two".to_string()).unwrap(), "2");
    collection.insert(0, "start".to_string()).unwrap();
    collection.wait_complete().unwrap();

    assert_eq!(collection.remove_at(1).unwrap(), "0");
    assert!(collection.remove_item(&"two".to_string()).unwrap());
    assert!(!collection.remove_item(&"two".to_string()).unwrap());

    let expected: Vec<String> = ["start", "1", "3", "4", "5", "6", "7", "8", "9"]
        .map(String::from)
        .to_vec();
    assert_eq!(collection.to_vec().unwrap(), expected);

    assert!(matches!(
        collection.insert(20, "late".to_string()),
        Err(JitError::IndexOutOfBounds { index: 20, .. })
    ));
}

#[test]
fn test_clear_and_is_empty() {
    let populator = paced_digits(Duration::ZERO);
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    assert!(!collection.is_empty().unwrap());
    collection.clear().unwrap();
    assert!(collection.is_empty().unwrap());
    assert_eq!(collection.size().unwrap(), 0);
}

#[test]
fn test_empty_population() {
    let populator = Populator::<u8>::new(|_| Ok(()));
    populator.populate().unwrap();
    let collection = populator.result().unwrap();

    assert!(collection.is_empty().unwrap());
    assert_eq!(collection.iter().count(), 0);
}

#[test]
fn test_collection_over_external_producer() {
    let (producer, collection): (Jiterator<u32>, JitCollection<u32>) =
        PopulatorBuilder::new().name("external").collection().unwrap();

    for i in 0..100 {
        producer.push(i).unwrap();
    }
    producer.complete();

    assert_eq!(collection.size().unwrap(), 100);
    assert_eq!(collection.get(99).unwrap(), 99);
    assert_eq!(collection.name(), "external");
}

#[test]
fn test_result_returns_the_same_collection() {
    let populator = paced_digits(Duration::ZERO);
    populator.populate().unwrap();

    let a = populator.result().unwrap();
    let b = populator.result().unwrap();
    a.wait_complete().unwrap();
    a.add("extra".to_string());

    assert_eq!(b.size().unwrap(), 11, "Both handles should share one list");
}

#[test]
fn test_live_iteration_survives_rejected_pushes() {
    let populator = PopulatorBuilder::new()
        .name("filtered")
        .idle_timeout(Duration::from_millis(100))
        .wait_slice(Duration::from_millis(20))
        .filter(ItemFilter::infallible(|value: &u32| *value >= 1000))
        .build(|it| {
            it.push(1000)?;
            // Steady activity, none of it admitted, for longer than the idle timeout.
            for value in 0..15 {
                it.push(value)?;
                thread::sleep(Duration::from_millis(20));
            }
            it.push(1001)?;
            Ok(())
        });
    let collection = populator.result().unwrap();
    let iter = collection.iter();
    populator.populate().unwrap();

    let seen: Result<Vec<u32>, _> = iter.collect();
    assert_eq!(seen.unwrap(), vec![1000, 1001], "Rejected pushes still count as activity");
    assert_eq!(collection.to_vec().unwrap(), vec![1000, 1001]);
}

#[test]
fn test_live_iteration_follows_positional_writes() {
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let populator = Populator::new(move |it| {
        for i in 0..3 {
            it.push(i)?;
        }
        go_rx.recv()?;
        for i in 3..6 {
            it.push(i)?;
        }
        Ok(())
    });
    let collection = populator.result().unwrap();
    let mut iter = collection.iter();
    populator.populate().unwrap();

    let mut seen: Vec<i32> = iter.by_ref().take(3).map(Result::unwrap).collect();
    assert_eq!(seen, vec![0, 1, 2]);

    // Both writes land before the relay's position.
    assert_eq!(collection.remove_at(0).unwrap(), 0);
    collection.insert(0, 100).unwrap();
    go_tx.send(()).unwrap();

    seen.extend(iter.map(Result::unwrap));
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5], "No item may be skipped or repeated");
    assert_eq!(collection.to_vec().unwrap(), vec![100, 1, 2, 3, 4, 5]);
}

#[test]
fn test_live_iteration_sees_items_inserted_ahead() {
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let populator = Populator::new(move |it| {
        it.push(0)?;
        it.push(1)?;
        go_rx.recv()?;
        it.push(2)?;
        Ok(())
    });
    let collection = populator.result().unwrap();
    let mut iter = collection.iter();
    populator.populate().unwrap();

    let seen: Vec<i32> = iter.by_ref().take(2).map(Result::unwrap).collect();
    assert_eq!(seen, vec![0, 1]);

    collection.insert(2, 50).unwrap();
    go_tx.send(()).unwrap();

    let rest: Vec<i32> = iter.map(Result::unwrap).collect();
    assert_eq!(rest, vec![50, 2], "An insert at the relay position is streamed next");
}

#[test]
fn test_dropped_live_iteration_stops_its_relay() {
    let (go_tx, go_rx) = mpsc::channel::<()>();
    let runner = CountingRunner::default();
    let populator = PopulatorBuilder::<u8>::new()
        .name("abandoned")
        .runner(runner.clone())
        .build(move |it| {
            it.push(1)?;
            go_rx.recv()?;
            it.push(2)?;
            Ok(())
        });
    let collection = populator.result().unwrap();
    populator.populate().unwrap();

    let mut iter = collection.iter();
    assert_eq!(iter.next().unwrap().unwrap(), 1);
    assert_eq!(collection.active_relays(), 1);
    drop(iter);
    assert_eq!(collection.active_relays(), 0);

    // Population and mirror stay blocked on the gate; only the relay may finish.
    let start = Instant::now();
    while runner.finished() == 0 && start.elapsed() < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(runner.finished(), 1, "Relay job should exit once its consumer is gone");
    assert_eq!(runner.count(), 3);

    go_tx.send(()).unwrap();
    assert_eq!(collection.to_vec().unwrap(), vec![1, 2]);
}
