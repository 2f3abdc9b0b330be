//! Integration tests for ordering, barriers, backpressure and teardown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tandem_core::{Command, DispatchConfig, DispatchError, Dispatcher, Signal};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Target that records everything it is asked to do.
struct Recorder {
    order: Arc<Mutex<Vec<(usize, u64)>>>,
    counter: u64,
    /// Per-command delay; simulates a worker that falls behind.
    delay: Option<Duration>,
    released: Arc<AtomicBool>,
}

impl Recorder {
    fn new(order: &Arc<Mutex<Vec<(usize, u64)>>>, released: &Arc<AtomicBool>) -> Self {
        Self {
            order: Arc::clone(order),
            counter: 0,
            delay: None,
            released: Arc::clone(released),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

enum RecorderCommand {
    /// Numbered marker from a given producer.
    Mark { producer: usize, seq: u64 },
    Increment,
    ReadCounter(Signal<u64>),
    Jitter,
}

impl Command<Recorder> for RecorderCommand {
    type Error = std::convert::Infallible;

    fn label(&self) -> &'static str {
        match self {
            Self::Mark { .. } => "mark",
            Self::Increment => "increment",
            Self::ReadCounter(_) => "read_counter",
            Self::Jitter => "jitter",
        }
    }

    fn execute(self, target: &mut Recorder) -> Result<(), Self::Error> {
        if let Some(delay) = target.delay {
            thread::sleep(delay);
        }
        match self {
            Self::Mark { producer, seq } => target.order.lock().push((producer, seq)),
            Self::Increment => target.counter += 1,
            Self::ReadCounter(signal) => signal.signal(target.counter),
            Self::Jitter => {
                let micros = rand::thread_rng().gen_range(0..200);
                thread::sleep(Duration::from_micros(micros));
            }
        }
        Ok(())
    }
}

fn config(capacity: usize) -> DispatchConfig {
    DispatchConfig::default()
        .with_capacity(capacity)
        .with_worker_name("dispatch-test-worker")
}

#[test]
fn test_execution_order_equals_issue_order() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let released = Arc::new(AtomicBool::new(false));
    let dispatcher = Dispatcher::start(&config(8), Recorder::new(&order, &released)).unwrap();

    let n = 1_000u64;
    for seq in 0..n {
        dispatcher
            .submit(RecorderCommand::Mark { producer: 0, seq })
            .unwrap();
        if seq % 97 == 0 {
            dispatcher.submit(RecorderCommand::Jitter).unwrap();
        }
    }
    dispatcher.shutdown().unwrap();

    let recorded: Vec<u64> = order.lock().iter().map(|&(_, seq)| seq).collect();
    let expected: Vec<u64> = (0..n).collect();
    assert_eq!(recorded, expected);
}

#[test]
fn test_barrier_waits_for_all_earlier_commands() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let released = Arc::new(AtomicBool::new(false));
    let mut recorder = Recorder::new(&order, &released);
    recorder.delay = Some(Duration::from_micros(50));
    let dispatcher = Dispatcher::start(&config(16), recorder).unwrap();

    for round in 1..=5u64 {
        for _ in 0..100 {
            dispatcher.submit(RecorderCommand::Increment).unwrap();
        }
        let counter = dispatcher
            .submit_and_wait(RecorderCommand::ReadCounter)
            .unwrap();
        assert_eq!(counter, round * 100);
        assert_eq!(dispatcher.pending(), 0);
    }
}

#[test]
fn test_queue_never_exceeds_capacity_and_producer_stalls() {
    init_tracing();
    let capacity = 4;
    let order = Arc::new(Mutex::new(Vec::new()));
    let released = Arc::new(AtomicBool::new(false));
    let mut recorder = Recorder::new(&order, &released);
    recorder.delay = Some(Duration::from_millis(5));
    let dispatcher = Arc::new(Dispatcher::start(&config(capacity), recorder).unwrap());

    let pushed = Arc::new(AtomicUsize::new(0));
    let total = 40usize;
    let producer = {
        let dispatcher = Arc::clone(&dispatcher);
        let pushed = Arc::clone(&pushed);
        thread::spawn(move || {
            for seq in 0..total as u64 {
                dispatcher
                    .submit(RecorderCommand::Mark { producer: 0, seq })
                    .unwrap();
                pushed.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    // Sample while the producer runs: the queue stays bounded, and the
    // producer is never more than capacity (+1 in the worker's hands) ahead.
    while !producer.is_finished() {
        let pending = dispatcher.pending();
        assert!(pending <= capacity, "pending {pending} exceeds capacity {capacity}");
        let accepted = pushed.load(Ordering::SeqCst);
        let executed = order.lock().len();
        let ahead = accepted.saturating_sub(executed);
        assert!(ahead <= capacity + 1, "producer ran {ahead} ahead of the worker");
        thread::sleep(Duration::from_millis(1));
    }
    producer.join().unwrap();

    dispatcher.shutdown().unwrap();
    assert_eq!(order.lock().len(), total);
}

#[test]
fn test_shutdown_drains_releases_and_rejects() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let released = Arc::new(AtomicBool::new(false));
    let mut recorder = Recorder::new(&order, &released);
    recorder.delay = Some(Duration::from_millis(1));
    let dispatcher = Dispatcher::start(&config(64), recorder).unwrap();

    for seq in 0..50 {
        dispatcher
            .submit(RecorderCommand::Mark { producer: 0, seq })
            .unwrap();
    }
    assert!(!released.load(Ordering::SeqCst));

    dispatcher.shutdown().unwrap();

    assert_eq!(order.lock().len(), 50, "shutdown must drain, not abort");
    assert!(released.load(Ordering::SeqCst), "target must be dropped");
    assert_eq!(
        dispatcher.submit(RecorderCommand::Increment),
        Err(DispatchError::QueueClosed)
    );
    assert_eq!(dispatcher.stats().in_flight(), 0);
}

#[test]
fn test_multiple_producers_keep_their_own_order() {
    init_tracing();
    let order = Arc::new(Mutex::new(Vec::new()));
    let released = Arc::new(AtomicBool::new(false));
    let dispatcher = Arc::new(Dispatcher::start(&config(16), Recorder::new(&order, &released)).unwrap());

    let producers = 4;
    let per_producer = 250u64;
    let handles: Vec<_> = (0..producers)
        .map(|producer| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for seq in 0..per_producer {
                    dispatcher
                        .submit(RecorderCommand::Mark { producer, seq })
                        .unwrap();
                }
                // Each producer's barrier covers its own earlier marks.
                dispatcher
                    .submit_and_wait(RecorderCommand::ReadCounter)
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    dispatcher.shutdown().unwrap();

    let recorded = order.lock();
    assert_eq!(recorded.len(), producers * per_producer as usize);
    for producer in 0..producers {
        let seqs: Vec<u64> = recorded
            .iter()
            .filter(|(p, _)| *p == producer)
            .map(|&(_, seq)| seq)
            .collect();
        assert_eq!(seqs, (0..per_producer).collect::<Vec<_>>());
    }
}
