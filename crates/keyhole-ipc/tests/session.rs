// Once clippy takes `clippy.toml` into account (for `tests` targets),
// we can remove these.
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(missing_docs)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use keyhole_ipc::clock::Clock;
use keyhole_ipc::dispatch::Dispatch;
use keyhole_ipc::endpoint::SessionEndpoints;
use keyhole_ipc::instrument::Unhooked;
use keyhole_ipc::subscribe::CancelHandle;
use keyhole_ipc::transport::Transport;
use keyhole_ipc::{Error, Publisher, Subscriber, TraceError};

use keyhole_wire::{CLOCK_UNAVAILABLE, Event};

/// Endpoint addresses derive from the producer id, so every test uses a
/// distinct one to stay isolated from the others running in parallel.
fn session_id(n: u32) -> u32 {
    std::process::id().wrapping_mul(100).wrapping_add(n)
}

#[derive(Debug, PartialEq)]
enum Seen {
    Start(String),
    Stop,
    Call(String, String, f64, f64),
    Return(f64, f64),
}

/// Records every dispatched event and cancels its session on stop.
struct Recording {
    seen: Vec<Seen>,
    cancel: CancelHandle,
}

impl Dispatch for Recording {
    type Error = Infallible;

    fn on_start(&mut self, output_target: &str) -> Result<(), Self::Error> {
        self.seen.push(Seen::Start(output_target.to_owned()));
        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), Self::Error> {
        self.seen.push(Seen::Stop);
        self.cancel.cancel();
        Ok(())
    }

    fn on_call(
        &mut self,
        class_name: &str,
        method_name: &str,
        wall_ns: f64,
        cpu_ns: f64,
    ) -> Result<(), Self::Error> {
        self.seen.push(Seen::Call(
            class_name.to_owned(),
            method_name.to_owned(),
            wall_ns,
            cpu_ns,
        ));
        Ok(())
    }

    fn on_return(&mut self, wall_ns: f64, cpu_ns: f64) -> Result<(), Self::Error> {
        self.seen.push(Seen::Return(wall_ns, cpu_ns));
        Ok(())
    }
}

/// Runs a collector until the publisher's stop event, returning every
/// event it dispatched.
fn collect_session(producer_id: u32) -> std::thread::JoinHandle<Vec<Seen>> {
    std::thread::spawn(move || {
        let mut subscriber = Subscriber::connect(producer_id).unwrap();
        subscriber.wait_for_publisher().unwrap();

        let mut dispatch = Recording {
            seen: Vec::new(),
            cancel: subscriber.cancel_handle(),
        };

        subscriber.run(&mut dispatch).unwrap();

        dispatch.seen
    })
}

#[test_log::test]
fn rendezvous_then_ordered_delivery() {
    let id = session_id(1);

    let collector = collect_session(id);

    let mut publisher = Publisher::builder().session_id(id).bind().unwrap();
    publisher.wait_for_subscriber().unwrap();

    publisher.start("trace.out").unwrap();
    publisher.on_call_observed("Widget", "render");
    publisher.on_return_observed();
    publisher.stop().unwrap();

    let seen = collector.join().unwrap();

    assert_eq!(seen.len(), 4, "events: {seen:?}");
    assert_eq!(seen[0], Seen::Start("trace.out".to_owned()));
    assert_eq!(seen[3], Seen::Stop);

    let Seen::Call(class_name, method_name, w1, _) = &seen[1] else {
        panic!("expected call event, got {:?}", seen[1]);
    };
    assert_eq!(class_name, "Widget");
    assert_eq!(method_name, "render");

    let Seen::Return(w2, _) = &seen[2] else {
        panic!("expected return event, got {:?}", seen[2]);
    };

    if *w1 != CLOCK_UNAVAILABLE && *w2 != CLOCK_UNAVAILABLE {
        assert!(w2 >= w1, "return wall clock went backwards: {w1} > {w2}");
    }
}

#[test_log::test]
fn non_sync_first_frame_fails_handshake() {
    let id = session_id(2);
    let endpoints = SessionEndpoints::from_producer_id(id);

    let stop = Arc::new(AtomicBool::new(false));

    let publisher = {
        let endpoints = endpoints.clone();
        let stop = Arc::clone(&stop);

        std::thread::spawn(move || {
            let _ = std::fs::remove_file(endpoints.main_path());

            let transport = Transport::new();
            let channel = transport.bind_publish(endpoints.main()).unwrap();

            // a broken producer skipping the rendezvous
            let frame = Event::Start {
                output_target: "trace.out".to_owned(),
            }
            .encode();

            while !stop.load(Ordering::SeqCst) {
                channel.send(&frame).unwrap();
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        })
    };

    let subscriber = Subscriber::connect(id).unwrap();
    let err = subscriber.wait_for_publisher().unwrap_err();

    assert!(
        matches!(err, Error::UnexpectedDuringHandshake(kind) if kind == 1),
        "unexpected error: {err:?}"
    );

    stop.store(true, Ordering::SeqCst);
    publisher.join().unwrap();

    let _ = std::fs::remove_file(endpoints.main_path());
}

#[test_log::test]
fn cancellation_before_run_dispatches_nothing() {
    let id = session_id(3);

    let _publisher = Publisher::builder().session_id(id).bind().unwrap();

    let mut subscriber = Subscriber::connect(id).unwrap();
    subscriber.cancel_handle().cancel();

    let mut dispatch = Recording {
        seen: Vec::new(),
        cancel: subscriber.cancel_handle(),
    };

    subscriber.run(&mut dispatch).unwrap();

    assert!(dispatch.seen.is_empty(), "events: {:?}", dispatch.seen);
}

type SharedPublisher = Rc<RefCell<Option<Rc<Publisher<ReentrantClock, Unhooked>>>>>;

/// Clock whose first wall reading re-enters the emission path, the way a
/// host runtime hook can when reading the clock is itself instrumented.
struct ReentrantClock {
    publisher: SharedPublisher,
    nested: Cell<bool>,
}

impl Clock for ReentrantClock {
    fn wall_clock_ns(&self) -> f64 {
        if !self.nested.replace(true) {
            if let Some(publisher) = self.publisher.borrow().as_ref() {
                publisher.on_call_observed("Nested", "call");
            }
        }

        1.0
    }

    fn cpu_clock_ns(&self) -> f64 {
        2.0
    }
}

#[test_log::test]
fn reentrant_notification_emits_single_call() {
    let id = session_id(4);

    let cell: SharedPublisher = Rc::new(RefCell::new(None));

    let clock = ReentrantClock {
        publisher: Rc::clone(&cell),
        nested: Cell::new(false),
    };

    let collector = collect_session(id);

    let mut publisher = Publisher::builder()
        .with_clock(clock)
        .session_id(id)
        .bind()
        .unwrap();

    publisher.wait_for_subscriber().unwrap();
    publisher.start("trace.out").unwrap();

    let publisher = Rc::new(publisher);
    cell.borrow_mut().replace(Rc::clone(&publisher));

    publisher.on_call_observed("Widget", "render");

    cell.borrow_mut().take();
    let mut publisher = Rc::try_unwrap(publisher).ok().unwrap();
    publisher.stop().unwrap();

    let seen = collector.join().unwrap();

    let calls: Vec<_> = seen
        .iter()
        .filter(|event| matches!(event, Seen::Call(..)))
        .collect();

    assert_eq!(calls.len(), 1, "events: {seen:?}");
    assert_eq!(
        *calls[0],
        Seen::Call("Widget".to_owned(), "render".to_owned(), 1.0, 2.0)
    );
}

#[test_log::test]
fn missing_trace_body_is_rejected() {
    let id = session_id(5);

    let mut publisher = Publisher::builder().session_id(id).bind().unwrap();

    let err = publisher
        .trace::<(), std::io::Error, fn() -> Result<(), std::io::Error>>("trace.out", None)
        .unwrap_err();

    assert!(matches!(err, TraceError::Session(Error::MissingBody)));
}

#[test_log::test]
fn trace_runs_body_and_propagates_its_error() {
    let id = session_id(6);

    let mut publisher = Publisher::builder().session_id(id).bind().unwrap();

    let mut ran = false;
    let value = publisher
        .trace(
            "trace.out",
            Some(|| -> Result<u32, std::io::Error> {
                ran = true;
                Ok(7)
            }),
        )
        .unwrap();

    assert_eq!(value, 7);
    assert!(ran);

    let err = publisher
        .trace(
            "trace.out",
            Some(|| -> Result<(), std::io::Error> {
                Err(std::io::Error::other("boom"))
            }),
        )
        .unwrap_err();

    assert!(matches!(err, TraceError::Body(_)), "unexpected: {err:?}");
}
