use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};

use keyhole_wire::Event;

use crate::clock::{Clock, SystemClock};
use crate::endpoint::SessionEndpoints;
use crate::error::{Error, HookError, TraceError};
use crate::instrument::{Instrumentation, Unhooked};
use crate::transport::{PubChannel, Transport};

/// Producer-side session.
///
/// Owns the publishing end of the main channel, the reentrancy guard and
/// (optionally) the paired collector process. When dropped, the session
/// terminates and reaps the collector and releases both endpoint names.
pub struct Publisher<C = SystemClock, I = Unhooked> {
    transport: Transport,
    channel: Option<PubChannel>,
    endpoints: SessionEndpoints,
    clock: C,
    instrumentation: I,
    collector: Option<Child>,

    /// Whether the emission hook is live (between `start` and `stop`).
    enabled: AtomicBool,

    /// Reentrancy guard: set while one event is being encoded and sent.
    ///
    /// Notifications arriving while it is held are dropped, never queued,
    /// so the emission path cannot recurse into itself.
    reentered: AtomicBool,
}

impl Publisher {
    /// Creates a publisher builder.
    pub fn builder() -> Builder {
        Builder {
            clock: SystemClock,
            instrumentation: Unhooked,
            collector: None,
            session_id: None,
        }
    }
}

impl<C: Clock, I: Instrumentation> Publisher<C, I> {
    /// Blocks until one subscriber has completed the startup rendezvous.
    ///
    /// Sync frames are published repeatedly on the main channel while the
    /// handshake channel is polled without blocking: the subscriber's
    /// connection only takes effect at some point during this repetition,
    /// and its handshake request tells us it has started receiving. One
    /// empty acknowledgement is sent back, after which the handshake
    /// channel is closed; a second subscriber is not served.
    ///
    /// Handshake channel failures are fatal, unlike main channel ones.
    pub fn wait_for_subscriber(&self) -> Result<(), Error<I::Error>> {
        let _ = std::fs::remove_file(self.endpoints.handshake_path());
        let reply = self.transport.bind_reply(self.endpoints.handshake())?;

        loop {
            self.publish(&Event::Sync);

            if reply.try_recv()?.is_some() {
                reply.send(&[])?;
                break;
            }
        }

        tracing::debug!("subscriber attached");

        Ok(())
    }

    /// Starts a tracing session.
    ///
    /// Publishes the start event carrying `output_target`, then enables
    /// the emission hook and subscribes to the instrumentation source.
    pub fn start(&mut self, output_target: &str) -> Result<(), Error<I::Error>> {
        self.publish(&Event::Start {
            output_target: output_target.to_owned(),
        });

        self.enabled.store(true, Ordering::Release);

        self.instrumentation.subscribe().map_err(HookError)?;

        Ok(())
    }

    /// Stops the tracing session.
    pub fn stop(&mut self) -> Result<(), Error<I::Error>> {
        self.publish(&Event::Stop);

        self.enabled.store(false, Ordering::Release);

        self.instrumentation.unsubscribe().map_err(HookError)?;

        Ok(())
    }

    /// Runs `body` inside a scoped tracing session.
    ///
    /// The session is stopped on every exit path, including unwinds; an
    /// error from `body` is propagated after the stop. Fails with
    /// [`Error::MissingBody`] when no body is supplied.
    pub fn trace<T, E, F>(
        &mut self,
        output_target: &str,
        body: Option<F>,
    ) -> Result<T, TraceError<I::Error, E>>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error,
    {
        let Some(body) = body else {
            return Err(TraceError::Session(Error::MissingBody));
        };

        self.start(output_target)?;

        let mut guard = StopGuard {
            publisher: Some(self),
        };

        let out = body();
        let stopped = guard.stop_now();

        let value = out.map_err(TraceError::Body)?;
        stopped?;

        Ok(value)
    }

    /// Notification of an observed method call.
    ///
    /// Ignored while the emission hook is disabled or while another event
    /// is being emitted (reentrancy guard).
    pub fn on_call_observed(&self, class_name: &str, method_name: &str) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }

        if self.reentered.swap(true, Ordering::Acquire) {
            return;
        }

        let wall_ns = self.clock.wall_clock_ns();
        let cpu_ns = self.clock.cpu_clock_ns();

        self.publish(&Event::Call {
            class_name: class_name.to_owned(),
            method_name: method_name.to_owned(),
            wall_ns,
            cpu_ns,
        });

        self.reentered.store(false, Ordering::Release);
    }

    /// Notification of an observed method return.
    ///
    /// Same guard discipline as [`on_call_observed`](Self::on_call_observed).
    pub fn on_return_observed(&self) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }

        if self.reentered.swap(true, Ordering::Acquire) {
            return;
        }

        let wall_ns = self.clock.wall_clock_ns();
        let cpu_ns = self.clock.cpu_clock_ns();

        self.publish(&Event::Return { wall_ns, cpu_ns });

        self.reentered.store(false, Ordering::Release);
    }

    /// Publishes one event on the main channel.
    ///
    /// A session in degraded mode (no channel) or a failed send drops the
    /// event: emitting a trace must never crash the instrumented process.
    fn publish(&self, event: &Event) {
        let Some(channel) = &self.channel else {
            return;
        };

        if let Err(e) = channel.send(&event.encode()) {
            tracing::error!(error = %e, kind = event.kind(), "failed to publish event");
        }
    }
}

impl<C, I> Drop for Publisher<C, I> {
    fn drop(&mut self) {
        if let Some(mut collector) = self.collector.take() {
            let pid = nix::unistd::Pid::from_raw(collector.id() as i32);

            match nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => (),
                Err(e) => {
                    tracing::error!(error = %e, pid = collector.id(), "failed to signal collector")
                }
            }

            match collector.wait() {
                Ok(status) => tracing::debug!(%status, "collector reaped"),
                Err(e) => tracing::error!(error = %e, "failed to reap collector"),
            }
        }

        // close the socket before releasing the endpoint names
        self.channel.take();

        let _ = std::fs::remove_file(self.endpoints.main_path());
        let _ = std::fs::remove_file(self.endpoints.handshake_path());
    }
}

/// Stops the session when dropped, covering unwinds out of a trace body.
struct StopGuard<'a, C: Clock, I: Instrumentation> {
    publisher: Option<&'a mut Publisher<C, I>>,
}

impl<C: Clock, I: Instrumentation> StopGuard<'_, C, I> {
    fn stop_now(&mut self) -> Result<(), Error<I::Error>> {
        match self.publisher.take() {
            Some(publisher) => publisher.stop(),
            None => Ok(()),
        }
    }
}

impl<C: Clock, I: Instrumentation> Drop for StopGuard<'_, C, I> {
    fn drop(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            if let Err(e) = publisher.stop() {
                tracing::error!(error = %e, "failed to stop trace session during unwind");
            }
        }
    }
}

/// Builder for [Publisher].
///
/// Injects the clock and instrumentation capabilities and configures the
/// paired collector process.
pub struct Builder<C = SystemClock, I = Unhooked> {
    clock: C,
    instrumentation: I,
    collector: Option<Command>,
    session_id: Option<u32>,
}

impl<C, I> Builder<C, I> {
    /// Specifies the clock supplying per-event timings.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Builder<C2, I> {
        Builder {
            clock,
            instrumentation: self.instrumentation,
            collector: self.collector,
            session_id: self.session_id,
        }
    }

    /// Specifies the instrumentation source to notify on start/stop.
    pub fn with_instrumentation<I2: Instrumentation>(self, instrumentation: I2) -> Builder<C, I2> {
        Builder {
            clock: self.clock,
            instrumentation,
            collector: self.collector,
            session_id: self.session_id,
        }
    }

    /// Specifies a collector process to spawn and pair with.
    ///
    /// The session owns the spawned process: it is sent a best-effort
    /// `SIGTERM` and reaped when the publisher is dropped.
    pub fn with_collector(mut self, command: Command) -> Self {
        self.collector = Some(command);
        self
    }

    /// Overrides the producer id used to derive the endpoint addresses.
    ///
    /// Defaults to the current process id. Hosts embedding several
    /// sessions in one process must give each a distinct id.
    pub fn session_id(mut self, id: u32) -> Self {
        self.session_id = Some(id);
        self
    }

    /// Spawns the collector (if any) and binds the main channel.
    ///
    /// A main channel bind failure is not fatal: the session keeps
    /// running in a degraded mode where every published event is dropped,
    /// on the premise that a trace producer should not crash the process
    /// it instruments.
    pub fn bind(self) -> Result<Publisher<C, I>, Error<I::Error>>
    where
        C: Clock,
        I: Instrumentation,
    {
        let id = self.session_id.unwrap_or_else(std::process::id);
        let endpoints = SessionEndpoints::from_producer_id(id);

        let collector = match self.collector {
            Some(mut command) => Some(command.spawn().map_err(Error::SpawnCollector)?),
            None => None,
        };

        let transport = Transport::new();

        let _ = std::fs::remove_file(endpoints.main_path());

        let channel = match transport.bind_publish(endpoints.main()) {
            Ok(channel) => Some(channel),
            Err(e) => {
                tracing::error!(error = %e, "main channel unavailable, events will be dropped");
                None
            }
        };

        Ok(Publisher {
            transport,
            channel,
            endpoints,
            clock: self.clock,
            instrumentation: self.instrumentation,
            collector,
            enabled: AtomicBool::new(false),
            reentered: AtomicBool::new(false),
        })
    }
}
