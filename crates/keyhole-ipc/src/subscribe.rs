use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use keyhole_wire::{DecodeError, Event};

use crate::dispatch::Dispatch;
use crate::endpoint::SessionEndpoints;
use crate::error::{DispatchError, Error, Result};
use crate::transport::{SubChannel, Transport};

/// Cancellation raised by an interrupt or terminate signal.
static SIGNALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn raise_cancellation(_: nix::libc::c_int) {
    SIGNALLED.store(true, Ordering::SeqCst);
}

/// Collector-side session.
///
/// Receives, decodes and dispatches the events published by one producer
/// process. The receive loop runs on the calling thread; the blocking
/// receive is its only suspension point.
pub struct Subscriber {
    transport: Transport,
    channel: Option<SubChannel>,
    endpoints: SessionEndpoints,
    cancel: Arc<AtomicBool>,
}

impl Subscriber {
    /// Connects to the producer with the given process id.
    ///
    /// Installs the `SIGINT`/`SIGTERM` handlers whose only action is to
    /// raise the cancellation flag, then connects the main channel. A
    /// connect failure is logged but not fatal, matching the lenient
    /// startup policy of the publisher.
    pub fn connect(producer_id: u32) -> Result<Self> {
        install_cancellation_handlers().map_err(Error::SignalHandler)?;

        let endpoints = SessionEndpoints::from_producer_id(producer_id);
        let transport = Transport::new();

        let channel = match transport.connect_subscribe(endpoints.main()) {
            Ok(channel) => Some(channel),
            Err(e) => {
                tracing::error!(error = %e, "main channel unavailable, no event will be received");
                None
            }
        };

        Ok(Self {
            transport,
            channel,
            endpoints,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Returns a handle raising this session's cancellation flag.
    ///
    /// Embedders use it to end [`run`](Self::run) without sending a
    /// process signal.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel),
        }
    }

    /// Blocks until the publisher's startup rendezvous has completed.
    ///
    /// The first frame received on the main channel must decode to a sync
    /// event; anything else (unknown kinds included) is a fatal protocol
    /// error. The empty request/acknowledgement exchange on the handshake
    /// channel then tells the publisher this end is actively receiving.
    pub fn wait_for_publisher(&self) -> Result<()> {
        let Some(channel) = &self.channel else {
            tracing::warn!("skipping handshake, main channel unavailable");
            return Ok(());
        };

        let bytes = loop {
            match channel.recv() {
                Ok(bytes) => break bytes,
                Err(zmq::Error::EINTR) => continue,
                Err(e) => return Err(e.into()),
            }
        };

        let event = match Event::decode(&bytes) {
            Ok(event) => event,
            Err(DecodeError::UnknownKind(kind)) => {
                return Err(Error::UnexpectedDuringHandshake(kind));
            }
            Err(e) => return Err(e.into()),
        };

        if !matches!(event, Event::Sync) {
            return Err(Error::UnexpectedDuringHandshake(event.kind()));
        }

        let request = self.transport.connect_request(self.endpoints.handshake())?;

        request.send(&[])?;
        let _ack = request.recv()?;

        tracing::debug!("publisher attached");

        Ok(())
    }

    /// Runs the receive-decode-dispatch loop until cancellation.
    ///
    /// Stray sync frames left over from the handshake are discarded, and
    /// so are payloads that fail to decode; a dispatch error aborts the
    /// loop. The cancellation flag is observed before each blocking
    /// receive, so at most one in-flight message is still dispatched
    /// after a cancellation request. The channel is closed on every exit
    /// path.
    pub fn run<D: Dispatch>(&mut self, dispatch: &mut D) -> Result<(), D::Error> {
        let Some(channel) = self.channel.take() else {
            tracing::warn!("nothing to receive, main channel unavailable");
            return Ok(());
        };

        loop {
            if self.cancelled() {
                tracing::debug!("cancellation requested, leaving receive loop");
                break;
            }

            let bytes = match channel.recv() {
                Ok(bytes) => bytes,
                // interrupted by a signal: re-check the flag
                Err(zmq::Error::EINTR) => continue,
                Err(e) => return Err(e.into()),
            };

            let event = match Event::decode(&bytes) {
                Ok(event) => event,
                Err(e @ DecodeError::Malformed) => {
                    tracing::warn!(error = %e, "dropping malformed event");
                    continue;
                }
                Err(DecodeError::UnknownKind(kind)) => {
                    tracing::debug!(kind, "dropping event of unknown kind");
                    continue;
                }
            };

            match event {
                // stale rendezvous frames may still be in flight
                Event::Sync => (),
                Event::Start { output_target } => {
                    dispatch.on_start(&output_target).map_err(DispatchError)?
                }
                Event::Stop => dispatch.on_stop().map_err(DispatchError)?,
                Event::Call {
                    class_name,
                    method_name,
                    wall_ns,
                    cpu_ns,
                } => dispatch
                    .on_call(&class_name, &method_name, wall_ns, cpu_ns)
                    .map_err(DispatchError)?,
                Event::Return { wall_ns, cpu_ns } => {
                    dispatch.on_return(wall_ns, cpu_ns).map_err(DispatchError)?
                }
            }
        }

        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst) || SIGNALLED.load(Ordering::SeqCst)
    }
}

/// Handle raising a subscriber's cancellation flag.
///
/// The running receive loop observes the flag before its next blocking
/// receive: one already in-flight message may still be dispatched before
/// the loop exits.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation of the receive loop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

fn install_cancellation_handlers() -> core::result::Result<(), nix::errno::Errno> {
    let action = SigAction::new(
        SigHandler::Handler(raise_cancellation),
        SaFlags::empty(),
        SigSet::empty(),
    );

    unsafe {
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGTERM, &action)?;
    }

    Ok(())
}
