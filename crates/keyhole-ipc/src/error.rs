use std::convert::Infallible;

use crate::transport::TransportError;

/// Instrumentation hook error.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct HookError<E>(pub E);

/// Event dispatch error.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub struct DispatchError<E>(pub E);

/// Error type of this crate.
///
/// `E` is the error type of the session's collaborator: the
/// [`Instrumentation`](crate::instrument::Instrumentation) hook on the
/// publisher side, the [`Dispatch`](crate::dispatch::Dispatch) consumer on
/// the subscriber side.
#[derive(thiserror::Error, Debug)]
pub enum Error<E = Infallible> {
    /// An instrumentation hook error occurred.
    #[error(transparent)]
    Hook(#[from] HookError<E>),

    /// An event dispatch error occurred.
    #[error(transparent)]
    Dispatch(#[from] DispatchError<E>),

    /// A channel could not be bound, connected or allocated.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A send or receive operation failed.
    #[error(transparent)]
    Socket(#[from] zmq::Error),

    /// A received event could not be decoded.
    #[error(transparent)]
    Decode(#[from] keyhole_wire::DecodeError),

    /// The first frame of the handshake was not a sync event.
    #[error("unexpected event kind {0} during handshake")]
    UnexpectedDuringHandshake(u16),

    /// No body was supplied to a scoped trace.
    #[error("no trace body supplied")]
    MissingBody,

    /// A cancellation signal handler could not be installed.
    #[error("failed to install signal handler")]
    SignalHandler(#[source] nix::errno::Errno),

    /// The paired collector process could not be spawned.
    #[error("failed to spawn collector process")]
    SpawnCollector(#[source] std::io::Error),
}

/// Error returned by a scoped trace.
///
/// `E1` is the instrumentation hook error, `E2` the error of the trace
/// body itself.
#[derive(thiserror::Error, Debug)]
pub enum TraceError<E1, E2> {
    /// The session failed to start or stop around the body.
    #[error(transparent)]
    Session(#[from] Error<E1>),

    /// The trace body failed; the session was stopped before this error
    /// was propagated.
    #[error(transparent)]
    Body(E2),
}

/// Result type of this crate.
pub type Result<T, E = Infallible> = core::result::Result<T, Error<E>>;
