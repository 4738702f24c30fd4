//! Inter-process transport for method-level trace events.
//!
//! An instrumented process (the publisher) streams call/return events to a
//! separate collector process (the subscriber) over a one-way pub/sub
//! channel. Because pub/sub delivery only starts once the subscriber's
//! connection has taken effect, session startup goes through a rendezvous
//! handshake on a second request/reply channel; no real event is emitted
//! before both sides have completed it.
//!
//! Three capabilities are injected by the embedding host:
//! - [`Instrumentation`](instrument::Instrumentation) — the source of
//!   "call observed" / "return observed" notifications,
//! - [`Clock`](clock::Clock) — wall and CPU clock readings per event,
//! - [`Dispatch`](dispatch::Dispatch) — the downstream consumer of decoded
//!   events on the subscriber side.
//!
//! # Publisher side
//!
//! ```no_run
//! use keyhole_ipc::Publisher;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut publisher = Publisher::builder().bind()?;
//!     publisher.wait_for_subscriber()?;
//!
//!     publisher.start("trace.out")?;
//!     // ... the host instrumentation hook now feeds
//!     // `on_call_observed` / `on_return_observed` ...
//!     publisher.stop()?;
//!     Ok(())
//! }
//! ```
//!
//! # Subscriber side
//!
//! ```no_run
//! use keyhole_ipc::{Subscriber, dispatch::Dispatch};
//!
//! struct Printer;
//!
//! impl Dispatch for Printer {
//!     type Error = std::io::Error;
//!
//!     fn on_call(
//!         &mut self,
//!         class_name: &str,
//!         method_name: &str,
//!         _wall_ns: f64,
//!         _cpu_ns: f64,
//!     ) -> Result<(), Self::Error> {
//!         tracing::info!(%class_name, %method_name, "call");
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut subscriber = Subscriber::connect(4242)?;
//!     subscriber.wait_for_publisher()?;
//!     subscriber.run(&mut Printer)?;
//!     Ok(())
//! }
//! ```

/// Module containing the clock capability consumed by the publisher.
pub mod clock;

/// Module containing the dispatch capability consumed by the subscriber.
pub mod dispatch;

/// Module deriving per-session IPC endpoint addresses.
pub mod endpoint;

mod error;

/// Module containing the instrumentation capability consumed by the
/// publisher.
pub mod instrument;

/// Module implementing the producer-side session.
pub mod publish;

/// Module implementing the collector-side session.
pub mod subscribe;

/// Module binding the pub/sub and handshake channels.
pub mod transport;

pub use self::error::{DispatchError, Error, HookError, Result, TraceError};
pub use self::publish::Publisher;
pub use self::subscribe::Subscriber;
