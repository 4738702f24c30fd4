use std::convert::Infallible;

/// Capability implemented by the host runtime's instrumentation layer.
///
/// The publisher session notifies it when event consumption starts and
/// stops; in between, the host is expected to feed every observed call
/// and return into [`Publisher::on_call_observed`] and
/// [`Publisher::on_return_observed`].
///
/// How the host resolves the class and method names of a call site is its
/// own business; the session only consumes the resolved pair.
///
/// [`Publisher::on_call_observed`]: crate::Publisher::on_call_observed
/// [`Publisher::on_return_observed`]: crate::Publisher::on_return_observed
pub trait Instrumentation {
    /// Error returned by this instrumentation source.
    type Error: std::error::Error;

    /// Function called when the session starts consuming call/return
    /// notifications.
    fn subscribe(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Function called when the session stops consuming call/return
    /// notifications.
    fn unsubscribe(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Instrumentation source with no hook to install.
///
/// Used by sessions whose events are emitted explicitly rather than
/// driven by a host runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unhooked;

impl Instrumentation for Unhooked {
    type Error = Infallible;
}
