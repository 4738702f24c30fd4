/// Trait for implementing a consumer of decoded trace events.
///
/// Implemented by the downstream collaborator of the subscriber session
/// (e.g., a trace file writer, a call tree aggregator). All methods
/// default to no-ops.
pub trait Dispatch {
    /// Error returned by this consumer.
    type Error: std::error::Error;

    /// Function called when the publisher starts a tracing session.
    fn on_start(&mut self, _output_target: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Function called when the publisher stops the tracing session.
    fn on_stop(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Function called for each observed method call.
    ///
    /// Timings may be the clock-unavailable sentinel
    /// ([`CLOCK_UNAVAILABLE`](keyhole_wire::CLOCK_UNAVAILABLE)).
    fn on_call(
        &mut self,
        _class_name: &str,
        _method_name: &str,
        _wall_ns: f64,
        _cpu_ns: f64,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Function called for each observed method return.
    fn on_return(&mut self, _wall_ns: f64, _cpu_ns: f64) -> Result<(), Self::Error> {
        Ok(())
    }
}
