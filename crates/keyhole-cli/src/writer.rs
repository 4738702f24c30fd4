use std::fs::File;
use std::io::{BufWriter, Write};

use keyhole_ipc::dispatch::Dispatch;

/// Trace consumer writing one text line per call/return event.
///
/// The output file is the target named by the session's start event;
/// events arriving while no session is open are dropped.
#[derive(Default)]
pub struct TraceWriter {
    output: Option<BufWriter<File>>,
}

impl Dispatch for TraceWriter {
    type Error = std::io::Error;

    fn on_start(&mut self, output_target: &str) -> Result<(), Self::Error> {
        tracing::info!(output_target, "trace session started");

        self.output = Some(BufWriter::new(File::create(output_target)?));

        Ok(())
    }

    fn on_stop(&mut self) -> Result<(), Self::Error> {
        if let Some(mut output) = self.output.take() {
            output.flush()?;
        }

        tracing::info!("trace session stopped");

        Ok(())
    }

    fn on_call(
        &mut self,
        class_name: &str,
        method_name: &str,
        wall_ns: f64,
        cpu_ns: f64,
    ) -> Result<(), Self::Error> {
        let Some(output) = self.output.as_mut() else {
            tracing::warn!("dropping call event, no trace session open");
            return Ok(());
        };

        writeln!(output, "call: {class_name} {method_name} {wall_ns} {cpu_ns}")
    }

    fn on_return(&mut self, wall_ns: f64, cpu_ns: f64) -> Result<(), Self::Error> {
        let Some(output) = self.output.as_mut() else {
            tracing::warn!("dropping return event, no trace session open");
            return Ok(());
        };

        writeln!(output, "return: {wall_ns} {cpu_ns}")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("trace.out");
        let target = target.display().to_string();

        let mut writer = TraceWriter::default();

        writer.on_start(&target).unwrap();
        writer.on_call("Widget", "render", 1.5, 2.5).unwrap();
        writer.on_return(3.5, 4.5).unwrap();
        writer.on_stop().unwrap();

        let content = std::fs::read_to_string(&target).unwrap();

        assert_eq!(content, "call: Widget render 1.5 2.5\nreturn: 3.5 4.5\n");
    }

    #[test]
    fn events_without_open_session_are_dropped() {
        let mut writer = TraceWriter::default();

        writer.on_call("Widget", "render", 1.0, 2.0).unwrap();
        writer.on_return(3.0, 4.0).unwrap();
        writer.on_stop().unwrap();
    }
}
