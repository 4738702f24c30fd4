//! Command line interface of the Keyhole trace collector.

mod cli;
mod writer;

pub use self::cli::{CliAction, CliOpts};
pub use self::writer::TraceWriter;
