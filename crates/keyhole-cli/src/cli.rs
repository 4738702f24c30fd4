use std::path::PathBuf;

/// The Keyhole trace collector.
#[derive(clap::Parser)]
pub struct CliOpts {
    /// The command to run.
    #[clap(subcommand)]
    pub action: CliAction,
}

/// The command to run.
#[derive(clap::Subcommand)]
pub enum CliAction {
    /// Command to collect the trace events of a producer process and
    /// write them to its requested output target.
    Collect {
        /// Process id of the producer to attach to.
        ///
        /// Defaults to the parent process, which is the producer when
        /// this collector was spawned by a publisher session.
        #[clap(short, long, value_name = "PID")]
        session: Option<u32>,
    },

    /// Command to run a producer/collector pair end to end with a
    /// synthetic call trace.
    Demo {
        /// Path where to store the collected trace.
        #[clap(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

impl CliOpts {
    /// Parses the CLI from the command-line.
    ///
    /// # Warning
    ///
    /// Exits on error.
    pub fn parse_from_cmdline() -> Self {
        <Self as clap::Parser>::parse()
    }
}
