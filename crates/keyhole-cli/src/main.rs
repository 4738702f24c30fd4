#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

use std::path::PathBuf;
use std::process::Command;

use miette::IntoDiagnostic;

use keyhole_cli::{CliAction, CliOpts, TraceWriter};

use keyhole_ipc::{Publisher, Subscriber};

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = CliOpts::parse_from_cmdline();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("KEYHOLE_LOG")
                .from_env_lossy(),
        )
        .init();

    let res = match cli.action {
        CliAction::Collect { session } => evaluate_collect(session),
        CliAction::Demo { output } => evaluate_demo(output),
    };

    if let Err(e) = res {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

fn evaluate_collect(session: Option<u32>) -> miette::Result<()> {
    let session = session.unwrap_or_else(|| nix::unistd::getppid().as_raw() as u32);

    let mut subscriber = Subscriber::connect(session).into_diagnostic()?;

    subscriber.wait_for_publisher().into_diagnostic()?;

    subscriber.run(&mut TraceWriter::default()).into_diagnostic()
}

fn evaluate_demo(output: PathBuf) -> miette::Result<()> {
    let exe = std::env::current_exe().into_diagnostic()?;

    let mut collector = Command::new(exe);
    collector
        .arg("collect")
        .arg("--session")
        .arg(std::process::id().to_string());

    let mut publisher = Publisher::builder()
        .with_collector(collector)
        .bind()
        .into_diagnostic()?;

    publisher.wait_for_subscriber().into_diagnostic()?;

    publisher
        .start(&output.display().to_string())
        .into_diagnostic()?;

    publisher.on_call_observed("Widget", "render");
    publisher.on_return_observed();

    publisher.stop().into_diagnostic()?;

    // let the collector drain the stop event before it is reaped
    std::thread::sleep(std::time::Duration::from_millis(200));

    Ok(())
}
