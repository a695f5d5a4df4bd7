mod cli;
mod commands;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scangate::output::ErrorReport;

use cli::Cli;

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::builder()
        .with_default_directive(cli.verbose.tracing_level_filter().into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(&args);

    let out = scangate::output::formatter(args.json);
    let mut stdout = std::io::stdout().lock();

    match commands::run(&args, out.as_ref(), &mut stdout).await {
        Ok(code) => code,
        Err(e) => {
            let reason = format!("{e:#}");
            let error = ErrorReport::new(&reason)
                .scan(Some(args.command.endpoint()))
                .id(args.command.scan_id());
            if let Err(write_err) = out.write_error(&error, &mut stdout) {
                eprintln!("error: failed to write to stdout: {write_err}");
            }
            let _ = stdout.flush();
            ExitCode::FAILURE
        }
    }
}
