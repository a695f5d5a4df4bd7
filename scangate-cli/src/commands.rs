use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::warn;

use scangate::ScanGate;
use scangate::artifact::{CiOutput, JsonFileSink};
use scangate::config::{ClientConfig, PollSettings, require};
use scangate::endpoint::Endpoint;
use scangate::output::{ErrorReport, OutputFormatter, ScanReport};

use crate::cli::{Cli, Command, PollArgs};

/// Runs the selected subcommand. `Err` means nothing has been written to stdout yet.
pub async fn run(cli: &Cli, out: &dyn OutputFormatter, stdout: &mut dyn Write) -> Result<ExitCode> {
    let token = require(cli.token.clone(), "APIIRO_TOKEN")?;

    match &cli.command {
        Command::TriggerBuild(args) => {
            let commit_sha = require(args.commit_sha.clone(), "GITHUB_SHA")?;
            let repository_url = require(args.repository_url.clone(), "GITHUB_REPOSITORY_URL")?;
            let gate = connect(cli, token)?;

            let id = gate.trigger_build_scan(&commit_sha, &repository_url).await?;
            publish(out, stdout, Endpoint::BuildScan, &id, &args.output.github_output)
        }
        Command::TriggerDiff(args) => {
            let repository_url = require(args.repository_url.clone(), "GITHUB_REPOSITORY_URL")?;
            let current_branch = require(args.current_branch.clone(), "CURRENT_BRANCH")?;
            let default_branch = require(args.default_branch.clone(), "DEFAULT_BRANCH")?;
            let gate = connect(cli, token)?;

            let id = gate
                .trigger_diff_scan(&repository_url, &current_branch, &default_branch)
                .await?;
            publish(out, stdout, Endpoint::DiffScan, &id, &args.output.github_output)
        }
        Command::BuildResults(args) => {
            let id = require(args.build_id.clone(), "BUILD_ID")?;
            await_results(cli, token, Endpoint::BuildScan, &id, &args.poll, out, stdout).await
        }
        Command::DiffResults(args) => {
            let id = require(args.job_id.clone(), "JOB_ID")?;
            await_results(cli, token, Endpoint::DiffScan, &id, &args.poll, out, stdout).await
        }
    }
}

fn connect(cli: &Cli, token: String) -> Result<ScanGate> {
    let config = ClientConfig::new(&cli.api_url, token).request_timeout(cli.timeout);
    ScanGate::new(&config).context("failed to build HTTP client")
}

fn publish(
    out: &dyn OutputFormatter,
    stdout: &mut dyn Write,
    endpoint: Endpoint,
    id: &str,
    github_output: &Option<PathBuf>,
) -> Result<ExitCode> {
    if let Err(e) = CiOutput::new(github_output.clone()).publish(endpoint.output_key(), id) {
        let reason = format!("{e:#}");
        let error = ErrorReport::new(&reason).scan(Some(endpoint)).id(Some(id));
        out.write_error(&error, stdout)?;
        return Ok(ExitCode::FAILURE);
    }
    out.write_triggered(endpoint, id, stdout)?;
    Ok(ExitCode::SUCCESS)
}

async fn await_results(
    cli: &Cli,
    token: String,
    endpoint: Endpoint,
    id: &str,
    poll: &PollArgs,
    out: &dyn OutputFormatter,
    stdout: &mut dyn Write,
) -> Result<ExitCode> {
    let settings = PollSettings::new(poll.poll_interval, poll.max_wait)?
        .retry_transport_errors(poll.retry_transport_errors);
    if settings.max_attempts() == 0 {
        warn!(
            interval = ?settings.poll_interval(),
            max_wait = ?settings.max_wait(),
            "wait budget is shorter than one poll interval"
        );
    }
    let gate = connect(cli, token)?;
    let artifact = poll
        .artifact
        .clone()
        .unwrap_or_else(|| PathBuf::from(endpoint.default_artifact()));
    let sink = JsonFileSink::new(artifact);

    let result = gate.await_results(endpoint, id, settings, Some(&sink)).await;
    let report = ScanReport::new(endpoint, id, &result);
    out.write_report(&report, stdout)?;

    Ok(if report.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
