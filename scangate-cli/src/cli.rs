use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use scangate::config::DEFAULT_API_URL;
use scangate::endpoint::Endpoint;

/// Trigger Apiiro security scans and gate CI on their results
#[derive(Parser)]
#[command(name = "scangate", version)]
pub struct Cli {
    /// API token (sent as a bearer credential)
    #[arg(long, env = "APIIRO_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Base URL of the scan API
    #[arg(long, env = "APIIRO_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Timeout for each HTTP request
    #[arg(
        long,
        env = "SCANGATE_REQUEST_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration,
        global = true
    )]
    pub timeout: Duration,

    /// Print results as JSON and log as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start a build scan for a commit and publish its build id
    TriggerBuild(TriggerBuildArgs),
    /// Start a diff scan between two branches and publish its job id
    TriggerDiff(TriggerDiffArgs),
    /// Wait for a build scan to finish and exit non-zero unless it passed
    BuildResults(BuildResultsArgs),
    /// Wait for a diff scan to finish and exit non-zero if it blocks
    DiffResults(DiffResultsArgs),
}

impl Command {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Command::TriggerBuild(_) | Command::BuildResults(_) => Endpoint::BuildScan,
            Command::TriggerDiff(_) | Command::DiffResults(_) => Endpoint::DiffScan,
        }
    }

    /// Scan id passed to a results command, if any.
    pub fn scan_id(&self) -> Option<&str> {
        let id = match self {
            Command::BuildResults(args) => args.build_id.as_deref(),
            Command::DiffResults(args) => args.job_id.as_deref(),
            Command::TriggerBuild(_) | Command::TriggerDiff(_) => None,
        };
        id.map(str::trim).filter(|id| !id.is_empty())
    }
}

#[derive(Args)]
pub struct TriggerBuildArgs {
    /// Commit to scan
    #[arg(long, env = "GITHUB_SHA")]
    pub commit_sha: Option<String>,

    /// Repository URL as known to the scan API
    #[arg(long, env = "GITHUB_REPOSITORY_URL")]
    pub repository_url: Option<String>,

    #[command(flatten)]
    pub output: CiOutputArgs,
}

#[derive(Args)]
pub struct TriggerDiffArgs {
    /// Repository URL as known to the scan API
    #[arg(long, env = "GITHUB_REPOSITORY_URL")]
    pub repository_url: Option<String>,

    /// Candidate branch
    #[arg(long, env = "CURRENT_BRANCH")]
    pub current_branch: Option<String>,

    /// Baseline branch
    #[arg(long, env = "DEFAULT_BRANCH")]
    pub default_branch: Option<String>,

    #[command(flatten)]
    pub output: CiOutputArgs,
}

#[derive(Args)]
pub struct CiOutputArgs {
    /// File the triggered id is appended to as key=value
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildResultsArgs {
    /// Build id returned by trigger-build
    #[arg(long, env = "BUILD_ID")]
    pub build_id: Option<String>,

    #[command(flatten)]
    pub poll: PollArgs,
}

#[derive(Args)]
pub struct DiffResultsArgs {
    /// Job id returned by trigger-diff
    #[arg(long, env = "JOB_ID")]
    pub job_id: Option<String>,

    #[command(flatten)]
    pub poll: PollArgs,
}

#[derive(Args)]
pub struct PollArgs {
    /// Delay between status checks
    #[arg(
        long,
        env = "SCANGATE_POLL_INTERVAL",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,

    /// Total time to wait for the scan to finish
    #[arg(
        long,
        env = "SCANGATE_MAX_WAIT",
        default_value = "15m",
        value_parser = humantime::parse_duration
    )]
    pub max_wait: Duration,

    /// Keep polling after connection failures instead of aborting
    #[arg(long)]
    pub retry_transport_errors: bool,

    /// Where to save the raw result payload [default: build_scan_results.json or diff_scan_results.json]
    #[arg(long)]
    pub artifact: Option<PathBuf>,
}
