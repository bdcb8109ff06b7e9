use clap::{Args, Parser, Subcommand};
use runwatch_core::JobKind;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "runwatch",
    version,
    about = "Test-result status aggregation and alerting"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// SQLite database holding runs, statuses and summaries
    #[arg(long, global = true, env = "RUNWATCH_DB", default_value = ".runwatch/runwatch.db")]
    pub db: PathBuf,

    /// YAML engine config; defaults apply when the file is missing
    #[arg(long, global = true, env = "RUNWATCH_CONFIG", default_value = "runwatch.yaml")]
    pub config: PathBuf,

    /// JSONL file outgoing notifications are appended to
    #[arg(long, global = true, env = "RUNWATCH_SPOOL", default_value = ".runwatch/outbox.jsonl")]
    pub spool: PathBuf,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store an uploaded run (JSON file, or `-` for stdin)
    Ingest(IngestArgs),
    /// Manage failure acknowledgments
    Ack(AckArgs),
    /// Subscribe an address to a test's notifications
    Subscribe(SubscribeArgs),
    /// Run one task for a key
    Task(TaskArgs),
    /// Run the task for every key that currently has work
    Fanout(FanoutArgs),
    /// Serve the task and cron endpoints over HTTP
    Serve(ServeArgs),
    Version,
}

#[derive(Parser, Debug)]
pub struct IngestArgs {
    pub input: PathBuf,

    /// Run the status, coverage and profiling tasks for the new run right away
    #[arg(long)]
    pub process: bool,
}

#[derive(Parser, Debug)]
pub struct AckArgs {
    #[command(subcommand)]
    pub cmd: AckSub,
}

#[derive(Subcommand, Debug)]
pub enum AckSub {
    Add {
        #[arg(long)]
        test: String,
        #[arg(long, default_value = "")]
        user: String,
        /// Restrict to these build flavors (repeatable)
        #[arg(long = "device")]
        devices: Vec<String>,
        /// Restrict to these branches (repeatable)
        #[arg(long = "branch")]
        branches: Vec<String>,
        /// Restrict to these test cases (repeatable)
        #[arg(long = "case")]
        cases: Vec<String>,
        #[arg(long)]
        note: Option<String>,
    },
    List {
        #[arg(long)]
        test: String,
    },
    Remove {
        id: i64,
    },
}

#[derive(Parser, Debug)]
pub struct SubscribeArgs {
    pub test: String,
    pub email: String,
}

#[derive(Parser, Debug)]
pub struct TaskArgs {
    pub job: JobKind,
    pub key: String,

    /// Evaluate as of this time (microseconds since the epoch) instead of now
    #[arg(long)]
    pub now_us: Option<i64>,
}

#[derive(Parser, Debug)]
pub struct FanoutArgs {
    pub job: JobKind,

    /// Only print the keys that would be processed
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub now_us: Option<i64>,
}

#[derive(Parser, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn task_parses_job_kind() {
        let cli = Cli::try_parse_from(["runwatch", "task", "status", "test_status:Vts"]).unwrap();
        match cli.cmd {
            Command::Task(args) => {
                assert_eq!(args.job, JobKind::Status);
                assert_eq!(args.key, "test_status:Vts");
            }
            _ => panic!("expected task command"),
        }
        assert!(Cli::try_parse_from(["runwatch", "task", "cleanup", "x"]).is_err());
    }
}
