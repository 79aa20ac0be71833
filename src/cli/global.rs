use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::Level;

use crate::cli::commands::{notify::NotifyArgs, report::ReportArgs};

#[deny(missing_docs)]
#[derive(Parser, Debug)]
#[command(version = env!("CARGO_PKG_VERSION"))]
/// iamwatch - Warn IAM users before their console passwords expire
pub struct CommandLineArgs {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Global arguments that apply to all subcommands
    #[command(flatten)]
    pub global_args: GlobalArgs,
}

impl CommandLineArgs {
    /// Parse command-line arguments.
    ///
    /// `--quiet` wins over any `-v` flags.
    pub fn parse_args() -> Self {
        let mut args = CommandLineArgs::parse();
        if args.global_args.quiet {
            args.global_args.verbose = 0;
        }
        args
    }
}

/// Top-level subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Email every IAM user whose password is close to its maximum age
    Notify(NotifyArgs),

    /// Show password age for every IAM user without notifying anyone
    Report(ReportArgs),
}

/// Top-level global CLI arguments
#[derive(Args, Debug, Clone, Default)]
#[command(next_help_heading = "Global Options")]
pub struct GlobalArgs {
    /// Enable verbose output (up to 3 times for more detail)
    #[arg(global = true, long = "verbose", short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error messages
    #[arg(global = true, long, short)]
    pub quiet: bool,
}

impl GlobalArgs {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::INFO,  // Default level if no `-v` is provided
                1 => Level::DEBUG, // `-v`
                _ => Level::TRACE, // `-vv` or more
            }
        }
    }

    /// `-vvv` also enables logs from the AWS SDK crates.
    pub fn all_targets(&self) -> bool {
        !self.quiet && self.verbose > 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_notify_flags() {
        let args = CommandLineArgs::try_parse_from([
            "iamwatch",
            "-vv",
            "notify",
            "--dry-run",
            "--sender",
            "ops@example.com",
            "--max-age-days",
            "60",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.global_args.log_level(), Level::TRACE);
        let Command::Notify(notify) = args.command else { panic!("expected notify") };
        assert!(notify.dry_run);
        assert_eq!(notify.sender.as_deref(), Some("ops@example.com"));
        assert_eq!(notify.policy.max_age_days, Some(60));
    }

    #[test]
    fn quiet_lowers_level() {
        let args = GlobalArgs { verbose: 3, quiet: true };
        assert_eq!(args.log_level(), Level::ERROR);
        assert!(!args.all_targets());
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(CommandLineArgs::try_parse_from(["iamwatch", "report", "--format", "xml"]).is_err());
    }
}
