use clap::{ArgAction, Parser, ValueEnum};
use promptdrop_config::{BackendKind, HttpOverrides, Overrides, QueueOverrides};
use std::path::PathBuf;

/// Feed directories of prompt files to an image generation backend in batches.
#[derive(Debug, Parser)]
#[command(name = "promptdrop", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory containing prompt files [default: prompts]
    #[arg(long, value_name = "PATH")]
    pub prompts_dir: Option<PathBuf>,

    /// Where generated images are written (queue backend only)
    #[arg(long, value_name = "PATH")]
    pub output_dir: Option<PathBuf>,

    /// Prompts per batch, at most 32 [default: 32]
    #[arg(short, long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Leave prompt files in place after processing
    #[arg(long)]
    pub keep_files: bool,

    /// Keep watching the prompts directory for new files
    #[arg(long)]
    pub continuous: bool,

    /// Where prompts are sent [default: dry-run]
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Base URL of the HTTP generation API [default: http://127.0.0.1:7865]
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    DryRun,
    Http,
    Queue,
}
impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::DryRun => Self::DryRun,
            BackendArg::Http => Self::Http,
            BackendArg::Queue => Self::Queue,
        }
    }
}

impl Cli {
    /// Only flags actually given on the command line override configuration.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            prompts_dir: self.prompts_dir.clone(),
            batch_size: self.batch_size,
            delete_after_success: self.keep_files.then_some(false),
            continuous: self.continuous.then_some(true),
            backend: self.backend.map(Into::into),
            http: HttpOverrides {
                api_url: self.api_url.clone(),
            },
            queue: QueueOverrides {
                output_dir: self.output_dir.clone(),
            },
        }
    }

    /// Flags given on the command line that `backend` has no use for.
    pub fn ignored_flags(&self, backend: BackendKind) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if self.output_dir.is_some() && backend != BackendKind::Queue {
            ignored.push("--output-dir");
        }
        if self.api_url.is_some() && backend != BackendKind::Http {
            ignored.push("--api-url");
        }
        ignored
    }

    /// Default log directive when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("promptdrop").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_flags_override_nothing() {
        let overrides = parse(&[]).overrides();
        assert!(overrides.prompts_dir.is_none());
        assert!(overrides.batch_size.is_none());
        assert!(overrides.delete_after_success.is_none());
        assert!(overrides.continuous.is_none());
        assert!(overrides.backend.is_none());
        assert!(overrides.http.api_url.is_none());
        assert!(overrides.queue.output_dir.is_none());
    }

    #[test]
    fn test_flags_become_overrides() {
        let cli = parse(&[
            "--prompts-dir",
            "incoming",
            "--batch-size",
            "8",
            "--keep-files",
            "--continuous",
            "--backend",
            "http",
            "--api-url",
            "http://gpu:7865",
            "--output-dir",
            "outputs",
        ]);
        let overrides = cli.overrides();
        assert_eq!(overrides.prompts_dir, Some(PathBuf::from("incoming")));
        assert_eq!(overrides.batch_size, Some(8));
        assert_eq!(overrides.delete_after_success, Some(false));
        assert_eq!(overrides.continuous, Some(true));
        assert_eq!(overrides.backend, Some(BackendKind::Http));
        assert_eq!(overrides.http.api_url.as_deref(), Some("http://gpu:7865"));
        assert_eq!(overrides.queue.output_dir, Some(PathBuf::from("outputs")));
    }

    #[rstest]
    #[case(&["--output-dir", "out"], BackendKind::DryRun, &["--output-dir"])]
    #[case(&["--output-dir", "out"], BackendKind::Http, &["--output-dir"])]
    #[case(&["--output-dir", "out"], BackendKind::Queue, &[])]
    #[case(&["--api-url", "http://gpu:7865"], BackendKind::DryRun, &["--api-url"])]
    #[case(&["--api-url", "http://gpu:7865"], BackendKind::Http, &[])]
    #[case(&["--output-dir", "out", "--api-url", "http://gpu:7865"], BackendKind::DryRun, &["--output-dir", "--api-url"])]
    #[case(&[], BackendKind::DryRun, &[])]
    fn test_ignored_flags(#[case] args: &[&str], #[case] backend: BackendKind, #[case] expected: &[&str]) {
        assert_eq!(parse(args).ignored_flags(backend), expected);
    }

    #[rstest]
    #[case("dry-run", BackendKind::DryRun)]
    #[case("http", BackendKind::Http)]
    #[case("queue", BackendKind::Queue)]
    fn test_backend_names(#[case] name: &str, #[case] expected: BackendKind) {
        assert_eq!(parse(&["--backend", name]).overrides().backend, Some(expected));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["promptdrop", "--backend", "s3"]).is_err());
    }

    #[rstest]
    #[case(&[], "info")]
    #[case(&["-v"], "debug")]
    #[case(&["-vvv"], "trace")]
    #[case(&["-q"], "warn")]
    fn test_log_level(#[case] args: &[&str], #[case] expected: &str) {
        assert_eq!(parse(args).log_level(), expected);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["promptdrop", "-q", "-v"]).is_err());
    }
}
