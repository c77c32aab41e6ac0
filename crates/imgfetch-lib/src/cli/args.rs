use clap::{ArgAction, Parser};
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub url: String,
    pub check: bool,
    pub workers: Option<usize>,
    pub config_path: Option<String>,
    pub output_dir: Option<String>,
}

pub struct Args {
    pub command: Command,
    pub log_level: Level,
}

#[derive(Debug, Parser)]
#[command(
    name = "imgfetch",
    version,
    about = "Download all images defined by IMG HTML tags on a given page"
)]
struct Cli {
    #[arg(value_name = "URL", help = "Website URL")]
    url: String,

    #[arg(long = "check", help = "Don't save files to disk")]
    check: bool,

    #[arg(
        short = 'w',
        long = "workers",
        value_name = "N",
        help = "How many workers to use (default: 1)"
    )]
    workers: Option<usize>,

    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Optional config file with download defaults"
    )]
    config: Option<String>,

    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "DIR",
        help = "Directory to save images into (default: current directory)"
    )]
    output_dir: Option<String>,

    #[arg(
        short = 'v',
        long = "verbose",
        help = "Show more logs",
        action = ArgAction::Count
    )]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    fn into_command(self) -> Command {
        Command {
            url: self.url,
            check: self.check,
            workers: self.workers,
            config_path: self.config,
            output_dir: self.output_dir,
        }
    }
}

pub fn parse_args() -> Args {
    let cli = Cli::parse();
    let log_level = cli.log_level();

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy()
                .add_directive("hyper_util=warn".parse().expect("static directive is valid")),
        )
        .init();

    Args {
        command: cli.into_command(),
        log_level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["imgfetch", "http://example.com"]).unwrap();
        assert_eq!(cli.log_level(), Level::INFO);
        assert_eq!(
            cli.into_command(),
            Command {
                url: "http://example.com".to_string(),
                check: false,
                workers: None,
                config_path: None,
                output_dir: None,
            }
        );
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "imgfetch",
            "--check",
            "--workers",
            "4",
            "--verbose",
            "-c",
            "imgfetch.yaml",
            "-o",
            "out",
            "https://example.com/gallery",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), Level::DEBUG);

        let command = cli.into_command();
        assert!(command.check);
        assert_eq!(command.workers, Some(4));
        assert_eq!(command.config_path.as_deref(), Some("imgfetch.yaml"));
        assert_eq!(command.output_dir.as_deref(), Some("out"));
        assert_eq!(command.url, "https://example.com/gallery");
    }

    #[test]
    fn test_repeated_verbose_selects_trace() {
        let cli = Cli::try_parse_from(["imgfetch", "-vv", "http://example.com"]).unwrap();
        assert_eq!(cli.log_level(), Level::TRACE);
    }

    #[test]
    fn test_url_is_required() {
        assert!(Cli::try_parse_from(["imgfetch", "--check"]).is_err());
    }
}
