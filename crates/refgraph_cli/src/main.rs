//! refgraph CLI: resolve the references of the compilations a
//! `refgraph.toml` manifest describes, or inspect one metadata image.
//!
//! `refgraph resolve` builds every compilation in dependency order and
//! reports each one's bound graph. `refgraph inspect` decodes an image file
//! and prints its identity, modules, references and types.

#![warn(missing_docs)]

mod inspect;
mod pipeline;
mod resolve;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// refgraph: compiler metadata reference resolution.
#[derive(Parser, Debug)]
#[command(name = "refgraph", version, about = "Metadata reference resolver")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `refgraph.toml` manifest or its directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve every compilation of the manifest and report the bindings.
    Resolve(ResolveArgs),
    /// Decode one metadata image and print its contents.
    Inspect(InspectArgs),
}

/// Arguments for `refgraph resolve`.
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Report only this compilation (its dependencies are still built).
    #[arg(short, long)]
    pub compilation: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for `refgraph inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Path to the image file.
    pub image: String,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a manifest file or directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    setup_tracing(cli.verbose, cli.quiet);

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Resolve(ref args) => resolve::run(args, &global),
        Command::Inspect(ref args) => inspect::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Logs to stderr. `RUST_LOG` wins over the flags.
fn setup_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else if quiet {
            EnvFilter::new("error")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_resolve_default() {
        let cli = Cli::parse_from(["refgraph", "resolve"]);
        match cli.command {
            Command::Resolve(ref args) => {
                assert!(args.compilation.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn parse_resolve_with_args() {
        let cli = Cli::parse_from(["refgraph", "resolve", "--compilation", "l3", "--format", "json"]);
        match cli.command {
            Command::Resolve(ref args) => {
                assert_eq!(args.compilation.as_deref(), Some("l3"));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Resolve command"),
        }
    }

    #[test]
    fn parse_inspect() {
        let cli = Cli::parse_from(["refgraph", "inspect", "images/lib.rgm"]);
        match cli.command {
            Command::Inspect(ref args) => {
                assert_eq!(args.image, "images/lib.rgm");
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Inspect command"),
        }
    }

    #[test]
    fn inspect_requires_a_path() {
        assert!(Cli::try_parse_from(["refgraph", "inspect"]).is_err());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["refgraph", "--quiet", "resolve"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
        let cli = Cli::parse_from(["refgraph", "resolve", "--verbose"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from(["refgraph", "--config", "/path/to/refgraph.toml", "resolve"]);
        assert_eq!(cli.config.as_deref(), Some("/path/to/refgraph.toml"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["refgraph", "resolve", "--format", "xml"]).is_err());
    }
}
