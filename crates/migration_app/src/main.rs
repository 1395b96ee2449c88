mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use migration_logging::migration_info;

use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "site-migrate", version)]
#[command(about = "Moves a legacy WordPress blog into the static site")]
struct Cli {
    /// RON configuration file [default: migration.ron when present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site root, overriding the configured one
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log debug messages
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.verbose);

    let config = config::load_config(cli.config.as_deref(), cli.root)?;
    let started = Local::now();
    migration_info!(
        "Running {} on {}",
        cli.command.name(),
        config.site_root.display()
    );

    commands::run(cli.command, &config)?;

    let elapsed = Local::now() - started;
    migration_info!("Done in {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn single_page_flags_parse() {
        let cli = Cli::try_parse_from([
            "site-migrate",
            "single-page",
            "--prune-articles",
            "--root",
            "site",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.root, Some(PathBuf::from("site")));
        assert!(matches!(
            cli.command,
            Command::SinglePage {
                refresh: false,
                prune_articles: true
            }
        ));
    }

    #[test]
    fn cases_takes_an_optional_source() {
        let cli = Cli::try_parse_from(["site-migrate", "cases", "--source", "docs/cases.md"]).unwrap();

        match cli.command {
            Command::Cases { source } => assert_eq!(source, Some(PathBuf::from("docs/cases.md"))),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["site-migrate", "publish"]).is_err());
    }
}
