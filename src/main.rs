use std::env;

use anyhow::{Context, Result};
use clap::Parser;
use i18n_codemod::{run, CodegenStyle, Config};
use regex::Regex;

/// Rewrites `translations.*` property accesses into `t()` calls and adds the
/// matching i18next import, reporting each change as a diff.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Log informational statements; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Ignore files whose path matches this pattern (repeatable)
    #[arg(short, long, value_name = "PATTERN", default_value = "/app/web/test")]
    ignore: Vec<String>,

    /// Pattern selecting candidate files
    #[arg(value_name = "PATTERN", default_value = r"/app/web/.*\.jsx?$")]
    pattern: String,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("i18n_codemod={level}").parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let match_pattern = Regex::new(&cli.pattern)
        .with_context(|| format!("invalid match pattern: {}", cli.pattern))?;
    let ignore_patterns = cli
        .ignore
        .iter()
        .map(|p| Regex::new(p).with_context(|| format!("invalid ignore pattern: {p}")))
        .collect::<Result<Vec<_>>>()?;

    let config = Config {
        root: env::current_dir().context("failed to resolve working directory")?,
        match_pattern,
        ignore_patterns,
        style: CodegenStyle::default(),
    };
    run(config).await?;
    Ok(())
}
