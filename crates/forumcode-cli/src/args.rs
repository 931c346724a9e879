use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "forumcode-cli", version, about = "Render forum post markup")]
pub struct Cli {
    /// TOML file with rendering options.
    #[arg(long, env = "FORUMCODE_CONFIG", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a post to an HTML fragment.
    Render(RenderArgs),
    /// Print a plain-text preview of a post.
    Excerpt(ExcerptArgs),
    /// Check a post for markup problems without rendering it.
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Input file; stdin when omitted.
    pub input: Option<PathBuf>,

    /// Run the output through the HTML whitelist sanitizer.
    #[arg(long)]
    pub sanitized: bool,

    #[arg(long, value_enum, value_name = "FORMAT")]
    pub diagnostics: Option<DiagnosticsFormat>,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Maps a post id to its position in the topic, as `ID=NUMBER`.
    #[arg(long = "post-number", value_name = "ID=NUMBER", value_parser = parse_post_number)]
    pub post_numbers: Vec<(String, u64)>,

    #[arg(long)]
    pub forum_base: Option<String>,

    #[arg(long)]
    pub profile_route: Option<String>,

    /// Open external links in the current tab.
    #[arg(long)]
    pub same_tab: bool,
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    #[arg(long, requires = "subcategory")]
    pub category: Option<String>,

    #[arg(long, requires = "topic")]
    pub subcategory: Option<String>,

    #[arg(long, requires = "subcategory")]
    pub topic: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExcerptArgs {
    pub input: Option<PathBuf>,

    /// Cut the preview after this many characters.
    #[arg(long, value_name = "N")]
    pub max_chars: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub input: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DiagnosticsFormat::Pretty, value_name = "FORMAT")]
    pub diagnostics: DiagnosticsFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticsFormat {
    Json,
    Pretty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn parse_post_number(raw: &str) -> Result<(String, u64), String> {
    let (id, number) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=NUMBER, got `{raw}`"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err("post id must not be empty".to_string());
    }
    let number = number
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid post number `{number}`: {err}"))?;
    Ok((id.to_string(), number))
}
