use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use forumcode_core::{Diagnostic, excerpt, transform, transform_sanitized, validate};
use tracing::debug;

mod args;
mod error;
mod settings;
mod telemetry;

use args::{Cli, Command, DiagnosticsFormat, ExcerptArgs, RenderArgs, ValidateArgs};
use error::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    telemetry::init(cli.log_level.into())?;

    match cli.command {
        Command::Render(args) => render(cli.config.as_deref(), args),
        Command::Excerpt(args) => print_excerpt(args),
        Command::Validate(args) => check(args),
    }
}

fn render(config_file: Option<&Path>, args: RenderArgs) -> Result<ExitCode, CliError> {
    let options = settings::load_options(config_file)?;
    let context = settings::render_context(options, &args);
    let source = read_input(args.input.as_deref())?;

    let out = if args.sanitized {
        transform_sanitized(&source, &context)
    } else {
        transform(&source, &context)
    };
    debug!(
        embeds = out.embeds.len(),
        quotes = out.quotes.len(),
        diagnostics = out.diagnostics.len(),
        "rendered post"
    );

    if let Some(format) = args.diagnostics {
        let report = format_diagnostics(&out.diagnostics, format)?;
        if !report.is_empty() {
            eprintln!("{report}");
        }
    }

    write_stdout(&out.html)?;
    Ok(exit_code(&out.diagnostics))
}

fn print_excerpt(args: ExcerptArgs) -> Result<ExitCode, CliError> {
    let source = read_input(args.input.as_deref())?;
    write_stdout(&format!("{}\n", excerpt(&source, args.max_chars)))?;
    Ok(ExitCode::SUCCESS)
}

fn check(args: ValidateArgs) -> Result<ExitCode, CliError> {
    let source = read_input(args.input.as_deref())?;
    let diagnostics = validate(&source);
    let report = format_diagnostics(&diagnostics, args.diagnostics)?;
    if !report.is_empty() {
        write_stdout(&format!("{report}\n"))?;
    }
    Ok(exit_code(&diagnostics))
}

fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|source| CliError::ReadInput {
            path: path.to_path_buf(),
            source,
        }),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(CliError::ReadStdin)?;
            Ok(buffer)
        }
    }
}

fn write_stdout(text: &str) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(CliError::WriteOutput)
}

fn exit_code(diagnostics: &[Diagnostic]) -> ExitCode {
    if diagnostics.iter().any(Diagnostic::is_error) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Pretty output is one `line:col:severity CODE message` line per diagnostic.
fn format_diagnostics(
    diagnostics: &[Diagnostic],
    format: DiagnosticsFormat,
) -> Result<String, CliError> {
    match format {
        DiagnosticsFormat::Json => Ok(serde_json::to_string_pretty(diagnostics)?),
        DiagnosticsFormat::Pretty => Ok(diagnostics
            .iter()
            .map(diagnostic_to_pretty)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn diagnostic_to_pretty(diagnostic: &Diagnostic) -> String {
    format!(
        "{}:{}:{} {} {}",
        diagnostic.range.start.line + 1,
        diagnostic.range.start.character + 1,
        diagnostic.severity.as_str(),
        diagnostic.code,
        diagnostic.message
    )
}
