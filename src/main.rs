//! Purpose: `okb-send` CLI entry point.
//! Role: Binary crate root; parses args, resolves and loads the C API library, sends one event.
//! Invariants: Success emits exactly one JSON line on stdout.
//! Invariants: Errors go to stderr: text on a TTY or with `--color always`, JSON otherwise.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing::info;
use tracing_subscriber::EnvFilter;

use okb_send::api::{
    Client, ENV_OVERRIDE, Encoding, Error, ErrorKind, Event, Locator, ProcessEnv, system_lookup,
    to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint(clap_error_hint(&err)),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing(cli.verbose);
    let color_mode = cli.color;
    execute(cli).map_err(|err| (err, color_mode))
}

fn execute(cli: Cli) -> Result<RunOutcome, Error> {
    let env = ProcessEnv;
    let registry = system_lookup();
    let resolved = Locator::new(&env, &registry)
        .with_explicit(cli.dll)
        .resolve()?;

    if cli.print_path {
        emit_json(json!(resolved));
        return Ok(RunOutcome::ok());
    }

    let event = Event::from_args(cli.name, cli.value);
    let client = Client::open(&resolved.path, cli.encoding)?;
    client.send(&event);
    info!(
        library = %client.library_path().display(),
        name = %event.name,
        "event sent"
    );
    drop(client);

    emit_json(json!({
        "sent": event,
        "library": resolved,
        "encoding": cli.encoding,
    }));
    Ok(RunOutcome::ok())
}

fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "okb-send",
    version,
    about = "Send one event to OpenKneeboard through its C API library",
    help_template = r#"{about-with-newline}
USAGE
  {usage}

ARGUMENTS
{positionals}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    after_help = r#"EXAMPLES
  $ okb-send                                    # RemoteUserAction NEXT_TAB
  $ okb-send RemoteUserAction PREVIOUS_PAGE
  $ okb-send SetTabByName '{"Name":"Radio Log"}'
  $ okb-send --print-path

LIBRARY LOOKUP
  1. --dll PATH
  2. OPENKNEEBOARD_CAPI_DLL environment variable
  3. HKCU\Software\Fred Emmott\OpenKneeboard\InstallationBinPath (Windows)
  4. <Program Files>\OpenKneeboard\bin (Windows)"#
)]
struct Cli {
    #[arg(help = "Event name (default: RemoteUserAction)")]
    name: Option<String>,
    #[arg(
        help = "Event value (default: empty, or NEXT_TAB when NAME is omitted)",
        requires = "name",
        allow_hyphen_values = true
    )]
    value: Option<String>,
    #[arg(
        long,
        value_name = "PATH",
        help = "C API library path; overrides every other lookup",
        value_hint = ValueHint::FilePath
    )]
    dll: Option<PathBuf>,
    #[arg(
        long,
        default_value = "wide",
        value_enum,
        help = "Which export to call: wide|utf8"
    )]
    encoding: Encoding,
    #[arg(long, help = "Print the resolved library path as JSON and exit")]
    print_path: bool,
    #[arg(short, long, help = "Log each lookup step to stderr")]
    verbose: bool,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never (always also forces text errors)"
    )]
    color: ColorMode,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn emit_json(value: Value) {
    let json = serde_json::to_string(&value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty || matches!(color_mode, ColorMode::Always) {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "C API library not found".to_string(),
        ErrorKind::Load => "failed to load C API library".to_string(),
        ErrorKind::Symbol => "C API export not found".to_string(),
        ErrorKind::Environment => format!("environment is incomplete; set {ENV_OVERRIDE}"),
        ErrorKind::Io => "i/o error".to_string(),
        ErrorKind::Internal => "internal error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);
    match usage {
        Some(usage) => format!("Usage: {usage}. Try `okb-send --help`."),
        None => "Try `okb-send --help`.".to_string(),
    }
}
