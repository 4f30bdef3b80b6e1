use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use tokio::runtime::Runtime;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

#[cfg(unix)]
pub mod call;
pub mod decode;
pub mod demo;
pub mod encode;
pub mod exports;
#[cfg(unix)]
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a JSON document as a dictionary.
    Encode(EncodeArgs),
    /// Decode a dictionary and print the value.
    Decode(DecodeArgs),
    /// Connect two in-memory realms and call a function across them.
    Demo(DemoArgs),
    /// Serve the built-in exports on a Unix socket.
    #[cfg(unix)]
    Serve(ServeArgs),
    /// Connect to a server and call one of its exported functions.
    #[cfg(unix)]
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Demo(args) => demo::run(args, format),
        #[cfg(unix)]
        Command::Serve(args) => serve::run(args),
        #[cfg(unix)]
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// JSON document to encode.
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub json: Option<String>,
    /// Read the JSON document from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Dictionary as JSON, e.g. '{"0":["array",[1]],"1":["number",2]}'.
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub dictionary: Option<String>,
    /// Read the dictionary from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// First operand.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    pub a: f64,
    /// Second operand.
    #[arg(long, default_value_t = 2.0, allow_negative_numbers = true)]
    pub b: f64,
    /// Maximum time for the handshake and the call (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Handshake timeout per client (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub handshake_timeout: String,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Name of the exported function.
    pub function: String,
    /// Arguments, one JSON document each.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Maximum time for the handshake and the call (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))
}

/// Read a positional JSON argument or the file given instead.
pub(crate) fn read_input(inline: Option<&str>, file: Option<&PathBuf>) -> CliResult<serde_json::Value> {
    let text = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => return Err(CliError::new(USAGE, "no input given")),
    };
    serde_json::from_str(&text).map_err(|err| CliError::new(USAGE, format!("input is not valid JSON: {err}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn read_input_rejects_bad_json() {
        let err = read_input(Some("{nope"), None).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert_eq!(read_input(Some("[1]"), None).unwrap(), serde_json::json!([1]));
    }
}
