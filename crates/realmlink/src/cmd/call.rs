use std::sync::Arc;
use std::time::Duration;

use realmlink_codec::Value;
use realmlink_frame::StreamTransport;
use realmlink_peer::{connect, ConnectionConfig};
use serde::Serialize;
use serde_json::Value as Json;
use tokio::net::UnixStream;

use crate::cmd::{parse_duration, runtime, CallArgs};
use crate::exit::{call_error, io_error, peer_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{describe, print_json, OutputFormat};

const SERVER_ORIGIN: &str = "server";

#[derive(Serialize)]
struct CallOutput {
    function: String,
    args: Vec<Json>,
    result: Json,
}

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let call_args = args
        .args
        .iter()
        .map(|raw| {
            serde_json::from_str::<Json>(raw)
                .map_err(|err| CliError::new(USAGE, format!("argument {raw:?} is not valid JSON: {err}")))
        })
        .collect::<CliResult<Vec<_>>>()?;

    let result = runtime()?.block_on(call(&args, &call_args, timeout))?;
    let out = CallOutput {
        function: args.function,
        args: call_args,
        result: describe(&result),
    };

    match format {
        OutputFormat::Json => print_json(&out, false),
        OutputFormat::Pretty => print_json(&out, true),
        OutputFormat::Table => {
            let rendered: Vec<String> = out.args.iter().map(Json::to_string).collect();
            println!("{}({}) = {}", out.function, rendered.join(", "), out.result);
        }
    }
    Ok(SUCCESS)
}

async fn call(args: &CallArgs, call_args: &[Json], timeout: Duration) -> CliResult<Value> {
    let stream = UnixStream::connect(&args.path)
        .await
        .map_err(|err| io_error(&format!("failed connecting to {}", args.path.display()), err))?;
    let transport = Arc::new(StreamTransport::spawn(stream, SERVER_ORIGIN));
    let connection = connect(
        ConnectionConfig::over(transport, SERVER_ORIGIN).with_handshake_timeout(timeout),
    )
    .await
    .map_err(|err| peer_error("handshake failed", err))?;

    let exports = connection.imports().as_record();
    let function = exports
        .and_then(|exports| exports.get(&args.function))
        .and_then(Value::as_function)
        .cloned()
        .ok_or_else(|| {
            let available = exports
                .map(|exports| {
                    exports
                        .iter()
                        .filter(|(_, value)| value.as_function().is_some())
                        .map(|(name, _)| name.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            CliError::new(
                USAGE,
                format!("no exported function named {:?} (available: {available})", args.function),
            )
        })?;

    let call_args = call_args.iter().map(Value::from_json).collect();
    tokio::time::timeout(timeout, function.call(call_args))
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("call timed out after {timeout:?}")))?
        .map_err(|err| call_error("call failed", err))
}
