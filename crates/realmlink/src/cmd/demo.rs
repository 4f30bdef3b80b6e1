use std::sync::Arc;
use std::time::Duration;

use realmlink_codec::Value;
use realmlink_frame::Multiplexed;
use realmlink_peer::{connect, ConnectionConfig};
use realmlink_transport::{MemoryRealm, Transport};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::info;

use crate::cmd::exports::builtin_exports;
use crate::cmd::{parse_duration, runtime, DemoArgs};
use crate::exit::{call_error, peer_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{describe, print_json, OutputFormat};

const MATH_CHANNEL: &str = "math";
const GREETING_CHANNEL: &str = "greeting";

#[derive(Serialize)]
struct DemoOutput {
    channels: [&'static str; 2],
    greeting: Json,
    function: &'static str,
    args: [f64; 2],
    result: Json,
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let out = runtime()?.block_on(demo(args.a, args.b, timeout))?;

    match format {
        OutputFormat::Json => print_json(&out, false),
        OutputFormat::Pretty => print_json(&out, true),
        OutputFormat::Table => {
            println!("Demo:");
            println!("  Channels: {}", out.channels.join(", "));
            println!("  Greeting: {}", out.greeting);
            println!("  Call:     add({}, {})", out.args[0], out.args[1]);
            println!("  Result:   {}", out.result);
        }
    }
    Ok(SUCCESS)
}

fn channel(realm: &Arc<MemoryRealm>, tag: &str) -> Arc<dyn Transport> {
    Arc::new(Multiplexed::new(realm.clone(), tag))
}

/// Two realms, two channels over one realm pair: `server` exports the
/// built-ins on one channel and a greeting on the other.
async fn demo(a: f64, b: f64, timeout: Duration) -> CliResult<DemoOutput> {
    let (server, client) = MemoryRealm::pair("server", "client");

    let handshakes = async {
        tokio::join!(
            connect(
                ConnectionConfig::over(channel(&server, MATH_CHANNEL), "client")
                    .with_exports(builtin_exports())
            ),
            connect(ConnectionConfig::over(channel(&client, MATH_CHANNEL), "server")),
            connect(
                ConnectionConfig::over(channel(&server, GREETING_CHANNEL), "client")
                    .with_exports(Value::from("hello from the server realm"))
            ),
            connect(ConnectionConfig::over(channel(&client, GREETING_CHANNEL), "server")),
        )
    };
    let (math_server, math_client, greeting_server, greeting_client) =
        tokio::time::timeout(timeout, handshakes)
            .await
            .map_err(|_| CliError::new(TIMEOUT, format!("handshake timed out after {timeout:?}")))?;

    let _math_server = math_server.map_err(|err| peer_error("math server", err))?;
    let math_client = math_client.map_err(|err| peer_error("math client", err))?;
    let _greeting_server = greeting_server.map_err(|err| peer_error("greeting server", err))?;
    let greeting_client = greeting_client.map_err(|err| peer_error("greeting client", err))?;
    info!(channels = 2, "realms connected");

    let add = math_client
        .imports()
        .as_record()
        .and_then(|exports| exports.get("add"))
        .and_then(Value::as_function)
        .cloned()
        .ok_or_else(|| CliError::new(FAILURE, "server realm exports no add function"))?;

    let result = tokio::time::timeout(timeout, add.call(vec![Value::from(a), Value::from(b)]))
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("call timed out after {timeout:?}")))?
        .map_err(|err| call_error("add failed", err))?;

    Ok(DemoOutput {
        channels: [MATH_CHANNEL, GREETING_CHANNEL],
        greeting: describe(greeting_client.imports()),
        function: "add",
        args: [a, b],
        result: describe(&result),
    })
}
