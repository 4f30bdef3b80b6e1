use std::sync::Arc;
use std::time::Duration;

use realmlink_frame::{StreamTransport, CLOSE};
use realmlink_peer::{connect, ConnectionConfig};
use realmlink_transport::{EventKind, Listener, MessageEvent, Transport};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::cmd::exports::builtin_exports;
use crate::cmd::{parse_duration, runtime, ServeArgs};
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let handshake_timeout = parse_duration(&args.handshake_timeout)?;
    runtime()?.block_on(serve(args, handshake_timeout))
}

async fn serve(args: ServeArgs, handshake_timeout: Duration) -> CliResult<i32> {
    let listener = UnixListener::bind(&args.path)
        .map_err(|err| io_error(&format!("failed binding {}", args.path.display()), err))?;
    info!(path = %args.path.display(), "serving exports");

    let mut clients = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|err| io_error("accept failed", err))?;
                clients += 1;
                tokio::spawn(serve_client(stream, format!("client-{clients}"), handshake_timeout));
            }
        }
    }

    let _ = std::fs::remove_file(&args.path);
    Ok(SUCCESS)
}

/// Hold one client's connection until its stream ends.
async fn serve_client(stream: UnixStream, origin: String, handshake_timeout: Duration) {
    let transport = Arc::new(StreamTransport::spawn(stream, origin.clone()));
    let closed = Arc::new(Notify::new());
    let notify = closed.clone();
    let on_close: Listener = Arc::new(move |_: &MessageEvent| notify.notify_one());
    transport.subscribe(EventKind::Other(CLOSE.to_string()), on_close);

    let config = ConnectionConfig::over(transport.clone(), origin.clone())
        .with_exports(builtin_exports())
        .with_handshake_timeout(handshake_timeout);
    let connection = match connect(config).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!(peer = %origin, error = %err, "handshake failed");
            return;
        }
    };
    info!(peer = %origin, "client connected");

    let mut errors = connection.errors();
    loop {
        tokio::select! {
            _ = closed.notified() => break,
            error = errors.recv() => match error {
                Ok(err) => warn!(peer = %origin, error = %err, "connection error"),
                Err(RecvError::Lagged(skipped)) => warn!(peer = %origin, skipped, "connection errors dropped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    connection.close();
    transport.shutdown();
    info!(peer = %origin, "client disconnected");
}
