// Stdio bridge
// Reads newline-delimited requests, writes responses, canonical events, exit
// progress and the exit signal as newline-delimited JSON on one output. Logs
// never go to this output.

use super::wire::{decode_request, encode_line, Notification, Response};
use super::{Transport, TransportError};
use crate::events::{ExitProgress, ExitRequest};
use crate::exit::ExitSignal;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;

/// Why the bridge returned
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BridgeExit {
    /// The host closed its end of the input
    InputClosed,
    /// An exit sequence completed
    ExitRequested(ExitRequest),
    /// The process was asked to shut down (Ctrl+C)
    Shutdown,
}

async fn write_message<W, T>(output: &mut W, message: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let line = encode_line(message)?;
    output
        .write_all(line.as_bytes())
        .await
        .map_err(|e| TransportError::Output(e.to_string()))?;
    output
        .flush()
        .await
        .map_err(|e| TransportError::Output(e.to_string()))
}

/// Serve requests until input closes, exit is requested or `shutdown` resolves.
///
/// Capture is always stopped before returning, and every event published up to
/// that point is written out.
pub async fn run_bridge<R, W, F>(
    transport: Arc<Transport>,
    input: R,
    mut output: W,
    mut progress: broadcast::Receiver<ExitProgress>,
    mut exit_signal: ExitSignal,
    shutdown: F,
) -> Result<BridgeExit, TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let mut events = transport.subscribe();
    let mut lines = input.lines();
    let mut progress_open = true;
    let mut exit_open = true;
    tokio::pin!(shutdown);

    crate::info!("Bridge ready");

    let reason = loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let response = match decode_request(&line) {
                        Ok(request) => transport.handle_request(&request).await,
                        Err(e) => {
                            crate::warn!("Rejecting request line: {}", e);
                            Response::err(Value::Null, &e)
                        }
                    };
                    write_message(&mut output, &response).await?;
                }
                Ok(None) => break BridgeExit::InputClosed,
                Err(e) => {
                    crate::error!("Failed to read input: {}", e);
                    break BridgeExit::InputClosed;
                }
            },
            Some(event) = events.recv() => {
                write_message(&mut output, &Notification::Event(&event)).await?;
            }
            update = progress.recv(), if progress_open => match update {
                Ok(update) => {
                    write_message(&mut output, &Notification::ExitProgress(&update)).await?;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    crate::warn!("Exit progress lagged, skipped {} updates", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => progress_open = false,
            },
            request = exit_signal.wait(), if exit_open => match request {
                Some(request) => break BridgeExit::ExitRequested(request),
                None => exit_open = false,
            },
            _ = &mut shutdown => break BridgeExit::Shutdown,
        }
    };

    crate::info!("Bridge stopping: {:?}", reason);
    if let Err(e) = transport.stop_capture().await {
        crate::error!("Failed to stop capture: {}", e);
    }

    // Stop drained the pump; flush what it published
    while let Some(event) = events.try_recv() {
        write_message(&mut output, &Notification::Event(&event)).await?;
    }
    while let Ok(update) = progress.try_recv() {
        write_message(&mut output, &Notification::ExitProgress(&update)).await?;
    }
    if let BridgeExit::ExitRequested(request) = &reason {
        write_message(&mut output, &Notification::ExitRequested(request)).await?;
    }

    Ok(reason)
}

/// Bridge over the process's stdin and stdout
pub async fn run_stdio_bridge(
    transport: Arc<Transport>,
    progress: broadcast::Receiver<ExitProgress>,
    exit_signal: ExitSignal,
) -> Result<BridgeExit, TransportError> {
    run_bridge(
        transport,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        progress,
        exit_signal,
        crate::shutdown::wait_for_shutdown(),
    )
    .await
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod tests;
