//! Line-framed transport over stdin/stdout for local process embedding.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::handlers::{CallContext, McpServer};

/// Serve newline-delimited JSON-RPC on the process's standard streams.
pub async fn run(server: Arc<McpServer>, shutdown: CancellationToken) -> anyhow::Result<()> {
    info!("stdio transport ready");
    serve_lines(server, tokio::io::stdin(), tokio::io::stdout(), shutdown).await
}

/// Read one request per line from `reader` and write one response per line to `writer`.
///
/// Every request runs on its own task; a single writer task owns `writer`, so
/// frames never interleave. On end of input the in-flight requests are allowed
/// to finish before returning. `shutdown` cancels them instead.
pub async fn serve_lines<R, W>(
    server: Arc<McpServer>,
    reader: R,
    writer: W,
    shutdown: CancellationToken,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Value>();
    let writer_task = tokio::spawn(write_frames(writer, out_rx));
    let tracker = TaskTracker::new();

    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let server = server.clone();
        let out = out_tx.clone();
        let ctx = CallContext::new(shutdown.child_token()).with_notifier(out_tx.clone());
        tracker.spawn(async move {
            if let Some(response) = server.handle_text(&line, &ctx).await {
                let _ = out.send(response.to_value());
            }
        });
    }

    tracker.close();
    tracker.wait().await;
    drop(out_tx);
    writer_task.await??;
    Ok(())
}

async fn write_frames<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let mut line = frame.to_string();
        line.push('\n');
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("Failed to write response frame: {e}");
            return Err(e);
        }
        writer.flush().await?;
    }
    Ok(())
}
