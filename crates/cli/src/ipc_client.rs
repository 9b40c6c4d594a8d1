use anyhow::{Context, Result};
use conduit_core::protocol::{decode_frame, encode_frame};
use conduit_core::{Command, IpcCommand, IpcResult};
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Largest response frame the client accepts (64 MiB).
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Connection to a running server socket.
pub struct IpcClient {
    socket_path: PathBuf,
    conn: Framed<UnixStream, LengthDelimitedCodec>,
    next_id: u64,
}

impl IpcClient {
    /// Connect, retrying up to `max_retries` times while the socket is missing
    /// or refusing connections. Other errors fail at once.
    pub async fn connect(socket_path: &Path, max_retries: u32) -> Result<Self> {
        let stream = connect_with_retry(socket_path, max_retries).await?;
        Ok(Self::from_stream(socket_path, stream))
    }

    fn from_stream(socket_path: &Path, stream: UnixStream) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_BYTES)
            .new_codec();
        Self {
            socket_path: socket_path.to_path_buf(),
            conn: Framed::new(stream, codec),
            next_id: 1,
        }
    }

    /// Send one command and wait for its result envelope.
    pub async fn request(&mut self, command: Command) -> Result<IpcResult> {
        let request_id = self.next_id;
        self.next_id += 1;

        let payload = command
            .to_payload()
            .context("failed to serialize command")?;
        self.conn
            .send(encode_frame(request_id, &payload))
            .await
            .with_context(|| format!("failed to send to {}", self.socket_path.display()))?;

        loop {
            let frame = self
                .conn
                .next()
                .await
                .ok_or_else(|| anyhow::anyhow!("server closed the connection"))?
                .context("failed to read response frame")?;
            let (id, body) = decode_frame(&frame)?;
            if id != request_id {
                tracing::debug!(id, expected = request_id, "ignoring response for other request");
                continue;
            }
            return IpcResult::from_bytes(body).context("malformed response envelope");
        }
    }

    /// Send a typed command and decode its output.
    ///
    /// A result with `succeeded=false` becomes an error carrying the server's
    /// status and description.
    pub async fn send<C: IpcCommand>(&mut self, command: C) -> Result<C::Output> {
        let result = self.request(command.into()).await?;
        if !result.succeeded() {
            anyhow::bail!(
                "{} failed ({:?}): {}",
                C::NAME,
                result.status(),
                result.error().unwrap_or("no error description")
            );
        }
        result
            .into_output::<C>()
            .map_err(|e| anyhow::anyhow!("invalid {} output: {e}", C::NAME))
    }
}

async fn connect_with_retry(socket_path: &Path, max_retries: u32) -> Result<UnixStream> {
    let mut attempt = 0;

    loop {
        match UnixStream::connect(socket_path).await {
            Ok(stream) => return Ok(stream),
            Err(e) if is_transient(&e) && attempt < max_retries => {
                attempt += 1;
                // 100ms, 200ms, ... 6.4s
                let delay = Duration::from_millis(100 << (attempt - 1).min(6));
                tracing::debug!(
                    socket = %socket_path.display(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "server not reachable, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to connect to {}", socket_path.display()));
            }
        }
    }
}

fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused
    )
}
