//! Unix socket shell around the dispatcher.
//!
//! Frames are length-delimited. A request frame is an 8-byte big-endian
//! request id followed by a command payload; the response frame carries the
//! same id followed by the serialized [`IpcResult`](conduit_core::IpcResult).
//! Requests on one connection are executed concurrently and may be answered
//! out of order.

use crate::dispatch::Dispatcher;
use bytes::Bytes;
use conduit_core::IpcResult;
use conduit_core::protocol::{REQUEST_ID_LEN, decode_frame, encode_frame};
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

pub struct IpcServer {
    listener: UnixListener,
    socket_path: PathBuf,
    max_frame_bytes: usize,
    dispatcher: Dispatcher,
}

impl IpcServer {
    /// Bind the configured socket, replacing a stale socket file.
    pub fn bind(dispatcher: Dispatcher) -> io::Result<Self> {
        let server_config = &dispatcher.state().config.server;
        let socket_path = server_config.socket_path.clone();
        let max_frame_bytes = server_config.max_frame_bytes;

        if let Some(parent) = socket_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        remove_stale_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path).map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("failed to bind socket {}: {e}", socket_path.display()),
            )
        })?;
        info!(socket = %socket_path.display(), "IPC server listening");

        Ok(Self {
            listener,
            socket_path,
            max_frame_bytes,
            dispatcher,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until `shutdown` resolves, then remove the socket.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        debug!("accepted connection");
                        tokio::spawn(handle_connection(
                            stream,
                            self.dispatcher.clone(),
                            self.max_frame_bytes,
                        ));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
            }
        }

        info!(socket = %self.socket_path.display(), "IPC server shutting down");
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn remove_stale_socket(path: &Path) -> io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if !metadata.file_type().is_socket() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("path {} exists but is not a socket", path.display()),
            ));
        }
    }

    std::fs::remove_file(path)?;
    debug!(path = %path.display(), "removed stale socket file");
    Ok(())
}

async fn handle_connection(stream: UnixStream, dispatcher: Dispatcher, max_frame_bytes: usize) {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_bytes)
        .new_codec();
    let (mut sink, mut frames) = Framed::new(stream, codec).split();

    // Single writer; request tasks hand finished responses over the channel.
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(frame).await {
                debug!(error = %e, "connection closed while writing response");
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            // The writer only stops when the peer can no longer be written to.
            _ = tx.closed() => {
                debug!("response writer stopped, closing connection");
                break;
            }
            frame = frames.next() => match frame {
                Some(Ok(frame)) => frame.freeze(),
                Some(Err(e)) => {
                    warn!(error = %e, "failed to read request frame");
                    break;
                }
                None => break,
            },
        };

        let dispatcher = dispatcher.clone();
        let tx = tx.clone();
        let request = tokio::spawn(async move {
            let (request_id, payload) = match decode_frame(&frame) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(error = %e, "dropping malformed request frame");
                    return;
                }
            };

            let result = dispatcher.execute(payload).await;
            if let Some(response) = response_frame(request_id, &result, max_frame_bytes) {
                // The receiver is gone only when the connection is closing.
                let _ = tx.send(response);
            }
        });
        tokio::spawn(abort_on_panic(request));
    }

    drop(tx);
    let _ = writer.await;
    debug!("connection closed");
}

/// Encode the response frame for `result`.
///
/// A result too large for one frame is replaced by an `execution_error`
/// envelope so the request still gets an answer.
fn response_frame(request_id: u64, result: &IpcResult, max_frame_bytes: usize) -> Option<Bytes> {
    let body = match result.to_bytes() {
        Ok(body) => body,
        Err(e) => {
            error!(request_id, error = %e, "failed to serialize response");
            return None;
        }
    };
    if REQUEST_ID_LEN + body.len() <= max_frame_bytes {
        return Some(encode_frame(request_id, &body));
    }

    warn!(
        request_id,
        bytes = body.len(),
        max_frame_bytes,
        "response exceeds frame limit"
    );
    let replacement = IpcResult::execution_error(format!(
        "response of {} bytes exceeds the {max_frame_bytes} byte frame limit",
        body.len()
    ));
    match replacement.to_bytes() {
        Ok(body) => Some(encode_frame(request_id, &body)),
        Err(e) => {
            error!(request_id, error = %e, "failed to serialize response");
            None
        }
    }
}

/// A panicked request means the dispatcher hit a contract violation.
async fn abort_on_panic(request: JoinHandle<()>) {
    if let Err(e) = request.await
        && e.is_panic()
    {
        error!(error = %e, "request task panicked, aborting");
        std::process::abort();
    }
}
