//! TCP listener exposing an [`IngestionWorker`] over the command protocol

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use super::protocol::{encode_line, salvage_id, Command, RequestFrame, ResponseFrame};
use crate::error::{Error, Result};
use crate::processing::IngestionWorker;

/// Bound worker listener, not yet accepting
pub struct WorkerListener {
    listener: TcpListener,
    worker: Arc<IngestionWorker>,
}

impl WorkerListener {
    /// Bind to `address` (`host:port`, port 0 picks a free one)
    pub async fn bind(address: &str, worker: Arc<IngestionWorker>) -> Result<Self> {
        let listener = TcpListener::bind(address).await.map_err(|e| {
            Error::transport(format!("Failed to bind worker listener on {}: {}", address, e))
        })?;

        Ok(Self { listener, worker })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` resolves, then close open connections
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let addr = self.local_addr()?;
        tracing::info!("Ingestion worker listening on {}", addr);

        let mut connections = JoinSet::new();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Ingestion worker listener on {} stopping", addr);
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Accepted command connection from {}", peer);
                        while connections.try_join_next().is_some() {}

                        let worker = Arc::clone(&self.worker);
                        connections.spawn(async move {
                            if let Err(e) = handle_connection(stream, worker).await {
                                tracing::warn!("Command connection from {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept command connection: {}", e);
                    }
                },
            }
        }

        connections.shutdown().await;
        Ok(())
    }

    /// Serve on a background task, returning a handle that stops it
    pub fn spawn(self) -> Result<ListenerHandle> {
        let addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = self.serve_with_shutdown(shutdown).await {
                tracing::error!("Worker listener failed: {}", e);
            }
        });

        Ok(ListenerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }
}

/// Handle to a spawned [`WorkerListener`]. Dropping it stops the listener.
pub struct ListenerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting new connections. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
        self.task.abort();
    }
}

async fn handle_connection(stream: TcpStream, worker: Arc<IngestionWorker>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RequestFrame>(&line) {
            Ok(frame) => dispatch(&worker, frame),
            Err(e) => match salvage_id(&line) {
                Some(id) => ResponseFrame::error(id, format!("Malformed command: {}", e)),
                None => {
                    tracing::warn!("Dropping unparseable command frame: {}", e);
                    continue;
                }
            },
        };

        writer.write_all(&encode_line(&response)?).await?;
    }

    Ok(())
}

fn dispatch(worker: &IngestionWorker, frame: RequestFrame) -> ResponseFrame {
    let id = frame.id;
    let command = frame.command.name();

    let payload = match frame.command {
        Command::StartIngestion(document) => serde_json::to_value(worker.start_ingestion(&document)),
        Command::GetStatus(document_id) => serde_json::to_value(worker.get_status(document_id)),
    };

    match payload {
        Ok(value) => ResponseFrame::ok(id, value),
        Err(e) => {
            tracing::error!("Failed to encode {} response: {}", command, e);
            ResponseFrame::error(id, format!("Failed to encode {} response", command))
        }
    }
}
