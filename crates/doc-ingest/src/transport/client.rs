//! TCP client proxy for a remote ingestion worker
//!
//! A single persistent connection is opened on first use. Requests are
//! written as they arrive and responses are matched to waiters by frame id, so
//! concurrent callers share the connection. When the connection breaks every
//! outstanding waiter fails with `Error::Transport` and the next call dials a
//! fresh connection. Nothing is retried.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use super::protocol::{decode_payload, encode_line, Command, RequestFrame, ResponseFrame};
use super::IngestionChannel;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::{Document, DocumentSnapshot, JobAck, StatusRecord};

type Waiter = oneshot::Sender<Result<Value>>;

/// Requests awaiting a response on one connection
#[derive(Default)]
struct Pending {
    waiters: DashMap<u64, Waiter>,
    closed: AtomicBool,
}

impl Pending {
    /// Register a waiter; fails if the connection has already closed
    fn register(&self, id: u64) -> Result<oneshot::Receiver<Result<Value>>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);

        if self.closed.load(Ordering::SeqCst) {
            self.waiters.remove(&id);
            return Err(Error::transport("Connection to ingestion worker closed"));
        }
        Ok(rx)
    }

    fn forget(&self, id: u64) {
        self.waiters.remove(&id);
    }

    fn resolve(&self, frame: ResponseFrame) {
        match self.waiters.remove(&frame.id) {
            Some((_, waiter)) => {
                let _ = waiter.send(frame.into_result());
            }
            None => tracing::debug!("Discarding response for unknown request {}", frame.id),
        }
    }

    /// Mark closed and fail every outstanding waiter
    fn close(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);

        let ids: Vec<u64> = self.waiters.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                let _ = waiter.send(Err(Error::transport(reason.to_string())));
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct Connection {
    writer: OwnedWriteHalf,
    pending: Arc<Pending>,
    reader: JoinHandle<()>,
}

impl Connection {
    async fn open(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address).await.map_err(|e| {
            Error::transport(format!("Failed to connect to ingestion worker at {}: {}", address, e))
        })?;
        let (reader, writer) = stream.into_split();

        let pending = Arc::new(Pending::default());
        let reader = tokio::spawn(read_responses(reader, Arc::clone(&pending)));

        tracing::debug!("Connected to ingestion worker at {}", address);
        Ok(Self {
            writer,
            pending,
            reader,
        })
    }

    fn is_open(&self) -> bool {
        !self.pending.is_closed()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
        self.pending.close("Connection to ingestion worker dropped");
    }
}

async fn read_responses(reader: OwnedReadHalf, pending: Arc<Pending>) {
    let mut lines = BufReader::new(reader).lines();

    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<ResponseFrame>(&line) {
                Ok(frame) => pending.resolve(frame),
                Err(e) => tracing::warn!("Ignoring malformed response frame: {}", e),
            },
            Ok(None) => break "Connection to ingestion worker closed".to_string(),
            Err(e) => break format!("Connection to ingestion worker failed: {}", e),
        }
    };

    tracing::warn!("{}", reason);
    pending.close(&reason);
}

/// Command channel to a worker over TCP
pub struct IngestionClient {
    address: String,
    request_timeout: Option<Duration>,
    next_id: AtomicU64,
    connection: Mutex<Option<Connection>>,
}

impl IngestionClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            address: config.worker_address.clone(),
            request_timeout: config.request_timeout(),
            next_id: AtomicU64::new(1),
            connection: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a command and wait for its response payload
    async fn call(&self, command: Command) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = command.name();
        let line = encode_line(&RequestFrame { id, command })?;

        let (pending, response) = {
            let mut slot = self.connection.lock().await;

            if !slot.as_ref().is_some_and(Connection::is_open) {
                *slot = Some(Connection::open(&self.address).await?);
            }
            let Some(connection) = slot.as_mut() else {
                return Err(Error::internal("Worker connection missing after connect"));
            };

            let response = match connection.pending.register(id) {
                Ok(rx) => rx,
                Err(e) => {
                    *slot = None;
                    return Err(e);
                }
            };

            if let Err(e) = connection.writer.write_all(&line).await {
                connection.pending.forget(id);
                *slot = None;
                return Err(Error::transport(format!("Failed to send {}: {}", name, e)));
            }

            (Arc::clone(&connection.pending), response)
        };

        let outcome = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, response).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    pending.forget(id);
                    return Err(Error::transport(format!(
                        "{} timed out after {:?}",
                        name, limit
                    )));
                }
            },
            None => response.await,
        };

        outcome.map_err(|_| Error::transport(format!("{} response channel dropped", name)))?
    }
}

#[async_trait]
impl IngestionChannel for IngestionClient {
    async fn start_ingestion(&self, document: &Document) -> Result<JobAck> {
        let snapshot = DocumentSnapshot::from_document(document)?;
        let payload = self.call(Command::StartIngestion(snapshot)).await?;
        decode_payload("start_ingestion", payload)
    }

    async fn get_status(&self, document_id: i64) -> Result<StatusRecord> {
        let payload = self.call(Command::GetStatus(document_id)).await?;
        decode_payload("get_status", payload)
    }

    fn name(&self) -> &str {
        "tcp"
    }
}
