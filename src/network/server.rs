//! TCP accept loop and per-connection handling (spec §4.5, §6).
//!
//! Grounded on the teacher's `network/server.rs` `Server`/
//! `ConnectionHandler` split: a bounded `AtomicUsize` connection counter
//! checked before accept, one handler struct per connection holding
//! `Arc` clones of the shared collaborators.
//!
//! A single port carries two protocols: the line-oriented client
//! protocol and the binary replication protocol (spec leaves the wire
//! multiplexing unspecified). Each frame is read raw and first tried as
//! a bincode-decoded [`SlaveRequest`]; on decode failure it is treated
//! as a UTF-8 client query. This keeps replication off a second listener
//! without requiring the client to tag its frames.

use crate::codec;
use crate::config::ServerConfig;
use crate::error::DbError;
use crate::executor::Executor;
use crate::replication::{protocol, MasterResponse, ReplicationMaster, SlaveRequest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

pub struct Server {
    executor: Arc<Executor>,
    replication_master: Arc<ReplicationMaster>,
    config: Arc<ServerConfig>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    pub fn new(executor: Arc<Executor>, replication_master: Arc<ReplicationMaster>, config: Arc<ServerConfig>) -> Self {
        Self {
            executor,
            replication_master,
            config,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn run(&self) -> crate::error::Result<()> {
        let listener = TcpListener::bind(&self.config.network_address)
            .await
            .map_err(|e| DbError::Network(e.to_string()))?;

        tracing::info!(address = %self.config.network_address, "nimbuskv server listening");

        loop {
            let (socket, addr) = listener
                .accept()
                .await
                .map_err(|e| DbError::Network(e.to_string()))?;

            let current = self.active_connections.load(Ordering::Relaxed);
            if current >= self.config.network_max_connections {
                tracing::warn!(current, limit = self.config.network_max_connections, %addr, "connection limit reached, rejecting");
                continue;
            }
            self.active_connections.fetch_add(1, Ordering::Relaxed);
            tracing::info!(%addr, current = current + 1, "new connection");

            let handler = ConnectionHandler {
                executor: self.executor.clone(),
                replication_master: self.replication_master.clone(),
                config: self.config.clone(),
                session_id: uuid::Uuid::new_v4().to_string(),
            };
            let active_connections = self.active_connections.clone();
            tokio::spawn(async move {
                if let Err(e) = handler.handle(socket).await {
                    tracing::error!(error = %e, "connection error");
                }
                active_connections.fetch_sub(1, Ordering::Relaxed);
            });
        }
    }
}

struct ConnectionHandler {
    executor: Arc<Executor>,
    replication_master: Arc<ReplicationMaster>,
    config: Arc<ServerConfig>,
    session_id: String,
}

impl ConnectionHandler {
    async fn handle(&self, mut socket: TcpStream) -> crate::error::Result<()> {
        loop {
            let frame = match tokio::time::timeout(
                self.config.network_idle_timeout,
                codec::read_frame_raw(&mut socket, self.config.network_max_message_size),
            )
            .await
            {
                Ok(Ok(frame)) => frame,
                Ok(Err(_)) => break,
                Err(_) => return Err(DbError::ConnectionTimedOut),
            };

            let response = self.process_frame(&frame).await;
            codec::write_frame(&mut socket, &response).await?;
        }
        Ok(())
    }

    async fn process_frame(&self, frame: &[u8]) -> Vec<u8> {
        if let Ok(request) = protocol::decode::<SlaveRequest>(frame) {
            let response = self
                .replication_master
                .handle_request(request)
                .unwrap_or_else(|_| MasterResponse { succeed: false, data: Vec::new() });
            return protocol::encode(&response).unwrap_or_default();
        }

        let query = match std::str::from_utf8(frame) {
            Ok(q) => q.trim_start_matches('\u{0}'),
            Err(_) => return b"[error] invalid syntax: not valid utf-8".to_vec(),
        };
        self.executor.execute(&self.session_id, query).await.into_bytes()
    }
}
