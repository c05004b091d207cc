// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use task_dispatch_core::{
    Envelope, Mailbox, Message, Rank, TagFilter, Transport, TransportError, COORDINATOR,
};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::wire::{self, FrameReader, FrameWriter, WireFrame, HANDSHAKE_TIMEOUT};

/// What a connection reader hands to the coordinator
#[derive(Debug)]
enum Inbound {
    Message(Message),
    Invalid(String),
    Closed,
}

/// Listening side of the socket transport, before the workers have joined
pub struct SocketHub {
    listener: TcpListener,
}

impl SocketHub {
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for `num_workers` workers, handing out ranks 1..=N in the order
    /// they connect. The participant set is fixed once this returns.
    pub async fn accept(self, num_workers: usize) -> Result<SocketCoordinator, TransportError> {
        let size = num_workers + 1;
        let (inbox_tx, inbox) = mpsc::channel(2 * size);
        let mut writers = HashMap::new();
        let mut readers = Vec::with_capacity(num_workers);

        for rank in 1..size {
            let (stream, peer) = self.listener.accept().await?;
            stream.set_nodelay(true)?;
            let (mut reader, mut writer) = wire::split(stream);

            let hostname = match tokio::time::timeout(HANDSHAKE_TIMEOUT, reader.next()).await {
                Ok(Some(bytes)) => match WireFrame::decode(&bytes?)? {
                    WireFrame::Hello { hostname } => hostname,
                    other => {
                        return Err(TransportError::Handshake(format!(
                            "expected hello from {}, got {:?}",
                            peer, other
                        )))
                    }
                },
                Ok(None) => return Err(TransportError::Handshake(format!("{} hung up", peer))),
                Err(_) => {
                    return Err(TransportError::Handshake(format!(
                        "{} sent no hello within {:?}",
                        peer, HANDSHAKE_TIMEOUT
                    )))
                }
            };

            writer.send(WireFrame::Welcome { rank, size }.encode()?).await?;
            tracing::info!(rank, %peer, host = %hostname, "Worker joined");

            readers.push(tokio::spawn(forward(rank, reader, inbox_tx.clone())));
            writers.insert(rank, writer);
        }

        Ok(SocketCoordinator {
            size,
            writers,
            inbox,
            readers,
            mailbox: Mailbox::new(),
        })
    }
}

/// Pumps one connection into the coordinator's inbox until it closes
async fn forward(rank: Rank, mut reader: FrameReader, inbox: mpsc::Sender<(Rank, Inbound)>) {
    loop {
        let inbound = match reader.next().await {
            Some(Ok(bytes)) => match WireFrame::decode(&bytes) {
                Ok(WireFrame::Message(message)) => Inbound::Message(message),
                Ok(other) => Inbound::Invalid(format!("unexpected frame {:?}", other)),
                Err(e) => Inbound::Invalid(e.to_string()),
            },
            Some(Err(e)) => {
                tracing::warn!(rank, error = %e, "Connection failed");
                Inbound::Closed
            }
            None => Inbound::Closed,
        };

        let last = !matches!(inbound, Inbound::Message(_));
        if inbox.send((rank, inbound)).await.is_err() || last {
            return;
        }
    }
}

/// Coordinator endpoint of the socket transport, linked to every worker
pub struct SocketCoordinator {
    size: usize,
    writers: HashMap<Rank, FrameWriter>,
    inbox: mpsc::Receiver<(Rank, Inbound)>,
    readers: Vec<JoinHandle<()>>,
    mailbox: Mailbox,
}

#[async_trait]
impl Transport for SocketCoordinator {
    fn rank(&self) -> Rank {
        COORDINATOR
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn send(&mut self, dest: Rank, message: Message) -> Result<(), TransportError> {
        if dest == COORDINATOR {
            return Err(TransportError::SelfSend(dest));
        }
        let writer = self
            .writers
            .get_mut(&dest)
            .ok_or(TransportError::UnknownPeer(dest))?;
        let frame = WireFrame::Message(message).encode()?;
        writer
            .send(frame)
            .await
            .map_err(|_| TransportError::PeerClosed(dest))
    }

    async fn recv_any(&mut self, filter: TagFilter) -> Result<Envelope, TransportError> {
        if let Some(envelope) = self.mailbox.take(filter) {
            return Ok(envelope);
        }

        loop {
            match self.inbox.recv().await {
                Some((source, Inbound::Message(message))) => {
                    if let Some(envelope) = self
                        .mailbox
                        .accept(Envelope::new(source, message), filter)
                    {
                        return Ok(envelope);
                    }
                }
                Some((source, Inbound::Invalid(reason))) => {
                    return Err(TransportError::InvalidFrame {
                        rank: source,
                        reason,
                    })
                }
                Some((source, Inbound::Closed)) => return Err(TransportError::PeerClosed(source)),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

impl Drop for SocketCoordinator {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}
