// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use task_dispatch_core::{
    Envelope, Mailbox, Message, Rank, TagFilter, Transport, TransportError, COORDINATOR,
};
use tokio::net::TcpStream;

use crate::wire::{self, FrameReader, FrameWriter, WireFrame, HANDSHAKE_TIMEOUT};

pub const CONNECT_ATTEMPTS: usize = 20;
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Worker endpoint of the socket transport, linked to the coordinator only
pub struct SocketEndpoint {
    rank: Rank,
    size: usize,
    reader: FrameReader,
    writer: FrameWriter,
    mailbox: Mailbox,
}

impl SocketEndpoint {
    /// Connects to the coordinator at `addr`, retrying while it starts up,
    /// and learns this worker's rank from the handshake
    pub async fn connect(addr: SocketAddr, hostname: &str) -> Result<Self, TransportError> {
        let stream = connect_with_retry(addr).await?;
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = wire::split(stream);

        writer
            .send(
                WireFrame::Hello {
                    hostname: hostname.to_string(),
                }
                .encode()?,
            )
            .await?;

        let welcome = match tokio::time::timeout(HANDSHAKE_TIMEOUT, reader.next()).await {
            Ok(Some(bytes)) => WireFrame::decode(&bytes?)?,
            Ok(None) => return Err(TransportError::PeerClosed(COORDINATOR)),
            Err(_) => {
                return Err(TransportError::Handshake(format!(
                    "no welcome from {} within {:?}",
                    addr, HANDSHAKE_TIMEOUT
                )))
            }
        };

        let (rank, size) = match welcome {
            WireFrame::Welcome { rank, size } if rank != COORDINATOR && rank < size => (rank, size),
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected welcome from {}, got {:?}",
                    addr, other
                )))
            }
        };

        tracing::debug!(rank, size, %addr, "Joined coordinator");
        Ok(Self {
            rank,
            size,
            reader,
            writer,
            mailbox: Mailbox::new(),
        })
    }
}

async fn connect_with_retry(addr: SocketAddr) -> Result<TcpStream, TransportError> {
    let mut attempts = 0;
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                attempts += 1;
                if attempts >= CONNECT_ATTEMPTS {
                    tracing::error!(%addr, attempts, error = %e, "Giving up on coordinator");
                    return Err(e.into());
                }
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl Transport for SocketEndpoint {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn send(&mut self, dest: Rank, message: Message) -> Result<(), TransportError> {
        if dest == self.rank {
            return Err(TransportError::SelfSend(dest));
        }
        if dest != COORDINATOR {
            return Err(TransportError::UnknownPeer(dest));
        }
        let frame = WireFrame::Message(message).encode()?;
        self.writer
            .send(frame)
            .await
            .map_err(|_| TransportError::PeerClosed(COORDINATOR))
    }

    async fn recv_any(&mut self, filter: TagFilter) -> Result<Envelope, TransportError> {
        if let Some(envelope) = self.mailbox.take(filter) {
            return Ok(envelope);
        }

        loop {
            let bytes = match self.reader.next().await {
                Some(bytes) => bytes?,
                None => return Err(TransportError::PeerClosed(COORDINATOR)),
            };
            let message = match WireFrame::decode(&bytes)? {
                WireFrame::Message(message) => message,
                other => {
                    return Err(TransportError::InvalidFrame {
                        rank: COORDINATOR,
                        reason: format!("unexpected frame {:?}", other),
                    })
                }
            };
            if let Some(envelope) = self
                .mailbox
                .accept(Envelope::new(COORDINATOR, message), filter)
            {
                return Ok(envelope);
            }
        }
    }
}
