// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use task_dispatch_core::{Message, Rank, TransportError};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

/// How long either side waits for the other half of the handshake
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) type FrameReader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;
pub(crate) type FrameWriter = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// Everything that travels over a worker connection, one per length-delimited frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFrame {
    /// First frame from a connecting worker
    Hello { hostname: String },
    /// The coordinator's answer, fixing the worker's rank for the run
    Welcome { rank: Rank, size: usize },
    Message(Message),
}

impl WireFrame {
    pub fn encode(&self) -> Result<Bytes, TransportError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    pub fn decode(bytes: &BytesMut) -> Result<Self, TransportError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub(crate) fn split(stream: tokio::net::TcpStream) -> (FrameReader, FrameWriter) {
    let (read, write) = stream.into_split();
    (
        FramedRead::new(read, LengthDelimitedCodec::new()),
        FramedWrite::new(write, LengthDelimitedCodec::new()),
    )
}
