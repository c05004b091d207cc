// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;

use crate::error::TransportError;
use crate::message::{Envelope, Message, Rank, TagFilter};

/// Point-to-point, tagged message passing between a fixed set of ranks.
/// Different implementations for in-process channels, sockets, etc.
#[async_trait]
pub trait Transport: Send {
    /// This endpoint's rank
    fn rank(&self) -> Rank;

    /// Number of participants, coordinator included
    fn size(&self) -> usize;

    /// Hands `message` to the channel towards `dest`.
    /// Returns once handed over, not once consumed.
    async fn send(&mut self, dest: Rank, message: Message) -> Result<(), TransportError>;

    /// Waits for the next message from any participant that passes `filter`.
    /// Messages from one sender arrive in the order they were sent.
    async fn recv_any(&mut self, filter: TagFilter) -> Result<Envelope, TransportError>;
}
