// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;
use std::collections::HashMap;
use task_dispatch_core::{
    Envelope, Mailbox, Message, Rank, TagFilter, Transport, TransportError, COORDINATOR,
};
use tokio::sync::mpsc;

/// What travels on an inbox: a message, or notice that the sender went away
#[derive(Debug)]
enum Frame {
    Message(Message),
    Closed,
}

type Inbox = mpsc::Receiver<(Rank, Frame)>;
type Link = mpsc::Sender<(Rank, Frame)>;

/// In-process transport over tokio mpsc channels.
///
/// The coordinator is linked to every worker and each worker to the
/// coordinator only. Dropping an endpoint tells every linked peer, so a worker
/// that dies mid-task surfaces as [`TransportError::PeerClosed`] rather than a
/// coordinator waiting forever.
pub struct ChannelEndpoint {
    rank: Rank,
    size: usize,
    links: HashMap<Rank, Link>,
    inbox: Inbox,
    mailbox: Mailbox,
}

/// The endpoints of one run: rank 0 plus ranks 1..=N
pub struct ChannelNetwork {
    pub coordinator: ChannelEndpoint,
    pub workers: Vec<ChannelEndpoint>,
}

impl ChannelNetwork {
    pub fn build(num_workers: usize) -> Self {
        let size = num_workers + 1;
        // Room for every in-flight message plus one close notice per peer
        let capacity = 2 * size;

        let (inboxes, links): (Vec<Inbox>, Vec<Link>) = (0..size)
            .map(|_| {
                let (tx, rx) = mpsc::channel(capacity);
                (rx, tx)
            })
            .unzip();

        let mut endpoints = inboxes.into_iter().enumerate().map(|(rank, inbox)| {
            let links = if rank == COORDINATOR {
                (1..size).map(|peer| (peer, links[peer].clone())).collect()
            } else {
                HashMap::from([(COORDINATOR, links[COORDINATOR].clone())])
            };
            ChannelEndpoint {
                rank,
                size,
                links,
                inbox,
                mailbox: Mailbox::new(),
            }
        });

        let coordinator = endpoints.next().expect("network always has a coordinator");
        Self {
            coordinator,
            workers: endpoints.collect(),
        }
    }
}

#[async_trait]
impl Transport for ChannelEndpoint {
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
        let link = self
            .links
            .get(&dest)
            .ok_or(TransportError::UnknownPeer(dest))?;
        link.send((self.rank, Frame::Message(message)))
            .await
            .map_err(|_| TransportError::PeerClosed(dest))
    }

    async fn recv_any(&mut self, filter: TagFilter) -> Result<Envelope, TransportError> {
        if let Some(envelope) = self.mailbox.take(filter) {
            return Ok(envelope);
        }

        loop {
            match self.inbox.recv().await {
                Some((source, Frame::Message(message))) => {
                    if let Some(envelope) = self
                        .mailbox
                        .accept(Envelope::new(source, message), filter)
                    {
                        return Ok(envelope);
                    }
                }
                Some((source, Frame::Closed)) => return Err(TransportError::PeerClosed(source)),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

impl Drop for ChannelEndpoint {
    fn drop(&mut self) {
        for link in self.links.values() {
            let _ = link.try_send((self.rank, Frame::Closed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_dispatch_core::{Outcome, Role, Tag, TaskReport};

    fn result(task: &str) -> Message {
        Message::Result(TaskReport::new(
            Role::Worker,
            "host",
            task,
            Outcome::Output(task.to_string()),
        ))
    }

    #[tokio::test]
    async fn test_build_assigns_ranks_and_size() {
        let network = ChannelNetwork::build(3);

        assert_eq!(network.coordinator.rank(), COORDINATOR);
        assert_eq!(network.coordinator.size(), 4);
        let ranks: Vec<Rank> = network.workers.iter().map(|w| w.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_messages_from_one_sender_keep_their_order() {
        let ChannelNetwork {
            mut coordinator,
            mut workers,
        } = ChannelNetwork::build(1);
        let worker = &mut workers[0];

        worker.send(COORDINATOR, result("a")).await.unwrap();
        worker.send(COORDINATOR, result("b")).await.unwrap();

        let first = coordinator.recv_any(TagFilter::Any).await.unwrap();
        let second = coordinator.recv_any(TagFilter::Any).await.unwrap();
        assert_eq!(first, Envelope::new(1, result("a")));
        assert_eq!(second, Envelope::new(1, result("b")));
    }

    #[tokio::test]
    async fn test_filtered_receive_holds_other_tags() {
        let ChannelNetwork {
            mut coordinator,
            mut workers,
        } = ChannelNetwork::build(1);

        coordinator.send(1, Message::Stop).await.unwrap();
        coordinator.send(1, result("x")).await.unwrap();

        let worker = &mut workers[0];
        let got = worker.recv_any(TagFilter::Only(Tag::Result)).await.unwrap();
        assert_eq!(got.tag(), Tag::Result);

        let held = worker.recv_any(TagFilter::Any).await.unwrap();
        assert_eq!(held, Envelope::new(COORDINATOR, Message::Stop));
    }

    #[tokio::test]
    async fn test_workers_only_reach_the_coordinator() {
        let ChannelNetwork {
            mut coordinator,
            mut workers,
        } = ChannelNetwork::build(2);

        assert!(matches!(
            workers[0].send(2, Message::Stop).await,
            Err(TransportError::UnknownPeer(2))
        ));
        assert!(matches!(
            coordinator.send(COORDINATOR, Message::Stop).await,
            Err(TransportError::SelfSend(0))
        ));
        assert!(matches!(
            coordinator.send(9, Message::Stop).await,
            Err(TransportError::UnknownPeer(9))
        ));
    }

    #[tokio::test]
    async fn test_dropped_worker_is_reported_to_the_coordinator() {
        let ChannelNetwork {
            mut coordinator,
            mut workers,
        } = ChannelNetwork::build(2);

        drop(workers.remove(1));

        assert!(matches!(
            coordinator.recv_any(TagFilter::Any).await,
            Err(TransportError::PeerClosed(2))
        ));
    }

    #[tokio::test]
    async fn test_dropped_coordinator_is_reported_to_workers() {
        let ChannelNetwork {
            coordinator,
            mut workers,
        } = ChannelNetwork::build(1);

        drop(coordinator);

        assert!(matches!(
            workers[0].recv_any(TagFilter::Any).await,
            Err(TransportError::PeerClosed(COORDINATOR))
        ));
    }
}
