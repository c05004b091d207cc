// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::VecDeque;

use crate::message::{Envelope, TagFilter};

/// Messages an endpoint has received but no filtered receive has asked for yet.
///
/// Receives check the mailbox first, in arrival order, before pulling from the
/// wire, so filtering by tag never drops or reorders a sender's messages.
#[derive(Debug, Default)]
pub struct Mailbox {
    deferred: VecDeque<Envelope>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes the oldest held message matching `filter`
    pub fn take(&mut self, filter: TagFilter) -> Option<Envelope> {
        let position = self
            .deferred
            .iter()
            .position(|envelope| filter.matches(envelope.tag()))?;
        self.deferred.remove(position)
    }

    pub fn defer(&mut self, envelope: Envelope) {
        self.deferred.push_back(envelope);
    }

    /// Returns `envelope` if it passes `filter`, holding it otherwise
    pub fn accept(&mut self, envelope: Envelope, filter: TagFilter) -> Option<Envelope> {
        if filter.matches(envelope.tag()) {
            Some(envelope)
        } else {
            self.defer(envelope);
            None
        }
    }

    pub fn len(&self) -> usize {
        self.deferred.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deferred.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, Tag};
    use crate::task_report::{Outcome, Role, TaskReport};

    fn result_from(source: usize, task: &str) -> Envelope {
        Envelope::new(
            source,
            Message::Result(TaskReport::new(
                Role::Worker,
                "host",
                task,
                Outcome::Output(task.to_string()),
            )),
        )
    }

    #[test]
    fn test_take_returns_oldest_matching_message() {
        let mut mailbox = Mailbox::new();
        mailbox.defer(Envelope::new(0, Message::Stop));
        mailbox.defer(result_from(1, "a"));
        mailbox.defer(result_from(2, "b"));

        let first = mailbox.take(TagFilter::Only(Tag::Result)).unwrap();
        assert_eq!(first, result_from(1, "a"));
        assert_eq!(mailbox.len(), 2);

        let stop = mailbox.take(TagFilter::Any).unwrap();
        assert_eq!(stop.tag(), Tag::Stop);
        assert!(mailbox.take(TagFilter::Only(Tag::Work)).is_none());
    }

    #[test]
    fn test_accept_holds_non_matching_message() {
        let mut mailbox = Mailbox::new();

        assert!(mailbox
            .accept(Envelope::new(0, Message::Stop), TagFilter::Only(Tag::Result))
            .is_none());
        assert_eq!(mailbox.len(), 1);

        let accepted = mailbox.accept(result_from(3, "c"), TagFilter::Only(Tag::Result));
        assert_eq!(accepted, Some(result_from(3, "c")));
        assert_eq!(mailbox.len(), 1);
    }
}
