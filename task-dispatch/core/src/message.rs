// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::command::Invocation;
use crate::task_report::TaskReport;

/// Participant identity, fixed for the lifetime of a run
pub type Rank = usize;

/// Rank of the coordinator; workers are 1..=N
pub const COORDINATOR: Rank = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    Work,
    Result,
    Stop,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Work => write!(f, "WORK"),
            Tag::Result => write!(f, "RESULT"),
            Tag::Stop => write!(f, "STOP"),
        }
    }
}

/// Messages exchanged between coordinator and workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    Work(Invocation),
    Result(TaskReport),
    Stop,
}

impl Message {
    pub fn tag(&self) -> Tag {
        match self {
            Message::Work(_) => Tag::Work,
            Message::Result(_) => Tag::Result,
            Message::Stop => Tag::Stop,
        }
    }
}

/// Selects which messages a receive is willing to accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilter {
    Any,
    Only(Tag),
}

impl TagFilter {
    pub fn matches(&self, tag: Tag) -> bool {
        match self {
            TagFilter::Any => true,
            TagFilter::Only(wanted) => *wanted == tag,
        }
    }
}

/// A received message together with the rank that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub source: Rank,
    pub message: Message,
}

impl Envelope {
    pub fn new(source: Rank, message: Message) -> Self {
        Self { source, message }
    }

    pub fn tag(&self) -> Tag {
        self.message.tag()
    }
}
