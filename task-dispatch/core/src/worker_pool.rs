// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::DispatchError;
use crate::message::Rank;

/// Coordinator-side bookkeeping of which worker is idle and which is busy.
///
/// Idle workers queue up in the order they became idle, so handing the next
/// task to `next_idle` is greedy: whoever freed up first gets it.
#[derive(Debug, Default)]
pub struct WorkerPool {
    idle: VecDeque<Rank>,
    busy: HashMap<Rank, String>,
    stopped: HashSet<Rank>,
}

impl WorkerPool {
    /// All `ranks` start idle, in the given order
    pub fn new(ranks: impl IntoIterator<Item = Rank>) -> Self {
        Self {
            idle: ranks.into_iter().collect(),
            busy: HashMap::new(),
            stopped: HashSet::new(),
        }
    }

    /// The worker that has been idle the longest
    pub fn next_idle(&self) -> Option<Rank> {
        self.idle.front().copied()
    }

    /// Moves `rank` from idle to busy with `task`
    pub fn assign(&mut self, rank: Rank, task: &str) -> Result<(), DispatchError> {
        let position = self
            .idle
            .iter()
            .position(|r| *r == rank)
            .ok_or_else(|| {
                DispatchError::Protocol(format!(
                    "worker {} is not idle, cannot assign {}",
                    rank, task
                ))
            })?;
        self.idle.remove(position);
        self.busy.insert(rank, task.to_string());
        Ok(())
    }

    /// Moves `rank` back to idle, checking it was busy with `task`
    pub fn complete(&mut self, rank: Rank, task: &str) -> Result<(), DispatchError> {
        match self.busy.get(&rank) {
            Some(assigned) if assigned == task => {
                self.busy.remove(&rank);
                self.idle.push_back(rank);
                Ok(())
            }
            Some(assigned) => Err(DispatchError::Protocol(format!(
                "worker {} reported {} but was assigned {}",
                rank, task, assigned
            ))),
            None => Err(DispatchError::Protocol(format!(
                "worker {} reported {} without an assignment",
                rank, task
            ))),
        }
    }

    /// Marks an idle worker as stopped; each worker can be stopped once
    pub fn stop(&mut self, rank: Rank) -> Result<(), DispatchError> {
        if self.busy.contains_key(&rank) {
            return Err(DispatchError::Protocol(format!(
                "worker {} is still busy and cannot be stopped",
                rank
            )));
        }
        if !self.stopped.insert(rank) {
            return Err(DispatchError::Protocol(format!(
                "worker {} was already stopped",
                rank
            )));
        }
        self.idle.retain(|r| *r != rank);
        Ok(())
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn has_busy(&self) -> bool {
        !self.busy.is_empty()
    }
}
