// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Error taxonomy for a dispatch run.
//!
//! Configuration and catalog errors abort before any worker is engaged.
//! Transport errors abort a run in progress. Task execution failures are not
//! errors at all: they travel inside a [`crate::TaskReport`].

use std::path::PathBuf;
use thiserror::Error;

use crate::message::{Rank, Tag};

/// Problems with the invocation surface, detected before scheduling starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{}: no such directory", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("{}: not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{}: is not an executable file", .0.display())]
    NotExecutable(PathBuf),

    #[error("{}: {source}", .path.display())]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read config file {}: {source}", .path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Directory scan failures; a partial catalog is never produced
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("file name is not valid UTF-8: {}", .0.display())]
    InvalidName(PathBuf),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("invocation for '{task}' is {len} bytes, limit is {max}")]
    TooLong { task: String, len: usize, max: usize },

    #[error("empty task identifier")]
    EmptyTask,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("rank {0} is not a participant")]
    UnknownPeer(Rank),

    #[error("rank {0} cannot send to itself")]
    SelfSend(Rank),

    #[error("rank {0} disconnected")]
    PeerClosed(Rank),

    #[error("transport closed")]
    Closed,

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("rank {rank} sent an invalid frame: {reason}")]
    InvalidFrame { rank: Rank, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Top-level error for coordinator and worker runs
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("rank {rank} received an unexpected {tag} message")]
    UnexpectedMessage { rank: Rank, tag: Tag },

    #[error("worker {rank} aborted: {reason}")]
    WorkerAborted { rank: Rank, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}
