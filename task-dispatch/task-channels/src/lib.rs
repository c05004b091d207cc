// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

mod channel_transport;
pub use channel_transport::{ChannelEndpoint, ChannelNetwork};

mod worker_factory;
pub use worker_factory::WorkerFactory;

mod in_process;
pub use in_process::{dispatch, DispatchOutcome};
