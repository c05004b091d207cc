// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use task_dispatch_core::{Executor, Transport, Worker};

use crate::channel_transport::ChannelEndpoint;

/// Trait for creating a worker around its endpoint
pub trait WorkerFactory: Send {
    type Transport: Transport + 'static;
    type Executor: Executor + 'static;

    fn create_worker(
        &mut self,
        endpoint: ChannelEndpoint,
    ) -> Worker<Self::Transport, Self::Executor>;
}

impl<F, T, E> WorkerFactory for F
where
    F: FnMut(ChannelEndpoint) -> Worker<T, E> + Send,
    T: Transport + 'static,
    E: Executor + 'static,
{
    type Transport = T;
    type Executor = E;

    fn create_worker(&mut self, endpoint: ChannelEndpoint) -> Worker<T, E> {
        (self)(endpoint)
    }
}
