// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use async_trait::async_trait;
use std::sync::Arc;

use crate::command::Invocation;
use crate::task_report::Outcome;

/// Runs one invocation to completion.
/// Never fails: problems are reported as [`Outcome::Failed`].
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Outcome;
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, invocation: &Invocation) -> Outcome {
        (**self).execute(invocation).await
    }
}
