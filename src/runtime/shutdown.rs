// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use time::Duration;
use tokio_util::sync::CancellationToken;

// Inspired by https://github.com/tokio-rs/mini-redis/blob/master/src/shutdown.rs

/// A cancellation handle threaded through every suspension point of the
/// engines: the inter retry sleep and the inter pass sleep.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    inner: CancellationToken,
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            inner: CancellationToken::new(),
        }
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }

    /// A child handle that is cancelled with its parent but can also be
    /// cancelled alone.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }
}

/// Sleeps for the duration unless cancelled first. Returns true if the
/// sleep elapsed.
pub async fn sleep_cancellable(duration: Duration, cancellation: &Cancellation) -> bool {
    if cancellation.is_cancelled() {
        return false;
    }
    if duration.is_zero() || duration.is_negative() {
        return true;
    }
    tokio::select! {
        _ = cancellation.cancelled() => false,
        _ = tokio::time::sleep(duration.unsigned_abs()) => true,
    }
}

#[cfg(test)]
mod test {
    use super::{sleep_cancellable, Cancellation};
    use time::Duration;

    #[tokio::test]
    async fn a_zero_sleep_elapses() {
        let cancellation = Cancellation::new();
        assert!(sleep_cancellable(Duration::ZERO, &cancellation).await);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_sleep() {
        let cancellation = Cancellation::new();
        cancellation.cancel();
        assert!(!sleep_cancellable(Duration::seconds(3600), &cancellation).await);
    }

    #[tokio::test]
    async fn children_follow_their_parent() {
        let parent = Cancellation::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());

        let parent = Cancellation::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());
    }
}
