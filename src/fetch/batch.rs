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

use crate::client::Transport;
use crate::config::FetchConfig;
use crate::fetch::attempt::{run_attempt, AttemptOutcome};
use crate::fetching::{FetchRequest, ResponseMeta};
use crate::runtime::{sleep_cancellable, Cancellation};
use crate::validation::DocumentEngine;
use futures::future::join_all;
use itertools::Itertools;
use std::collections::{HashMap, VecDeque};

/// The outcome of a batch fetch, keyed by the position of the request
/// in the submitted slice.
#[derive(Debug, Default)]
pub struct BatchResult {
    /// The decoded bodies of every validated request. None when the
    /// server sent nothing and the rules allow a null body.
    pub contents: HashMap<usize, Option<String>>,
    /// The response metadata of every validated request.
    pub headers: HashMap<usize, ResponseMeta>,
    /// How many passes re-attempted at least one previously failed
    /// request.
    pub num_retry_passes: u32,
    /// The requests that never validated, sorted ascending.
    pub failed_indices: Vec<usize>,
}

struct BatchItem {
    index: usize,
    request: FetchRequest,
    failures: u32,
}

fn abandon_outstanding(
    result: &mut BatchResult,
    in_flight: Vec<BatchItem>,
    pending: VecDeque<BatchItem>,
) {
    result.failed_indices = in_flight
        .into_iter()
        .chain(pending)
        .map(|item| item.index)
        .sorted()
        .collect();
}

/// Fetches a batch of requests in concurrent passes. Failed requests
/// are carried into the next pass and retried for as long as the batch
/// makes progress; only a run of fruitless passes, a fatal transport
/// failure or cancellation abandons the remainder.
pub async fn load_multi<T: Transport, E: DocumentEngine>(
    transport: &T,
    documents: &E,
    config: &FetchConfig,
    requests: Vec<FetchRequest>,
    cancellation: &Cancellation,
) -> BatchResult {
    let mut result = BatchResult::default();
    let mut pending: VecDeque<BatchItem> = requests
        .into_iter()
        .enumerate()
        .map(|(index, request)| BatchItem {
            index,
            request,
            failures: 0,
        })
        .collect();
    let mut in_flight: Vec<BatchItem> = Vec::new();
    let mut fruitless_passes: u32 = 0;
    let concurrency = config.max_concurrent.max(1);

    loop {
        while in_flight.len() < concurrency {
            match pending.pop_front() {
                Some(item) => in_flight.push(item),
                None => break,
            }
        }
        if in_flight.is_empty() {
            break;
        }
        if in_flight.iter().any(|item| item.failures > 0) {
            result.num_retry_passes += 1;
        }

        let outcomes = join_all(in_flight.drain(..).map(|item| async move {
            let outcome = run_attempt(transport, documents, config, &item.request).await;
            (item, outcome)
        }))
        .await;

        let mut completed: usize = 0;
        let mut fatal = false;
        for (mut item, outcome) in outcomes {
            match outcome {
                AttemptOutcome::Success { content, meta, .. } => {
                    result.contents.insert(item.index, content);
                    result.headers.insert(item.index, meta);
                    completed += 1;
                }
                AttemptOutcome::Failure { reason, .. } => {
                    log::debug!(
                        "Request {} at {} failed: {}",
                        item.index,
                        item.request.url(),
                        reason
                    );
                    item.failures += 1;
                    in_flight.push(item);
                }
                AttemptOutcome::Fatal { reason } => {
                    log::warn!("Abandoning the batch: {}", reason);
                    fatal = true;
                    in_flight.push(item);
                }
            }
        }

        if fatal {
            abandon_outstanding(&mut result, in_flight, pending);
            return result;
        }
        if completed == 0 {
            fruitless_passes += 1;
            if config.max_fruitless_passes == 0
                || fruitless_passes >= config.max_fruitless_passes
                || !sleep_cancellable(config.inter_pass_delay, cancellation).await
            {
                abandon_outstanding(&mut result, in_flight, pending);
                return result;
            }
        } else {
            // any completion at all resets the fruitlessness
            fruitless_passes = 0;
        }
    }
    result
}
