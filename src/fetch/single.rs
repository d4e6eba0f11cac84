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
use crate::fetch::errors::FetchErrorCode;
use crate::fetching::{FetchRequest, ResponseMeta};
use crate::history::{Exchange, HistoryError, Journal, Page, PageDescriptor};
use crate::runtime::{sleep_cancellable, Cancellation};
use crate::validation::DocumentEngine;

/// The outcome of a single fetch after all retries.
#[derive(Debug)]
pub struct SingleFetchResult<H> {
    /// The decoded body of the final attempt, if any arrived.
    pub content: Option<String>,
    /// The response metadata of the final attempt.
    pub headers: Option<ResponseMeta>,
    /// The failure reason of the final attempt, None on success.
    pub error: Option<String>,
    pub code: FetchErrorCode,
    /// The parsed document of a successful attempt, when the rules
    /// asked for parsing.
    pub document: Option<H>,
}

impl<H> SingleFetchResult<H> {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Fetches one request, retrying failed attempts with a delay in
/// between until an attempt validates or the budget runs out. A budget
/// of n allows n retries after the first attempt, so n + 1 attempts.
///
/// Every attempt, successful or not, becomes one exchange of the page
/// appended to the journal.
pub async fn load_single<T: Transport, E: DocumentEngine>(
    transport: &T,
    documents: &E,
    config: &FetchConfig,
    request: &FetchRequest,
    descriptor: &PageDescriptor,
    journal: Option<&Journal>,
    cancellation: &Cancellation,
) -> Result<SingleFetchResult<E::Handle>, HistoryError> {
    let mut exchanges = Vec::new();
    let mut failures: u32 = 0;
    let result = loop {
        match run_attempt(transport, documents, config, request).await {
            AttemptOutcome::Success {
                content,
                meta,
                document,
            } => {
                exchanges.push(Exchange::success(content.clone(), meta.clone()));
                break SingleFetchResult {
                    content,
                    headers: Some(meta),
                    error: None,
                    code: FetchErrorCode::None,
                    document,
                };
            }
            AttemptOutcome::Failure {
                reason,
                content,
                meta,
            } => {
                exchanges.push(Exchange::failure(content, meta, reason.clone()));
                failures += 1;
                log::debug!("Attempt {} at {} failed: {}", failures, request.url(), reason);
                if failures > config.max_fruitless_retries
                    || !sleep_cancellable(config.inter_retry_delay, cancellation).await
                {
                    break SingleFetchResult {
                        content: None,
                        headers: None,
                        error: Some(reason),
                        code: FetchErrorCode::Exhausted,
                        document: None,
                    };
                }
            }
            AttemptOutcome::Fatal { reason } => {
                exchanges.push(Exchange::failure(None, None, reason.clone()));
                log::warn!("Giving up on {}: {}", request.url(), reason);
                break SingleFetchResult {
                    content: None,
                    headers: None,
                    error: Some(reason),
                    code: FetchErrorCode::TransportFatal,
                    document: None,
                };
            }
        }
    };
    if let Some(journal) = journal {
        let page = Page {
            form_data: request.form_data().cloned(),
            name: descriptor.name.clone(),
            parent_index: None,
            custom_data: descriptor.custom_data.clone(),
            exchanges,
        };
        journal.append(descriptor, page)?;
    }
    Ok(result)
}
