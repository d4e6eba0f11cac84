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
use crate::decoding::decode_response;
use crate::fetching::{FetchRequest, ResponseMeta};
use crate::validation::{validate, DocumentEngine};

/// The result of exactly one request & validate cycle.
#[derive(Debug)]
pub enum AttemptOutcome<H> {
    /// The response passed every validation rule.
    Success {
        content: Option<String>,
        meta: ResponseMeta,
        document: Option<H>,
    },
    /// The attempt failed for a reason that another attempt may fix.
    Failure {
        reason: String,
        content: Option<String>,
        meta: Option<ResponseMeta>,
    },
    /// The transport failed in a way no retry can fix.
    Fatal { reason: String },
}

/// Runs one attempt: transport, decoding, validation. Never sleeps and
/// never retries, that is the business of the engines on top.
pub async fn run_attempt<T: Transport, E: DocumentEngine>(
    transport: &T,
    documents: &E,
    config: &FetchConfig,
    request: &FetchRequest,
) -> AttemptOutcome<E::Handle> {
    let raw = match transport.execute(request, config).await {
        Ok(raw) => raw,
        Err(error) if error.is_fatal() => {
            return AttemptOutcome::Fatal {
                reason: error.to_string(),
            }
        }
        Err(error) => {
            return AttemptOutcome::Failure {
                reason: error.to_string(),
                content: None,
                meta: None,
            }
        }
    };
    let response = match decode_response(raw) {
        Ok(response) => response,
        Err(error) => {
            return AttemptOutcome::Failure {
                reason: error.to_string(),
                content: None,
                meta: None,
            }
        }
    };
    match validate(documents, &response, &config.validation) {
        Ok(validated) => AttemptOutcome::Success {
            content: response.content,
            meta: response.meta,
            document: validated.document,
        },
        Err(failure) => AttemptOutcome::Failure {
            reason: failure.to_string(),
            content: response.content,
            meta: Some(response.meta),
        },
    }
}

#[cfg(test)]
mod test {
    use super::{run_attempt, AttemptOutcome};
    use crate::config::FetchConfig;
    use crate::fetching::FetchRequest;
    use crate::test_impls::ScriptedTransport;
    use crate::validation::CssSelectorEngine;

    #[tokio::test]
    async fn a_passing_response_is_a_success() {
        let transport = ScriptedTransport::always(ScriptedTransport::html_ok("<html>ok</html>"));
        let outcome = run_attempt(
            &transport,
            &CssSelectorEngine,
            &FetchConfig::default(),
            &FetchRequest::get("http://example.com/".parse().unwrap()),
        )
        .await;
        match outcome {
            AttemptOutcome::Success { content, meta, .. } => {
                assert_eq!(Some("<html>ok</html>".to_string()), content);
                assert_eq!(200, meta.status_code);
            }
            other => panic!("expected a success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn a_rejected_status_is_a_failure_with_the_body() {
        let transport = ScriptedTransport::always(ScriptedTransport::status(404, "<html>gone</html>"));
        let outcome = run_attempt(
            &transport,
            &CssSelectorEngine,
            &FetchConfig::default(),
            &FetchRequest::get("http://example.com/".parse().unwrap()),
        )
        .await;
        match outcome {
            AttemptOutcome::Failure {
                reason,
                content,
                meta,
            } => {
                assert_eq!("HTTP code 404", reason);
                assert_eq!(Some("<html>gone</html>".to_string()), content);
                assert_eq!(404, meta.unwrap().status_code);
            }
            other => panic!("expected a failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn an_unreachable_proxy_is_fatal() {
        let transport = ScriptedTransport::always(ScriptedTransport::proxy_down());
        let outcome = run_attempt(
            &transport,
            &CssSelectorEngine,
            &FetchConfig::default(),
            &FetchRequest::get("http://example.com/".parse().unwrap()),
        )
        .await;
        assert!(matches!(outcome, AttemptOutcome::Fatal { .. }));
    }
}
