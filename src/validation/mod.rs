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

mod comparator;
mod document;
mod rules;

pub use comparator::*;
pub use document::*;
pub use rules::*;

use crate::fetching::ResponseData;
use thiserror::Error;

/// A named reason why one attempt failed validation. Recoverable, drives
/// a retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("HTTP code {0}")]
    HttpCode(u16),
    #[error("Null content")]
    NullContent,
    #[error("Cut off HTML")]
    CutOffHtml,
    #[error("{0}")]
    FailedAssertion(String),
}

/// What a successful validation hands back so downstream code does not
/// have to parse the body twice.
#[derive(Debug)]
pub struct Validated<H> {
    /// The parsed document, present when the rules caused a parse.
    pub document: Option<H>,
    /// The matched text values of every assertion, in declared order.
    pub matches: Vec<Vec<String>>,
}

/// Classifies one completed attempt as success or a named failure.
///
/// The order of the checks is fixed: status code acceptance, null body,
/// truncated markup, then the assertions in their declared order. Only
/// the first failing check is reported.
pub fn validate<E: DocumentEngine>(
    engine: &E,
    response: &ResponseData,
    rules: &ValidationRules,
) -> Result<Validated<E::Handle>, ValidationFailure> {
    if !rules
        .accepted_status_codes
        .contains(&response.meta.status_code)
    {
        return Err(ValidationFailure::HttpCode(response.meta.status_code));
    }
    let content = response.content.as_deref();
    if rules.reject_null_body && content.map(str::is_empty).unwrap_or(true) {
        return Err(ValidationFailure::NullContent);
    }
    if rules.reject_truncated_markup
        && !content
            .unwrap_or_default()
            .trim_end()
            .ends_with(rules.closing_tag.as_str())
    {
        return Err(ValidationFailure::CutOffHtml);
    }
    let mut document = None;
    let mut collected = Vec::with_capacity(rules.assertions.len());
    if rules.parse_document || !rules.assertions.is_empty() {
        let handle = engine.parse(content.unwrap_or_default());
        for assertion in &rules.assertions {
            let matches = match engine.evaluate(&handle, &assertion.expression) {
                Ok(matches) => matches,
                Err(error) => {
                    return Err(ValidationFailure::FailedAssertion(error.to_string()))
                }
            };
            if matches.is_empty() {
                return Err(ValidationFailure::FailedAssertion(assertion.describe()));
            }
            if let Some(comparator) = &assertion.comparator {
                if let Some(value) = matches.iter().find(|value| !comparator.matches(value)) {
                    return Err(ValidationFailure::FailedAssertion(format!(
                        "{}: '{}' does not satisfy '{}'",
                        assertion.describe(),
                        value,
                        comparator
                    )));
                }
            }
            collected.push(matches);
        }
        document = Some(handle);
    }
    Ok(Validated {
        document,
        matches: collected,
    })
}
