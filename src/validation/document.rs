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

use scraper::{Html, Selector};
use thiserror::Error;

/// An error while evaluating an assertion expression against a document.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("The expression '{0}' is not a valid selector!")]
    InvalidExpression(String),
}

/// The document capability consumed by the validation pipeline. Parses a
/// response body once and evaluates assertion expressions against it; the
/// handle is returned to the caller on success so the body does not have
/// to be parsed twice.
pub trait DocumentEngine {
    type Handle;

    fn parse(&self, body: &str) -> Self::Handle;

    /// Evaluates the expression and returns the text value of every match.
    fn evaluate(
        &self,
        document: &Self::Handle,
        expression: &str,
    ) -> Result<Vec<String>, EvaluationError>;
}

/// A [DocumentEngine] evaluating css selectors.
#[derive(Debug, Default, Clone, Copy)]
pub struct CssSelectorEngine;

impl DocumentEngine for CssSelectorEngine {
    type Handle = Html;

    fn parse(&self, body: &str) -> Html {
        Html::parse_document(body)
    }

    fn evaluate(
        &self,
        document: &Html,
        expression: &str,
    ) -> Result<Vec<String>, EvaluationError> {
        let selector = Selector::parse(expression)
            .map_err(|_| EvaluationError::InvalidExpression(expression.to_string()))?;
        Ok(document
            .select(&selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect())
    }
}
