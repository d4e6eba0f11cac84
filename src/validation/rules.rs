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

use crate::validation::Comparator;
use serde::{Deserialize, Serialize};

/// The status codes accepted when nothing else is configured.
pub const DEFAULT_ACCEPTED_STATUS_CODES: [u16; 14] = [
    200, 201, 202, 203, 204, 205, 206, 300, 301, 302, 303, 304, 307, 308,
];

/// The rule set deciding success or failure of one completed attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationRules {
    /// Status codes that count as a successful attempt.
    pub accepted_status_codes: Vec<u16>,
    /// Reject responses without a body. (default: true)
    pub reject_null_body: bool,
    /// Reject markup that does not end with the closing tag, ignoring
    /// trailing whitespace. (default: true)
    pub reject_truncated_markup: bool,
    /// The closing tag the body has to end with.
    pub closing_tag: String,
    /// Parse the document even without assertions, so the caller always
    /// receives the handle.
    pub parse_document: bool,
    /// Assertions evaluated against the parsed document, in order.
    pub assertions: Vec<Assertion>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            accepted_status_codes: DEFAULT_ACCEPTED_STATUS_CODES.to_vec(),
            reject_null_body: true,
            reject_truncated_markup: true,
            closing_tag: "</html>".to_string(),
            parse_document: false,
            assertions: Vec::new(),
        }
    }
}

/// One assertion of the rule set: an expression that has to match, with an
/// optional comparator every matched value has to satisfy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assertion {
    pub expression: String,
    /// A human readable description reported when the assertion fails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<Comparator>,
}

impl Assertion {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            error: None,
            comparator: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = Some(comparator);
        self
    }

    /// The failure description of this assertion.
    pub fn describe(&self) -> String {
        match &self.error {
            Some(error) => error.clone(),
            None => format!("assertion failed: {}", self.expression),
        }
    }
}
