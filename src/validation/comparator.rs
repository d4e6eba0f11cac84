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

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum::Display;
use thiserror::Error;

/// A comparison operator of the comparator grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CompareOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
}

/// The right hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Text(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(number) => write!(f, "{}", number),
            Operand::Text(text) => write!(f, "\"{}\"", text),
        }
    }
}

/// A small comparator over matched values: a conjunction of comparisons
/// like `>= 3 && < 10`. Numeric operands compare numerically, everything
/// else falls back on string comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparator {
    clauses: Vec<(CompareOp, Operand)>,
}

/// Errors when parsing a comparator expression.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComparatorParseError {
    #[error("The clause '{0}' has no comparison operator!")]
    MissingOperator(String),
    #[error("The comparator is empty!")]
    Empty,
}

impl FromStr for Comparator {
    type Err = ComparatorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut clauses = Vec::new();
        for clause in s.split("&&") {
            let clause = clause.trim();
            if clause.is_empty() {
                return Err(ComparatorParseError::MissingOperator(clause.to_string()));
            }
            // the two character operators have to win over their prefixes
            let (op, rest) = if let Some(rest) = clause.strip_prefix("==") {
                (CompareOp::Eq, rest)
            } else if let Some(rest) = clause.strip_prefix("<=") {
                (CompareOp::Le, rest)
            } else if let Some(rest) = clause.strip_prefix(">=") {
                (CompareOp::Ge, rest)
            } else if let Some(rest) = clause.strip_prefix('<') {
                (CompareOp::Lt, rest)
            } else if let Some(rest) = clause.strip_prefix('>') {
                (CompareOp::Gt, rest)
            } else {
                return Err(ComparatorParseError::MissingOperator(clause.to_string()));
            };
            let raw = rest.trim();
            let operand = match raw.parse::<f64>() {
                Ok(number) => Operand::Number(number),
                Err(_) => Operand::Text(raw.trim_matches('"').to_string()),
            };
            clauses.push((op, operand));
        }
        if clauses.is_empty() {
            return Err(ComparatorParseError::Empty);
        }
        Ok(Self { clauses })
    }
}

impl Comparator {
    /// True if the value satisfies every clause of the conjunction.
    pub fn matches(&self, value: &str) -> bool {
        self.clauses.iter().all(|(op, operand)| match operand {
            Operand::Number(expected) => match value.trim().parse::<f64>() {
                Ok(actual) => compare_number(*op, actual, *expected),
                Err(_) => false,
            },
            Operand::Text(expected) => compare_text(*op, value, expected),
        })
    }
}

fn compare_number(op: CompareOp, actual: f64, expected: f64) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Lt => actual < expected,
        CompareOp::Le => actual <= expected,
        CompareOp::Gt => actual > expected,
        CompareOp::Ge => actual >= expected,
    }
}

fn compare_text(op: CompareOp, actual: &str, expected: &str) -> bool {
    match op {
        CompareOp::Eq => actual == expected,
        CompareOp::Lt => actual < expected,
        CompareOp::Le => actual <= expected,
        CompareOp::Gt => actual > expected,
        CompareOp::Ge => actual >= expected,
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, (op, operand)) in self.clauses.iter().enumerate() {
            if position > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{} {}", op, operand)?;
        }
        Ok(())
    }
}

impl Serialize for Comparator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Comparator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
