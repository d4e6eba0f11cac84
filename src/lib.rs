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

//! Muninn is a resilient fetch engine with a replayable history.
//!
//! A fetch is retried against a validation pipeline until it produces a
//! response worth keeping, and every attempt along the way is recorded
//! as an exchange in an append only journal. Compiling the journal
//! seals it into a single compressed artifact.

pub mod client;
pub mod config;
pub mod decoding;
pub mod fetch;
pub mod fetcher;
pub mod fetching;
pub mod history;
pub mod runtime;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_impls;

pub use fetcher::Fetcher;
