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

use thiserror::Error;

/// Errors of the transport capability.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The configured proxy is mandatory but can not be reached.
    #[error("The mandatory proxy {0} is unreachable!")]
    ProxyUnreachable(String),
    /// A configured header of this call is not a valid header.
    #[error("The header '{0}' is not a valid header!")]
    InvalidHeader(String),
}

impl TransportError {
    /// True if no amount of retrying can help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::ProxyUnreachable(_) | TransportError::InvalidHeader(_)
        )
    }
}

/// Errors when building the classic client from a configuration.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("The header '{0}' is not a valid header!")]
    InvalidHeader(String),
}
