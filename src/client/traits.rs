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

use crate::client::TransportError;
use crate::config::FetchConfig;
use crate::fetching::{FetchRequest, FetchedRequestData};

/// The transport capability consumed by the engines. Executes exactly one
/// request and returns the body bytes plus the response metadata.
/// Connection handling, TLS, redirects and proxying happen behind it.
///
/// The configuration passed per call is the merged one of that call, so
/// request level options like the header sets and the user agent follow
/// per call overrides.
pub trait Transport {
    async fn execute(
        &self,
        request: &FetchRequest,
        config: &FetchConfig,
    ) -> Result<FetchedRequestData, TransportError>;
}
