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

use crate::history::JournalConfig;
use crate::validation::ValidationRules;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use time::Duration;

/// The complete, immutable configuration of the fetch engines.
///
/// There is no hidden instance state: a configuration is built once by
/// layering defaults, instance values and per call overrides and then
/// passed explicitly into every engine call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Max amount of retries before a single fetch gives up. (default: 40)
    pub max_fruitless_retries: u32,
    /// Sleep between two attempts of a single fetch. (default: 10s)
    pub inter_retry_delay: Duration,
    /// Bound of the concurrent requests within one batch pass. (default: 100)
    pub max_concurrent: usize,
    /// Consecutive passes without a single success before a batch gives
    /// up on the remaining requests. (default: 40)
    pub max_fruitless_passes: u32,
    /// Sleep after a fruitless pass. (default: 10s)
    pub inter_pass_delay: Duration,
    /// The rules deciding success or failure of one attempt.
    pub validation: ValidationRules,
    /// Headers sent on requests without a body.
    pub get_headers: Option<IndexMap<String, String>>,
    /// Headers sent on requests with a body.
    pub body_headers: Option<IndexMap<String, String>>,
    /// Proxy used for every request. A connect failure through a
    /// configured proxy is fatal and not retried. Connection level, so
    /// fixed once the transport is built.
    pub proxy: Option<String>,
    /// Path of a cookie jar. Enables the cookie store of the client.
    /// Connection level, fixed once the transport is built.
    pub cookie_jar: Option<Utf8PathBuf>,
    /// The user agent sent with every request.
    pub user_agent: String,
    /// Dangerously accept invalid certificates.
    pub accept_invalid_certs: bool,
    /// The max redirections allowed for a request. (default: 5)
    pub redirect_limit: usize,
    /// Appends every page to this journal when set.
    pub journal: Option<JournalConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_fruitless_retries: 40,
            inter_retry_delay: Duration::seconds(10),
            max_concurrent: 100,
            max_fruitless_passes: 40,
            inter_pass_delay: Duration::seconds(10),
            validation: ValidationRules::default(),
            get_headers: None,
            body_headers: None,
            proxy: None,
            cookie_jar: None,
            user_agent: concat!("muninn/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
            redirect_limit: 5,
            journal: None,
        }
    }
}

/// Per call overrides, merged key by key over a base configuration. The
/// override wins for every key that is set.
///
/// Connection level options (proxy, cookie jar, certificates, redirect
/// limit) have no override here: they are baked into the transport when
/// it is built and a per call value could not reach the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchOverrides {
    pub max_fruitless_retries: Option<u32>,
    pub inter_retry_delay: Option<Duration>,
    pub max_concurrent: Option<usize>,
    pub max_fruitless_passes: Option<u32>,
    pub inter_pass_delay: Option<Duration>,
    pub validation: Option<ValidationRules>,
    pub get_headers: Option<IndexMap<String, String>>,
    pub body_headers: Option<IndexMap<String, String>>,
    pub user_agent: Option<String>,
    pub journal: Option<JournalConfig>,
}

impl FetchConfig {
    /// Returns a new configuration with every set override applied over
    /// this one.
    pub fn merged(&self, overrides: &FetchOverrides) -> FetchConfig {
        let mut merged = self.clone();
        if let Some(value) = overrides.max_fruitless_retries {
            merged.max_fruitless_retries = value;
        }
        if let Some(value) = overrides.inter_retry_delay {
            merged.inter_retry_delay = value;
        }
        if let Some(value) = overrides.max_concurrent {
            merged.max_concurrent = value;
        }
        if let Some(value) = overrides.max_fruitless_passes {
            merged.max_fruitless_passes = value;
        }
        if let Some(value) = overrides.inter_pass_delay {
            merged.inter_pass_delay = value;
        }
        if let Some(value) = &overrides.validation {
            merged.validation = value.clone();
        }
        if let Some(value) = &overrides.get_headers {
            merged.get_headers = Some(value.clone());
        }
        if let Some(value) = &overrides.body_headers {
            merged.body_headers = Some(value.clone());
        }
        if let Some(value) = &overrides.user_agent {
            merged.user_agent = value.clone();
        }
        if let Some(value) = &overrides.journal {
            merged.journal = Some(value.clone());
        }
        merged
    }
}
