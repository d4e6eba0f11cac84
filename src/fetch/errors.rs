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

use serde::{Deserialize, Serialize};
use strum::Display;

/// Why a single fetch ended without a validated response.
#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, Display,
)]
pub enum FetchErrorCode {
    /// The fetch succeeded.
    #[default]
    #[strum(serialize = "none")]
    None,
    /// The retry budget ran out before any attempt validated.
    #[strum(serialize = "retries exhausted")]
    Exhausted,
    /// The transport failed in a way retrying cannot fix, like an
    /// unreachable proxy.
    #[strum(serialize = "fatal transport failure")]
    TransportFatal,
}

impl FetchErrorCode {
    pub fn as_u8(&self) -> u8 {
        match self {
            FetchErrorCode::None => 0,
            FetchErrorCode::Exhausted => 1,
            FetchErrorCode::TransportFatal => 2,
        }
    }
}
