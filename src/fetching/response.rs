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

use bytes::Bytes;
use indexmap::IndexMap;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// The raw result of one transport execution, before any decoding.
#[derive(Debug, Default)]
pub struct FetchedRequestData {
    /// The undecoded body bytes.
    pub content: Bytes,
    /// The headers of the response.
    pub headers: Option<HeaderMap>,
    /// The status code of the request.
    pub status_code: StatusCode,
    /// The content type declared by the server.
    pub content_type: Option<String>,
    /// The final url destination after any redirects.
    pub final_url: Option<String>,
}

/// The response metadata echoed to the caller and recorded in the journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseMeta {
    #[serde(rename = "http_code")]
    pub status_code: u16,
    pub content_type: Option<String>,
    /// The effective url after resolving all redirects.
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
}

impl ResponseMeta {
    pub fn from_fetched(data: &FetchedRequestData) -> Self {
        let headers = data
            .headers
            .as_ref()
            .map(|headers| {
                headers
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            status_code: data.status_code.as_u16(),
            content_type: data.content_type.clone(),
            url: data.final_url.clone(),
            headers,
        }
    }
}

/// A response after gzip and charset normalisation, ready for validation.
#[derive(Debug)]
pub struct ResponseData {
    /// The normalised body. None if the server sent nothing.
    pub content: Option<String>,
    pub meta: ResponseMeta,
}
