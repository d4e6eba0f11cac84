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
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// The body of a fetch request. The encodings are mutually exclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum RequestBody {
    /// No body at all.
    #[default]
    None,
    /// Key value form data, sent urlencoded.
    Form(IndexMap<String, String>),
    /// Raw bytes, sent as is.
    Raw(Bytes),
    /// A json value.
    Json(Value),
}

impl RequestBody {
    pub fn is_none(&self) -> bool {
        matches!(self, RequestBody::None)
    }
}

/// A single logical request. Immutable once an attempt starts.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    url: Url,
    method: Option<Method>,
    body: RequestBody,
}

impl FetchRequest {
    /// A request without a body.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: None,
            body: RequestBody::None,
        }
    }

    /// A request carrying urlencoded form data.
    pub fn form(url: Url, form: IndexMap<String, String>) -> Self {
        Self {
            url,
            method: None,
            body: RequestBody::Form(form),
        }
    }

    /// A request carrying a raw body.
    pub fn raw(url: Url, body: Bytes) -> Self {
        Self {
            url,
            method: None,
            body: RequestBody::Raw(body),
        }
    }

    /// A request carrying a json body.
    pub fn json(url: Url, body: Value) -> Self {
        Self {
            url,
            method: None,
            body: RequestBody::Json(body),
        }
    }

    /// Overrides the implied method, e.g. for PUT with a raw body.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// GET is implied by the absence of a body, otherwise POST, unless a
    /// method was set explicitly.
    pub fn method(&self) -> Method {
        match &self.method {
            Some(method) => method.clone(),
            None => {
                if self.body.is_none() {
                    Method::GET
                } else {
                    Method::POST
                }
            }
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// The form data recorded in the journal page for this request, if any.
    pub fn form_data(&self) -> Option<&IndexMap<String, String>> {
        match &self.body {
            RequestBody::Form(form) => Some(form),
            _ => None,
        }
    }
}
