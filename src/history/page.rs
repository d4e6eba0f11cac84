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

use crate::fetching::ResponseMeta;
use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Caller supplied description of a page written to the journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageDescriptor {
    /// A name shown in the history viewer, also used as the file name
    /// hint of the directory layout.
    pub name: Option<String>,
    /// A symbolic id other pages can later refer to as their parent.
    pub id: Option<String>,
    /// The symbolic id of the parent page. Resolved to an index at write
    /// time; referring to an id that was never appended is a contract
    /// violation, not a retryable condition.
    pub parent_id: Option<String>,
    /// Arbitrary json attached to the page.
    pub custom_data: Option<Value>,
}

impl PageDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_custom_data(mut self, custom_data: Value) -> Self {
        self.custom_data = Some(custom_data);
        self
    }
}

/// Where the body of an exchange lives: inline in the journal or in a
/// sibling file of the directory layout.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyReference {
    Inline(Option<String>),
    File(String),
}

/// One recorded request & response attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub body: BodyReference,
    pub headers: Option<ResponseMeta>,
    /// None if the attempt succeeded, otherwise the failure reason.
    pub error: Option<String>,
}

impl Exchange {
    pub fn success(content: Option<String>, meta: ResponseMeta) -> Self {
        Self {
            body: BodyReference::Inline(content),
            headers: Some(meta),
            error: None,
        }
    }

    pub fn failure(
        content: Option<String>,
        meta: Option<ResponseMeta>,
        reason: String,
    ) -> Self {
        Self {
            body: BodyReference::Inline(content),
            headers: meta,
            error: Some(reason),
        }
    }
}

// The on disk shape predates this crate: the error field is `false` on
// success and the reason string otherwise, and the body key switches to
// "contentFile" in the directory layout.
impl Serialize for Exchange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut exchange = serializer.serialize_struct("Exchange", 3)?;
        match &self.body {
            BodyReference::Inline(content) => exchange.serialize_field("content", content)?,
            BodyReference::File(name) => exchange.serialize_field("contentFile", name)?,
        }
        exchange.serialize_field("headers", &self.headers)?;
        match &self.error {
            Some(reason) => exchange.serialize_field("error", reason)?,
            None => exchange.serialize_field("error", &false)?,
        }
        exchange.end()
    }
}

#[derive(Deserialize)]
struct ExchangeRepr {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "contentFile")]
    content_file: Option<String>,
    #[serde(default)]
    headers: Option<ResponseMeta>,
    #[serde(default)]
    error: Option<Value>,
}

impl<'de> Deserialize<'de> for Exchange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = ExchangeRepr::deserialize(deserializer)?;
        let body = match repr.content_file {
            Some(name) => BodyReference::File(name),
            None => BodyReference::Inline(repr.content),
        };
        let error = match repr.error {
            None | Some(Value::Null) | Some(Value::Bool(false)) => None,
            Some(Value::String(reason)) => Some(reason),
            Some(other) => {
                return Err(D::Error::custom(format!(
                    "expected false or a reason string as error, got {}",
                    other
                )))
            }
        };
        Ok(Exchange {
            body,
            headers: repr.headers,
            error,
        })
    }
}

/// The full record of one logical fetch, including every retried exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// The submitted form data. Null for requests without a form body.
    #[serde(rename = "formData", default)]
    pub form_data: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The resolved index of the parent page within the journal. Never a
    /// dangling forward reference.
    #[serde(rename = "parentIndex", default, skip_serializing_if = "Option::is_none")]
    pub parent_index: Option<u64>,
    #[serde(rename = "customData", default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
    pub exchanges: Vec<Exchange>,
}

#[cfg(test)]
mod test {
    use super::{BodyReference, Exchange, Page};
    use crate::fetching::ResponseMeta;
    use serde_json::json;

    #[test]
    fn a_successful_exchange_serialises_error_false() {
        let exchange = Exchange::success(
            Some("<html></html>".to_string()),
            ResponseMeta {
                status_code: 200,
                ..Default::default()
            },
        );
        let encoded = serde_json::to_value(&exchange).unwrap();
        assert_eq!(
            json!({
                "content": "<html></html>",
                "headers": {"http_code": 200, "content_type": null, "url": null},
                "error": false
            }),
            encoded
        );
    }

    #[test]
    fn a_failed_exchange_serialises_the_reason() {
        let exchange = Exchange::failure(None, None, "HTTP code 404".to_string());
        let encoded = serde_json::to_value(&exchange).unwrap();
        assert_eq!(
            json!({"content": null, "headers": null, "error": "HTTP code 404"}),
            encoded
        );
    }

    #[test]
    fn exchanges_round_trip() {
        let exchange = Exchange::failure(
            Some("partial".to_string()),
            Some(ResponseMeta {
                status_code: 200,
                ..Default::default()
            }),
            "Cut off HTML".to_string(),
        );
        let encoded = serde_json::to_string(&exchange).unwrap();
        let decoded: Exchange = serde_json::from_str(&encoded).unwrap();
        assert_eq!(exchange, decoded);
    }

    #[test]
    fn file_references_use_their_own_key() {
        let exchange = Exchange {
            body: BodyReference::File("landing.html".to_string()),
            headers: None,
            error: None,
        };
        let encoded = serde_json::to_value(&exchange).unwrap();
        assert_eq!(
            json!({"contentFile": "landing.html", "headers": null, "error": false}),
            encoded
        );
        let decoded: Exchange = serde_json::from_value(encoded).unwrap();
        assert_eq!(exchange, decoded);
    }

    #[test]
    fn pages_only_write_the_optional_keys_when_set() {
        let page = Page {
            exchanges: vec![],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&page).unwrap();
        assert_eq!(json!({"formData": null, "exchanges": []}), encoded);

        let page = Page {
            name: Some("login".to_string()),
            parent_index: Some(3),
            custom_data: Some(json!({"k": 1})),
            ..Default::default()
        };
        let encoded = serde_json::to_value(&page).unwrap();
        assert_eq!(
            json!({
                "formData": null,
                "name": "login",
                "parentIndex": 3,
                "customData": {"k": 1},
                "exchanges": []
            }),
            encoded
        );
    }
}
