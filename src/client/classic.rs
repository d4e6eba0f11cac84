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

use crate::client::{ClientBuildError, Transport, TransportError};
use crate::config::FetchConfig;
use crate::fetching::{FetchRequest, FetchedRequestData, RequestBody};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};

/// The classic reqwest backed transport.
///
/// Connection level options (proxy, cookie jar, certificates, redirect
/// limit) are baked into the client once at build time. Request level
/// options (the header sets and the user agent) are taken from the
/// merged configuration of every call.
#[derive(Debug)]
pub struct ClassicClient {
    inner: reqwest::Client,
    proxy: Option<String>,
}

/// Builds the classic configured client used by the engines.
pub fn build_classic_client(config: &FetchConfig) -> Result<ClassicClient, ClientBuildError> {
    let mut client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .redirect(reqwest::redirect::Policy::limited(config.redirect_limit))
        .gzip(true);

    // The jar itself lives in memory, bootstrapping it from a file is
    // outside of the transport.
    if config.cookie_jar.is_some() {
        client = client.cookie_store(true);
    }

    if let Some(ref proxy) = config.proxy {
        client = client.proxy(reqwest::Proxy::all(proxy)?);
    }

    // unusable instance headers fail at build time, per call headers
    // surface through the transport error instead
    convert_headers(config.get_headers.as_ref())?;
    convert_headers(config.body_headers.as_ref())?;

    Ok(ClassicClient {
        inner: client.build()?,
        proxy: config.proxy.clone(),
    })
}

fn convert_headers(
    headers: Option<&IndexMap<String, String>>,
) -> Result<Option<HeaderMap>, ClientBuildError> {
    let Some(headers) = headers else {
        return Ok(None);
    };
    let mut converted = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ClientBuildError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ClientBuildError::InvalidHeader(value.clone()))?;
        converted.append(name, value);
    }
    Ok(Some(converted))
}

impl ClassicClient {
    /// A transport error through a configured proxy is fatal, everything
    /// else stays retryable.
    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_connect() {
            if let Some(ref proxy) = self.proxy {
                return TransportError::ProxyUnreachable(proxy.clone());
            }
        }
        TransportError::Http(error)
    }

    fn call_headers(
        &self,
        request: &FetchRequest,
        config: &FetchConfig,
    ) -> Result<Option<HeaderMap>, TransportError> {
        let headers = match request.body() {
            RequestBody::None => config.get_headers.as_ref(),
            _ => config.body_headers.as_ref(),
        };
        convert_headers(headers).map_err(|error| match error {
            ClientBuildError::InvalidHeader(header) => TransportError::InvalidHeader(header),
            ClientBuildError::Http(error) => TransportError::Http(error),
        })
    }
}

impl Transport for ClassicClient {
    async fn execute(
        &self,
        request: &FetchRequest,
        config: &FetchConfig,
    ) -> Result<FetchedRequestData, TransportError> {
        let mut builder = self.inner.request(request.method(), request.url().clone());
        if let Some(headers) = self.call_headers(request, config)? {
            builder = builder.headers(headers);
        }
        // the merged user agent of this call wins over the client default
        let agent = HeaderValue::from_str(config.user_agent.as_str())
            .map_err(|_| TransportError::InvalidHeader(config.user_agent.clone()))?;
        builder = builder.header(USER_AGENT, agent);
        builder = match request.body() {
            RequestBody::None => builder,
            RequestBody::Form(form) => builder.form(form),
            RequestBody::Raw(bytes) => builder.body(bytes.clone()),
            RequestBody::Json(value) => builder.json(value),
        };

        let response = builder.send().await.map_err(|err| self.classify(err))?;
        let status_code = response.status();
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let final_url = Some(response.url().to_string());
        let content = response
            .bytes()
            .await
            .map_err(|err| self.classify(err))?;
        Ok(FetchedRequestData {
            content,
            headers: Some(headers),
            status_code,
            content_type,
            final_url,
        })
    }
}
