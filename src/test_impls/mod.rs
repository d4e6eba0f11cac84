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

//! Test doubles shared by the engine tests.

use crate::client::{Transport, TransportError};
use crate::config::FetchConfig;
use crate::fetching::{FetchRequest, FetchedRequestData};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub type Reply = Box<dyn Fn() -> Result<FetchedRequestData, TransportError> + Send + Sync>;

/// A transport that replays scripted replies instead of touching the
/// network. Replies are consumed per url in order, the last one of a
/// script repeats forever.
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    seen_configs: Mutex<Vec<FetchConfig>>,
}

impl ScriptedTransport {
    /// Every request gets this reply.
    pub fn always(reply: Reply) -> Self {
        Self::sequence(vec![reply])
    }

    /// Requests without a url script consume this sequence.
    pub fn sequence(replies: Vec<Reply>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            seen_configs: Mutex::new(Vec::new()),
        }
    }

    /// Scripts the replies of one url.
    pub fn on(self, url: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    /// How many requests were executed in total.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The merged configurations every executed request arrived with, in
    /// call order.
    pub fn seen_configs(&self) -> Vec<FetchConfig> {
        self.seen_configs.lock().unwrap().clone()
    }

    fn next_reply(queue: &mut VecDeque<Reply>) -> Result<FetchedRequestData, TransportError> {
        if queue.len() > 1 {
            let reply = queue.pop_front().unwrap();
            reply()
        } else {
            queue.front().expect("the script ran dry")()
        }
    }

    pub fn html_ok(body: &str) -> Reply {
        Self::status(200, body)
    }

    pub fn status(code: u16, body: &str) -> Reply {
        let body = body.to_string();
        Box::new(move || {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, "text/html; charset=utf-8".parse().unwrap());
            Ok(FetchedRequestData {
                content: Bytes::from(body.clone()),
                headers: Some(headers),
                status_code: StatusCode::from_u16(code).unwrap(),
                content_type: Some("text/html; charset=utf-8".to_string()),
                final_url: None,
            })
        })
    }

    /// A 200 whose body arrives gzip compressed.
    pub fn gzipped_html(body: &str) -> Reply {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());
        Box::new(move || {
            Ok(FetchedRequestData {
                content: compressed.clone(),
                headers: None,
                status_code: StatusCode::OK,
                content_type: Some("text/html".to_string()),
                final_url: None,
            })
        })
    }

    pub fn proxy_down() -> Reply {
        Box::new(|| Err(TransportError::ProxyUnreachable("127.0.0.1:8888".to_string())))
    }
}

impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: &FetchRequest,
        config: &FetchConfig,
    ) -> Result<FetchedRequestData, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_configs.lock().unwrap().push(config.clone());
        let url = request.url().as_str().to_string();
        let mut scripts = self.scripts.lock().unwrap();
        if let Some(queue) = scripts.get_mut(&url) {
            return Self::next_reply(queue);
        }
        drop(scripts);
        Self::next_reply(&mut self.fallback.lock().unwrap())
    }
}

// lets a test keep its handle on the transport while a fetcher owns the
// reference
impl Transport for &ScriptedTransport {
    async fn execute(
        &self,
        request: &FetchRequest,
        config: &FetchConfig,
    ) -> Result<FetchedRequestData, TransportError> {
        ScriptedTransport::execute(self, request, config).await
    }
}
