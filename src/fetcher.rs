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

use crate::client::{build_classic_client, ClassicClient, ClientBuildError, Transport};
use crate::config::{FetchConfig, FetchOverrides};
use crate::fetch::{load_multi, load_single, BatchResult, SingleFetchResult};
use crate::fetching::FetchRequest;
use crate::history::{
    compile, CompileError, CompileOptions, HistoryError, Journal, PageDescriptor,
};
use crate::runtime::Cancellation;
use crate::validation::{CssSelectorEngine, DocumentEngine};
use camino::Utf8PathBuf;

/// The facade tying a transport, a document engine, a configuration and
/// an optional journal together.
///
/// The instance journal is opened once from the configuration. A per
/// call override pointing somewhere else gets its own journal for that
/// call only.
pub struct Fetcher<T, E = CssSelectorEngine> {
    transport: T,
    documents: E,
    config: FetchConfig,
    journal: Option<Journal>,
    shutdown: Cancellation,
}

impl Fetcher<ClassicClient, CssSelectorEngine> {
    /// A fetcher backed by the classic reqwest transport and the css
    /// selector document engine.
    pub fn classic(config: FetchConfig) -> Result<Self, ClientBuildError> {
        let transport = build_classic_client(&config)?;
        Ok(Self::with_transport(transport, CssSelectorEngine, config))
    }
}

enum JournalHandle<'a> {
    None,
    Borrowed(&'a Journal),
    Owned(Journal),
}

impl<'a> JournalHandle<'a> {
    fn as_ref(&self) -> Option<&Journal> {
        match self {
            JournalHandle::None => None,
            JournalHandle::Borrowed(journal) => Some(journal),
            JournalHandle::Owned(journal) => Some(journal),
        }
    }
}

impl<T: Transport, E: DocumentEngine> Fetcher<T, E> {
    pub fn with_transport(transport: T, documents: E, config: FetchConfig) -> Self {
        let journal = config.journal.as_ref().map(Journal::open);
        Self {
            transport,
            documents,
            config,
            journal,
            shutdown: Cancellation::new(),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// A handle that interrupts the sleeps of every running engine call.
    pub fn cancellation(&self) -> Cancellation {
        self.shutdown.clone()
    }

    fn merged(&self, overrides: Option<&FetchOverrides>) -> FetchConfig {
        match overrides {
            Some(overrides) => self.config.merged(overrides),
            None => self.config.clone(),
        }
    }

    fn select_journal(&self, merged: &FetchConfig) -> JournalHandle<'_> {
        match (&merged.journal, &self.journal) {
            (None, _) => JournalHandle::None,
            (Some(config), Some(journal))
                if journal.path() == &config.path && journal.layout() == config.layout =>
            {
                JournalHandle::Borrowed(journal)
            }
            (Some(config), _) => JournalHandle::Owned(Journal::open(config)),
        }
    }

    /// Fetches one request with retries, journaling the page when a
    /// journal is configured.
    pub async fn load_single(
        &self,
        request: &FetchRequest,
        descriptor: &PageDescriptor,
        overrides: Option<&FetchOverrides>,
    ) -> Result<SingleFetchResult<E::Handle>, HistoryError> {
        let merged = self.merged(overrides);
        let journal = self.select_journal(&merged);
        load_single(
            &self.transport,
            &self.documents,
            &merged,
            request,
            descriptor,
            journal.as_ref(),
            &self.shutdown,
        )
        .await
    }

    /// Fetches a batch of requests in concurrent passes. Batches are
    /// never journaled.
    pub async fn load_multi(
        &self,
        requests: Vec<FetchRequest>,
        overrides: Option<&FetchOverrides>,
    ) -> BatchResult {
        let merged = self.merged(overrides);
        load_multi(
            &self.transport,
            &self.documents,
            &merged,
            requests,
            &self.shutdown,
        )
        .await
    }

    /// Seals the instance journal into its final artifact. The fetcher
    /// keeps working afterwards, just without a journal.
    pub fn compile_journal(
        &mut self,
        options: CompileOptions,
    ) -> Result<Utf8PathBuf, CompileError> {
        let journal = self.journal.take().ok_or(CompileError::NoJournal)?;
        compile(journal, options)
    }
}
