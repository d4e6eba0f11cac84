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

use crate::history::journal::JournalLayout;
use camino::Utf8PathBuf;
use thiserror::Error;

/// All errors of the journal append path.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Serialisation(#[from] serde_json::Error),
    #[error("The trailer of {0} is not readable. The journal is corrupt or was written by something else.")]
    MalformedTrailer(Utf8PathBuf),
    #[error("No page with the id {0:?} was appended before.")]
    UnknownParentId(String),
    #[error("The {0} layout does not support symbolic page ids.")]
    IdsUnsupported(JournalLayout),
}

/// All errors of compiling and inspecting a journal.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Serialisation(#[from] serde_json::Error),
    #[error("The journal at {0} is already sealed.")]
    AlreadySealed(Utf8PathBuf),
    #[error("The trailer of {0} is not readable. The journal is corrupt or was written by something else.")]
    MalformedTrailer(Utf8PathBuf),
    #[error("The archive has no member named {0:?}.")]
    NoSuchMember(String),
    #[error("No journal is attached, nothing to compile.")]
    NoJournal,
}
