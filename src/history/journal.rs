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

use crate::history::errors::HistoryError;
use crate::history::page::{BodyReference, Page, PageDescriptor};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use camino::Utf8PathBuf;
use fs2::FileExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use strum::Display;

/// How the journal is laid out on disk.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JournalLayout {
    /// Everything lives in one append only file that is later sealed in
    /// place and gzipped.
    #[default]
    SingleFile,
    /// Bodies live as loose files next to a small data.json, later
    /// sealed into a tar.gz.
    Directory,
}

/// Where and how the journal is written.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct JournalConfig {
    pub path: Utf8PathBuf,
    #[serde(default)]
    pub layout: JournalLayout,
}

impl JournalConfig {
    pub fn single_file(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            layout: JournalLayout::SingleFile,
        }
    }

    pub fn directory(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            layout: JournalLayout::Directory,
        }
    }
}

/// The bookkeeping record at the end of an open single file journal.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Trailer {
    #[serde(rename = "numPages")]
    pub num_pages: u64,
    #[serde(rename = "idIndices")]
    pub id_indices: IndexMap<String, u64>,
}

pub(crate) const JOURNAL_PREFIX: &[u8] = b"{\"pages\":[";
pub(crate) const EMPTY_DATA_FILE: &[u8] = b"{\"pages\":[]}";
/// Width of the big endian length suffix after the trailer.
pub(crate) const TRAILER_LEN_WIDTH: u64 = 4;

/// The append only page journal.
///
/// Every append takes an exclusive lock on the underlying file, so
/// multiple processes can interleave writes into the same journal.
#[derive(Debug, Clone)]
pub struct Journal {
    path: Utf8PathBuf,
    layout: JournalLayout,
}

impl Journal {
    pub fn open(config: &JournalConfig) -> Self {
        Self {
            path: config.path.clone(),
            layout: config.layout,
        }
    }

    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    pub fn layout(&self) -> JournalLayout {
        self.layout
    }

    /// Appends one page. The descriptor carries the symbolic ids that
    /// are resolved against the journal state under the lock.
    pub fn append(&self, descriptor: &PageDescriptor, page: Page) -> Result<(), HistoryError> {
        match self.layout {
            JournalLayout::SingleFile => self.append_single_file(descriptor, page),
            JournalLayout::Directory => self.append_directory(descriptor, page),
        }
    }

    fn append_single_file(
        &self,
        descriptor: &PageDescriptor,
        page: Page,
    ) -> Result<(), HistoryError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(self.path.as_std_path())?;
        file.lock_exclusive()?;
        let result = self.append_single_file_locked(&mut file, descriptor, page);
        let unlocked = fs2::FileExt::unlock(&file);
        result?;
        unlocked?;
        Ok(())
    }

    fn append_single_file_locked(
        &self,
        file: &mut File,
        descriptor: &PageDescriptor,
        mut page: Page,
    ) -> Result<(), HistoryError> {
        // the size has to be taken again after the lock was acquired
        let size = file.metadata()?.len();
        let (mut trailer, trailer_start) = if size == 0 {
            (Trailer::default(), JOURNAL_PREFIX.len() as u64)
        } else {
            read_trailer_in(file, &self.path, size)?
        };

        // resolve the parent before touching the file, a dangling id
        // must leave the journal byte identical
        if let Some(parent_id) = &descriptor.parent_id {
            match trailer.id_indices.get(parent_id) {
                Some(index) => page.parent_index = Some(*index),
                None => return Err(HistoryError::UnknownParentId(parent_id.clone())),
            }
        }
        let page_index = trailer.num_pages;
        if let Some(id) = &descriptor.id {
            trailer.id_indices.insert(id.clone(), page_index);
        }
        trailer.num_pages += 1;

        if size == 0 {
            file.seek(SeekFrom::Start(0))?;
            file.write_all(JOURNAL_PREFIX)?;
        } else {
            file.seek(SeekFrom::Start(trailer_start))?;
            if page_index > 0 {
                file.write_all(b",")?;
            }
        }
        file.write_all(&serde_json::to_vec(&page)?)?;
        let trailer_bytes = serde_json::to_vec(&trailer)?;
        file.write_all(&trailer_bytes)?;
        file.write_u32::<BigEndian>(trailer_bytes.len() as u32)?;
        let end = file.stream_position()?;
        file.set_len(end)?;
        log::debug!("Appended page {} to {}", page_index, self.path);
        Ok(())
    }

    fn append_directory(
        &self,
        descriptor: &PageDescriptor,
        mut page: Page,
    ) -> Result<(), HistoryError> {
        if descriptor.id.is_some() || descriptor.parent_id.is_some() {
            return Err(HistoryError::IdsUnsupported(self.layout));
        }
        let pages_dir = self.path.join("pages");
        std::fs::create_dir_all(pages_dir.as_std_path())?;
        let data_path = self.path.join("data.json");
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(data_path.as_std_path())?;
        file.lock_exclusive()?;
        let result = self.append_directory_locked(&mut file, descriptor, &mut page, &pages_dir);
        let unlocked = fs2::FileExt::unlock(&file);
        result?;
        unlocked?;
        Ok(())
    }

    fn append_directory_locked(
        &self,
        file: &mut File,
        descriptor: &PageDescriptor,
        page: &mut Page,
        pages_dir: &Utf8PathBuf,
    ) -> Result<(), HistoryError> {
        let mut size = file.metadata()?.len();
        if size == 0 {
            file.write_all(EMPTY_DATA_FILE)?;
            size = EMPTY_DATA_FILE.len() as u64;
        }
        let name_hint = descriptor.name.as_deref().or(page.name.as_deref());
        for (number, exchange) in page.exchanges.iter_mut().enumerate() {
            if let BodyReference::Inline(Some(content)) = &exchange.body {
                let stored = store_body(pages_dir, name_hint, number, content)?;
                exchange.body = BodyReference::File(stored);
            }
        }
        let has_pages = size > EMPTY_DATA_FILE.len() as u64;
        file.seek(SeekFrom::End(-2))?;
        if has_pages {
            file.write_all(b",")?;
        }
        file.write_all(&serde_json::to_vec(&page)?)?;
        file.write_all(b"]}")?;
        let end = file.stream_position()?;
        file.set_len(end)?;
        Ok(())
    }
}

/// Reads the trailer of an open single file journal and returns it with
/// the offset it starts at.
pub(crate) fn read_trailer_in(
    file: &mut File,
    path: &Utf8PathBuf,
    size: u64,
) -> Result<(Trailer, u64), HistoryError> {
    if size < JOURNAL_PREFIX.len() as u64 + TRAILER_LEN_WIDTH {
        return Err(HistoryError::MalformedTrailer(path.clone()));
    }
    file.seek(SeekFrom::End(-(TRAILER_LEN_WIDTH as i64)))?;
    let trailer_len = file.read_u32::<BigEndian>()? as u64;
    if trailer_len + TRAILER_LEN_WIDTH > size {
        return Err(HistoryError::MalformedTrailer(path.clone()));
    }
    let trailer_start = size - TRAILER_LEN_WIDTH - trailer_len;
    file.seek(SeekFrom::Start(trailer_start))?;
    let mut buffer = vec![0u8; trailer_len as usize];
    file.read_exact(&mut buffer)?;
    let trailer = serde_json::from_slice(&buffer)
        .map_err(|_| HistoryError::MalformedTrailer(path.clone()))?;
    Ok((trailer, trailer_start))
}

/// Reads the trailer of an open single file journal.
pub fn read_trailer(path: &Utf8PathBuf) -> Result<Trailer, HistoryError> {
    let mut file = File::open(path.as_std_path())?;
    let size = file.metadata()?.len();
    let (trailer, _) = read_trailer_in(&mut file, path, size)?;
    Ok(trailer)
}

#[derive(Deserialize)]
struct PagesDocument {
    pages: Vec<Page>,
}

/// Reads the pages of an open single file journal by closing the open
/// array in memory.
pub fn read_open_pages(path: &Utf8PathBuf) -> Result<Vec<Page>, HistoryError> {
    let mut file = File::open(path.as_std_path())?;
    let size = file.metadata()?.len();
    let (_, trailer_start) = read_trailer_in(&mut file, path, size)?;
    file.seek(SeekFrom::Start(0))?;
    let mut buffer = vec![0u8; trailer_start as usize];
    file.read_exact(&mut buffer)?;
    buffer.extend_from_slice(b"]}");
    let document: PagesDocument = serde_json::from_slice(&buffer)?;
    Ok(document.pages)
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect()
}

/// Writes a body below the pages directory, deriving a unique file name
/// from the page name.
fn store_body(
    pages_dir: &Utf8PathBuf,
    name_hint: Option<&str>,
    number: usize,
    content: &str,
) -> Result<String, std::io::Error> {
    let base = name_hint
        .map(sanitize_file_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            format!("page-{}", time::OffsetDateTime::now_utc().unix_timestamp())
        });
    let stem = if number > 0 {
        format!("{base}-{number}")
    } else {
        base
    };
    let mut attempt: u32 = 0;
    loop {
        let file_name = if attempt == 0 {
            format!("{stem}.html")
        } else {
            format!("{stem}({attempt}).html")
        };
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(pages_dir.join(&file_name).as_std_path())
        {
            Ok(mut file) => {
                file.write_all(content.as_bytes())?;
                return Ok(file_name);
            }
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{read_open_pages, read_trailer, Journal, JournalConfig, JournalLayout};
    use crate::history::errors::HistoryError;
    use crate::history::page::{BodyReference, Exchange, Page, PageDescriptor};
    use crate::fetching::ResponseMeta;
    use camino::Utf8PathBuf;
    use serde_json::json;

    fn page_with_body(body: &str) -> Page {
        Page {
            exchanges: vec![Exchange::success(
                Some(body.to_string()),
                ResponseMeta {
                    status_code: 200,
                    ..Default::default()
                },
            )],
            ..Default::default()
        }
    }

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn the_trailer_tracks_pages_and_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let journal = Journal::open(&JournalConfig::single_file(path.clone()));

        journal
            .append(
                &PageDescriptor::named("first").with_id("a"),
                page_with_body("<html>1</html>"),
            )
            .unwrap();
        journal
            .append(&PageDescriptor::default(), page_with_body("<html>2</html>"))
            .unwrap();
        journal
            .append(
                &PageDescriptor::named("third").with_id("c"),
                page_with_body("<html>3</html>"),
            )
            .unwrap();

        let trailer = read_trailer(&path).unwrap();
        assert_eq!(3, trailer.num_pages);
        assert_eq!(Some(&0), trailer.id_indices.get("a"));
        assert_eq!(Some(&2), trailer.id_indices.get("c"));

        let pages = read_open_pages(&path).unwrap();
        assert_eq!(3, pages.len());
        assert_eq!(
            BodyReference::Inline(Some("<html>2</html>".to_string())),
            pages[1].exchanges[0].body
        );
    }

    #[test]
    fn parents_resolve_to_indices() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let journal = Journal::open(&JournalConfig::single_file(path.clone()));

        journal
            .append(
                &PageDescriptor::named("login").with_id("login"),
                page_with_body("<html>login</html>"),
            )
            .unwrap();
        journal
            .append(
                &PageDescriptor::named("landing").with_parent("login"),
                page_with_body("<html>landing</html>"),
            )
            .unwrap();

        let pages = read_open_pages(&path).unwrap();
        assert_eq!(Some(0), pages[1].parent_index);
    }

    #[test]
    fn a_dangling_parent_leaves_the_journal_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let journal = Journal::open(&JournalConfig::single_file(path.clone()));

        journal
            .append(&PageDescriptor::default(), page_with_body("<html></html>"))
            .unwrap();
        let size_before = std::fs::metadata(path.as_std_path()).unwrap().len();

        let result = journal.append(
            &PageDescriptor::default().with_parent("never-appended"),
            page_with_body("<html></html>"),
        );
        assert!(matches!(result, Err(HistoryError::UnknownParentId(id)) if id == "never-appended"));

        let size_after = std::fs::metadata(path.as_std_path()).unwrap().len();
        assert_eq!(size_before, size_after);
        assert_eq!(1, read_trailer(&path).unwrap().num_pages);
    }

    #[test]
    fn concurrent_appends_never_lose_a_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let config = JournalConfig::single_file(path.clone());

        let handles: Vec<_> = (0..4)
            .map(|thread| {
                let config = config.clone();
                std::thread::spawn(move || {
                    let journal = Journal::open(&config);
                    for number in 0..5 {
                        journal
                            .append(
                                &PageDescriptor::named(format!("t{thread}-{number}")),
                                page_with_body("<html></html>"),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(20, read_trailer(&path).unwrap().num_pages);
        assert_eq!(20, read_open_pages(&path).unwrap().len());
    }

    #[test]
    fn the_directory_layout_externalizes_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history");
        let journal = Journal::open(&JournalConfig::directory(path.clone()));

        journal
            .append(
                &PageDescriptor::named("landing page"),
                page_with_body("<html>hello</html>"),
            )
            .unwrap();
        journal
            .append(
                &PageDescriptor::named("landing page"),
                page_with_body("<html>again</html>"),
            )
            .unwrap();

        let data = std::fs::read_to_string(path.join("data.json").as_std_path()).unwrap();
        let document: serde_json::Value = serde_json::from_str(&data).unwrap();
        let pages = document["pages"].as_array().unwrap();
        assert_eq!(2, pages.len());
        assert_eq!(json!("landing_page.html"), pages[0]["exchanges"][0]["contentFile"]);
        // the second page dodges the collision
        assert_eq!(
            json!("landing_page(1).html"),
            pages[1]["exchanges"][0]["contentFile"]
        );
        let body =
            std::fs::read_to_string(path.join("pages/landing_page.html").as_std_path()).unwrap();
        assert_eq!("<html>hello</html>", body);
    }

    #[test]
    fn the_directory_layout_rejects_symbolic_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history");
        let journal = Journal::open(&JournalConfig::directory(path.clone()));

        let result = journal.append(
            &PageDescriptor::default().with_id("a"),
            page_with_body("<html></html>"),
        );
        assert!(matches!(
            result,
            Err(HistoryError::IdsUnsupported(JournalLayout::Directory))
        ));
    }
}
