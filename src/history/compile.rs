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

use crate::decoding::GZIP_MAGIC;
use crate::history::errors::{CompileError, HistoryError};
use crate::history::journal::{read_trailer_in, Journal, JournalLayout};
use camino::Utf8PathBuf;
use flate2::read::{GzDecoder, MultiGzDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::Command;

/// How a journal is sealed.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// The path of the produced artifact. Defaults to the journal path
    /// with .gz (single file) or .tar.gz (directory) appended.
    pub output: Option<Utf8PathBuf>,
    /// Arbitrary json stored next to the pages.
    pub custom_data: Option<Value>,
    /// Keep the open journal around after sealing.
    pub keep_sources: bool,
}

/// Seals a journal and compresses it into its final artifact. Returns
/// the path of the artifact.
///
/// Sealing a single file journal replaces the trailer with the closing
/// of the pages array, so the result is one plain json document. A
/// sealed journal is detected and refused, compiling is not idempotent
/// by re-running but by already being done.
pub fn compile(journal: Journal, options: CompileOptions) -> Result<Utf8PathBuf, CompileError> {
    match journal.layout() {
        JournalLayout::SingleFile => compile_single_file(journal.path(), options),
        JournalLayout::Directory => compile_directory(journal.path(), options),
    }
}

fn compile_single_file(
    path: &Utf8PathBuf,
    options: CompileOptions,
) -> Result<Utf8PathBuf, CompileError> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path.as_std_path())?;
    file.lock_exclusive()?;
    let result = seal_single_file_locked(&mut file, path, options.custom_data.as_ref());
    let unlocked = fs2::FileExt::unlock(&file);
    result?;
    unlocked?;
    drop(file);

    let output = options
        .output
        .unwrap_or_else(|| Utf8PathBuf::from(format!("{path}.gz")));
    compress_file(path, &output, options.keep_sources)?;
    log::info!("Compiled {} into {}", path, output);
    Ok(output)
}

fn seal_single_file_locked(
    file: &mut File,
    path: &Utf8PathBuf,
    custom_data: Option<&Value>,
) -> Result<(), CompileError> {
    let size = file.metadata()?.len();
    let mut magic = [0u8; 2];
    if size >= 2 {
        file.read_exact(&mut magic)?;
        if magic == GZIP_MAGIC {
            return Err(CompileError::AlreadySealed(path.clone()));
        }
    }
    let trailer_start = match read_trailer_in(file, path, size) {
        Ok((_, trailer_start)) => trailer_start,
        Err(HistoryError::MalformedTrailer(_)) => {
            // a sealed but uncompressed journal ends in a plain `}`
            if size > 0 {
                file.seek(SeekFrom::End(-1))?;
                let mut last = [0u8; 1];
                file.read_exact(&mut last)?;
                if last == *b"}" {
                    return Err(CompileError::AlreadySealed(path.clone()));
                }
            }
            return Err(CompileError::MalformedTrailer(path.clone()));
        }
        Err(HistoryError::IO(error)) => return Err(CompileError::IO(error)),
        Err(error) => {
            return Err(CompileError::IO(std::io::Error::other(error.to_string())))
        }
    };
    file.seek(SeekFrom::Start(trailer_start))?;
    file.write_all(b"]")?;
    if let Some(data) = custom_data {
        file.write_all(b",\"customData\":")?;
        file.write_all(&serde_json::to_vec(data)?)?;
    }
    file.write_all(b"}")?;
    let end = file.stream_position()?;
    file.set_len(end)?;
    Ok(())
}

/// Gzips the input into the output. Prefers the external gzip binary
/// and falls back to compressing in process.
fn compress_file(
    input: &Utf8PathBuf,
    output: &Utf8PathBuf,
    keep_sources: bool,
) -> Result<(), CompileError> {
    let mut command = Command::new("gzip");
    command.arg("-f").arg("-q");
    if keep_sources {
        command.arg("-k");
    }
    command.arg(input.as_str());
    if let Ok(status) = command.status() {
        if status.success() {
            let produced = Utf8PathBuf::from(format!("{input}.gz"));
            if &produced != output {
                std::fs::rename(produced.as_std_path(), output.as_std_path())?;
            }
            return Ok(());
        }
    }
    log::debug!("No usable external gzip, compressing {} in process", input);
    let mut reader = File::open(input.as_std_path())?;
    let writer = File::create(output.as_std_path())?;
    let mut encoder = GzEncoder::new(writer, Compression::default());
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;
    drop(reader);
    if !keep_sources {
        std::fs::remove_file(input.as_std_path())?;
    }
    Ok(())
}

fn compile_directory(
    path: &Utf8PathBuf,
    options: CompileOptions,
) -> Result<Utf8PathBuf, CompileError> {
    let data_path = path.join("data.json");
    if !data_path.as_std_path().is_file() {
        return Err(CompileError::AlreadySealed(path.clone()));
    }
    if let Some(data) = &options.custom_data {
        std::fs::write(
            path.join("customData.json").as_std_path(),
            serde_json::to_vec(data)?,
        )?;
    }
    let output = options
        .output
        .unwrap_or_else(|| Utf8PathBuf::from(format!("{path}.tar.gz")));
    let writer = File::create(output.as_std_path())?;
    let encoder = GzEncoder::new(writer, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive.append_path_with_name(data_path.as_std_path(), "data.json")?;
    let custom_path = path.join("customData.json");
    if custom_path.as_std_path().is_file() {
        archive.append_path_with_name(custom_path.as_std_path(), "customData.json")?;
    }
    let pages_dir = path.join("pages");
    if pages_dir.as_std_path().is_dir() {
        archive.append_dir_all("pages", pages_dir.as_std_path())?;
    }
    archive.into_inner()?.finish()?;
    if !options.keep_sources {
        std::fs::remove_dir_all(path.as_std_path())?;
    }
    log::info!("Compiled {} into {}", path, output);
    Ok(output)
}

/// Key figures of a compiled artifact.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ArchiveInfo {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub file_count: u64,
}

fn is_tar_archive(path: &Utf8PathBuf) -> bool {
    let name = path.as_str();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Inspects a compiled artifact without unpacking it to disk.
pub fn archive_info(path: &Utf8PathBuf) -> Result<ArchiveInfo, CompileError> {
    let compressed_size = std::fs::metadata(path.as_std_path())?.len();
    if is_tar_archive(path) {
        let file = File::open(path.as_std_path())?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        let mut uncompressed_size = 0;
        let mut file_count = 0;
        for entry in archive.entries()? {
            let entry = entry?;
            if entry.header().entry_type().is_file() {
                uncompressed_size += entry.size();
                file_count += 1;
            }
        }
        Ok(ArchiveInfo {
            compressed_size,
            uncompressed_size,
            file_count,
        })
    } else {
        let file = File::open(path.as_std_path())?;
        let mut decoder = MultiGzDecoder::new(file);
        let uncompressed_size = std::io::copy(&mut decoder, &mut std::io::sink())?;
        Ok(ArchiveInfo {
            compressed_size,
            uncompressed_size,
            file_count: 1,
        })
    }
}

/// Extracts one member of a compiled artifact into memory. For a plain
/// gzipped journal the only member is the document itself.
pub fn extract_one(path: &Utf8PathBuf, member: &str) -> Result<Vec<u8>, CompileError> {
    if is_tar_archive(path) {
        let file = File::open(path.as_std_path())?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.path()?.to_string_lossy() == member {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer)?;
                return Ok(buffer);
            }
        }
        Err(CompileError::NoSuchMember(member.to_string()))
    } else {
        let file = File::open(path.as_std_path())?;
        let mut decoder = MultiGzDecoder::new(file);
        let mut buffer = Vec::new();
        decoder.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// Decompresses a sealed single file artifact and parses the document.
pub fn read_sealed_document(path: &Utf8PathBuf) -> Result<Value, CompileError> {
    let file = File::open(path.as_std_path())?;
    let mut decoder = MultiGzDecoder::new(file);
    let mut buffer = Vec::new();
    decoder.read_to_end(&mut buffer)?;
    Ok(serde_json::from_slice(&buffer)?)
}

#[cfg(test)]
mod test {
    use super::{archive_info, compile, extract_one, read_sealed_document, CompileOptions};
    use crate::history::errors::CompileError;
    use crate::history::journal::{Journal, JournalConfig};
    use crate::history::page::{Exchange, Page, PageDescriptor};
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
    fn compiling_closes_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let journal = Journal::open(&JournalConfig::single_file(path.clone()));
        journal
            .append(&PageDescriptor::default(), page_with_body("<html>a</html>"))
            .unwrap();
        journal
            .append(&PageDescriptor::default(), page_with_body("<html>b</html>"))
            .unwrap();

        let artifact = compile(
            journal,
            CompileOptions {
                custom_data: Some(json!({"k": 1})),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(temp_path(&dir, "history.json.gz"), artifact);
        // the open journal is gone
        assert!(!path.as_std_path().exists());

        let document = read_sealed_document(&artifact).unwrap();
        assert_eq!(json!({"k": 1}), document["customData"]);
        let pages = document["pages"].as_array().unwrap();
        assert_eq!(2, pages.len());
        assert_eq!(json!("<html>a</html>"), pages[0]["exchanges"][0]["content"]);
        assert_eq!(json!("<html>b</html>"), pages[1]["exchanges"][0]["content"]);
    }

    #[test]
    fn a_sealed_journal_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let journal = Journal::open(&JournalConfig::single_file(path.clone()));
        journal
            .append(&PageDescriptor::default(), page_with_body("<html></html>"))
            .unwrap();
        let artifact = compile(journal, CompileOptions::default()).unwrap();

        let sealed = Journal::open(&JournalConfig::single_file(artifact));
        let result = compile(sealed, CompileOptions::default());
        assert!(matches!(result, Err(CompileError::AlreadySealed(_))));
    }

    #[test]
    fn compiling_a_directory_produces_a_tar() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history");
        let journal = Journal::open(&JournalConfig::directory(path.clone()));
        journal
            .append(
                &PageDescriptor::named("landing"),
                page_with_body("<html>hello</html>"),
            )
            .unwrap();

        let artifact = compile(
            journal,
            CompileOptions {
                custom_data: Some(json!([1, 2])),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(temp_path(&dir, "history.tar.gz"), artifact);
        // the sources were deleted
        assert!(!path.as_std_path().exists());

        let info = archive_info(&artifact).unwrap();
        assert_eq!(3, info.file_count);

        let body = extract_one(&artifact, "pages/landing.html").unwrap();
        assert_eq!(b"<html>hello</html>".as_slice(), body.as_slice());
        let custom = extract_one(&artifact, "customData.json").unwrap();
        assert_eq!(json!([1, 2]), serde_json::from_slice::<serde_json::Value>(&custom).unwrap());

        let missing = extract_one(&artifact, "pages/other.html");
        assert!(matches!(missing, Err(CompileError::NoSuchMember(_))));
    }

    #[test]
    fn keep_sources_leaves_the_journal_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "history.json");
        let journal = Journal::open(&JournalConfig::single_file(path.clone()));
        journal
            .append(&PageDescriptor::default(), page_with_body("<html></html>"))
            .unwrap();

        compile(
            journal,
            CompileOptions {
                keep_sources: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(path.as_std_path().exists());
        assert!(temp_path(&dir, "history.json.gz").as_std_path().exists());
    }
}
