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

use crate::fetching::{FetchedRequestData, ResponseData, ResponseMeta};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use flate2::read::MultiGzDecoder;
use std::io::{self, Read};
use thiserror::Error;

/// The first two bytes of a gzip stream.
pub(crate) const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// An error while decoding a response body.
#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("Failed to gunzip the response body: {0}")]
    Gzip(#[from] io::Error),
}

/// Normalises a raw response before any validation rule sees it.
///
/// A body starting with the gzip magic number is transparently decoded,
/// even when the transport already negotiated an encoding, since some
/// servers send gzip without declaring it. The charset is normalised to
/// utf-8 when the content type does not already claim it, preferring the
/// declared charset and falling back on detection.
pub fn decode_response(raw: FetchedRequestData) -> Result<ResponseData, DecodingError> {
    let meta = ResponseMeta::from_fetched(&raw);
    let mut bytes = raw.content.to_vec();
    if bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC {
        let mut decoded = Vec::new();
        MultiGzDecoder::new(bytes.as_slice()).read_to_end(&mut decoded)?;
        bytes = decoded;
    }
    if bytes.is_empty() {
        return Ok(ResponseData {
            content: None,
            meta,
        });
    }
    let content = if declares_utf8(meta.content_type.as_deref()) {
        String::from_utf8_lossy(&bytes).into_owned()
    } else {
        let encoding = declared_encoding(meta.content_type.as_deref())
            .unwrap_or_else(|| detect_encoding(&bytes));
        let (text, _, _) = encoding.decode(&bytes);
        text.into_owned()
    };
    Ok(ResponseData {
        content: Some(content),
        meta,
    })
}

fn declares_utf8(content_type: Option<&str>) -> bool {
    content_type
        .map(|value| value.to_ascii_lowercase().contains("utf-8"))
        .unwrap_or(false)
}

/// Extracts the charset parameter of a content type header value.
fn declared_encoding(content_type: Option<&str>) -> Option<&'static Encoding> {
    let lower = content_type?.to_ascii_lowercase();
    let charset = lower
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("charset="))
        .next()?;
    Encoding::for_label_no_replacement(charset.trim_matches('"').as_bytes())
}

fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

#[cfg(test)]
mod test {
    use super::decode_response;
    use crate::fetching::FetchedRequestData;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn raw(content: Vec<u8>, content_type: Option<&str>) -> FetchedRequestData {
        FetchedRequestData {
            content: content.into(),
            content_type: content_type.map(str::to_string),
            ..Default::default()
        }
    }

    fn gzipped(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn sniffs_the_gzip_magic_number() {
        let response = decode_response(raw(
            gzipped(b"<html>hi</html>"),
            Some("text/html; charset=utf-8"),
        ))
        .unwrap();
        assert_eq!(Some("<html>hi</html>".to_string()), response.content);
    }

    #[test]
    fn empty_bodies_become_none() {
        let response = decode_response(raw(Vec::new(), None)).unwrap();
        assert_eq!(None, response.content);
    }

    #[test]
    fn normalises_a_declared_charset() {
        // "häh" in latin-1
        let response = decode_response(raw(
            vec![b'h', 0xe4, b'h'],
            Some("text/html; charset=iso-8859-1"),
        ))
        .unwrap();
        assert_eq!(Some("häh".to_string()), response.content);
    }

    #[test]
    fn detects_when_nothing_is_declared() {
        let response = decode_response(raw(b"just ascii".to_vec(), Some("text/html"))).unwrap();
        assert_eq!(Some("just ascii".to_string()), response.content);
    }

    #[test]
    fn utf8_stays_untouched() {
        let response = decode_response(raw(
            "grüße".as_bytes().to_vec(),
            Some("text/html; charset=UTF-8"),
        ))
        .unwrap();
        assert_eq!(Some("grüße".to_string()), response.content);
    }

    #[test]
    fn broken_gzip_is_an_error() {
        let mut bytes = gzipped(b"payload");
        bytes.truncate(6);
        assert!(decode_response(raw(bytes, None)).is_err());
    }
}
