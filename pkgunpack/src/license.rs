//! zRIF license tokens.
//!
//! A zRIF is a base64 encoded zlib stream that inflates to the 512-byte
//! license file. Tokens produced by the usual tooling are compressed
//! against a preset dictionary, embedded as `resources/zrif_dict.bin`.
//! A dictionary file given at runtime takes its place.

use crate::{error::PkgError, util::c_str};
use base64::{engine::general_purpose, Engine as _};
use flate2::{Decompress, FlushDecompress, Status};
use once_cell::sync::Lazy;
use std::fmt;

pub const LICENSE_SIZE: usize = 512;
pub const ZRIF_DICT_PATH: &str = "zrif_dict.bin";

static EMBEDDED_DICT: Lazy<Option<Vec<u8>>> = Lazy::new(|| {
    let dictionary = crate::Resources::get(ZRIF_DICT_PATH)
        .map(|raw| raw.into_owned())
        .filter(|raw| !raw.is_empty());
    if dictionary.is_none() {
        log::debug!("No embedded {}", ZRIF_DICT_PATH);
    }
    dictionary
});

const CONTENT_ID_RANGE: std::ops::Range<usize> = 0x10..0x40;

#[derive(Clone)]
pub struct License {
    blob: Vec<u8>,
}

impl fmt::Debug for License {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("License")
            .field("content_id", &String::from_utf8_lossy(self.content_id()))
            .finish()
    }
}

impl License {
    /// Shorter input is zero padded to [`LICENSE_SIZE`].
    pub fn from_bytes(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() > LICENSE_SIZE {
            return Err(PkgError::format(format!(
                "invalid zRIF: license is {} bytes, expected at most {}",
                buf.len(),
                LICENSE_SIZE
            )));
        }
        let mut blob = buf.to_vec();
        blob.resize(LICENSE_SIZE, 0);
        Ok(Self { blob })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }

    pub fn content_id(&self) -> &[u8] {
        c_str(&self.blob[CONTENT_ID_RANGE])
    }

    /// Fail unless the license was issued for `content_id`.
    pub fn validate(&self, content_id: &str) -> anyhow::Result<()> {
        let expected = content_id.as_bytes();
        let expected =
            &expected[..expected.len().min(CONTENT_ID_RANGE.len())];
        if self.content_id() != c_str(expected) {
            return Err(PkgError::ContentMismatch {
                license: String::from_utf8_lossy(self.content_id())
                    .into_owned(),
                package: content_id.to_owned(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ZrifDecoder {
    dictionary: Option<Vec<u8>>,
}

impl Default for ZrifDecoder {
    fn default() -> Self {
        Self {
            dictionary: EMBEDDED_DICT.clone(),
        }
    }
}

impl ZrifDecoder {
    /// Decoder using the embedded dictionary, if one was built in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder without any preset dictionary.
    pub fn without_dictionary() -> Self {
        Self { dictionary: None }
    }

    pub fn has_dictionary(&self) -> bool {
        self.dictionary.is_some()
    }

    pub fn with_dictionary(dictionary: Vec<u8>) -> Self {
        Self {
            dictionary: Some(dictionary),
        }
    }

    pub fn decode(&self, token: &str) -> anyhow::Result<License> {
        let raw = general_purpose::STANDARD
            .decode(token.trim())
            .map_err(|err| PkgError::format(format!("invalid zRIF: {}", err)))?;
        License::from_bytes(&self.inflate(&raw)?)
    }

    fn inflate(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut inflater = Decompress::new(true);
        let mut out = Vec::with_capacity(LICENSE_SIZE);
        loop {
            let consumed = inflater.total_in() as usize;
            let before = (consumed, out.len());
            let status = inflater.decompress_vec(
                &raw[consumed..],
                &mut out,
                FlushDecompress::Finish,
            );
            match status {
                Ok(Status::StreamEnd) => return Ok(out),
                Ok(_) => {
                    if out.len() > LICENSE_SIZE {
                        return Err(PkgError::format(
                            "invalid zRIF: license is too big",
                        ));
                    }
                    if out.len() == out.capacity() {
                        out.reserve(LICENSE_SIZE);
                    } else if (inflater.total_in() as usize, out.len())
                        == before
                    {
                        return Err(PkgError::format(
                            "invalid zRIF: truncated stream",
                        ));
                    }
                }
                Err(err) => match (err.needs_dictionary(), &self.dictionary) {
                    (Some(_), Some(dictionary)) => {
                        inflater.set_dictionary(dictionary).map_err(|err| {
                            PkgError::format(format!(
                                "invalid zRIF dictionary: {}",
                                err
                            ))
                        })?;
                    }
                    (Some(_), None) => {
                        return Err(PkgError::format(
                            "invalid zRIF: token needs a preset dictionary, pass one \
                             with --zrif-dict",
                        ))
                    }
                    (None, _) => {
                        return Err(PkgError::format(format!(
                            "invalid zRIF: {}",
                            err
                        )))
                    }
                },
            }
        }
    }
}
