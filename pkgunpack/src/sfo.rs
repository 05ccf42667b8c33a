//! System file object (`param.sfo`) parsing.
//!
//! Layout: little-endian magic `\0PSF`, then the key table offset (0x08),
//! value table offset (0x0C) and entry count (0x10). Entries are 16 bytes
//! each starting at 0x14: a 16-bit key offset at +0 and a 32-bit value
//! offset at +12, both relative to their tables.

use crate::{error::PkgError, util::c_str};
use scroll::{Pread, LE};
use std::convert::TryFrom;

pub const SFO_MAGIC: u32 = 0x4653_5000;
pub const MIN_SFO_SIZE: u64 = 16;
pub const MAX_SFO_SIZE: u64 = 16 * 1024;
pub const MAX_TITLE_LEN: usize = 255;

const ENTRY_TABLE_OFFSET: u64 = 0x14;
const ENTRY_SIZE: u64 = 16;
const VALUE_OFFSET: u64 = 12;
const RESERVED: &[u8] = b"<>\"/\\|?*";
const PATCH_CATEGORY: &[u8] = b"gp";

pub fn check_size(size: u64) -> anyhow::Result<()> {
    if size < MIN_SFO_SIZE {
        Err(PkgError::format("sfo information is too small"))
    } else if size > MAX_SFO_SIZE {
        Err(PkgError::format(
            "sfo information is too big, pkg file is probably corrupted",
        ))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SfoInfo {
    /// Sanitised title bytes, not necessarily UTF-8.
    pub title: Vec<u8>,
    pub content_id: Option<String>,
    pub patch: bool,
    pub min_version: Option<String>,
    pub app_version: Option<String>,
}

impl SfoInfo {
    pub fn parse(buf: &[u8]) -> anyhow::Result<Self> {
        let table = SfoTable::new(buf)?;
        let index = table.index()?;
        let title = table.title(&index)?;
        let string = |i: Option<u64>| -> anyhow::Result<Option<String>> {
            i.map(|i| table.value(i).map(lossy)).transpose()
        };
        let patch = match index.category {
            Some(i) => table.value(i)? == PATCH_CATEGORY,
            None => false,
        };
        Ok(Self {
            title,
            content_id: string(index.content_id)?,
            patch,
            min_version: string(index.min_version)?
                .map(|v| format_min_version(&v)),
            app_version: string(index.app_version)?
                .map(|v| format_app_version(&v)),
        })
    }

    /// Parse just the title, as legacy media packages carry nothing else
    /// worth reading.
    pub fn parse_title(buf: &[u8]) -> anyhow::Result<Vec<u8>> {
        let table = SfoTable::new(buf)?;
        let index = table.index()?;
        table.title(&index)
    }
}

#[derive(Debug, Default)]
struct SfoIndex {
    title: Option<u64>,
    content_id: Option<u64>,
    category: Option<u64>,
    min_version: Option<u64>,
    app_version: Option<u64>,
}

#[derive(Debug)]
struct SfoTable<'a> {
    buf: &'a [u8],
    keys: u64,
    values: u64,
    count: u64,
}

impl<'a> SfoTable<'a> {
    fn new(buf: &'a [u8]) -> anyhow::Result<Self> {
        check_size(buf.len() as u64)?;
        let field = |offset: usize| {
            buf.pread_with::<u32>(offset, LE)
                .map(u64::from)
                .map_err(|_| PkgError::format("sfo information is too small"))
        };
        if field(0)? != u64::from(SFO_MAGIC) {
            return Err(PkgError::format("incorrect sfo signature"));
        }
        Ok(Self {
            buf,
            keys: field(8)?,
            values: field(12)?,
            count: field(16)?,
        })
    }

    /// First match wins, except that `STITLE` always replaces the title.
    fn index(&self) -> anyhow::Result<SfoIndex> {
        let mut index = SfoIndex::default();
        for i in 0..self.count {
            let slot = match self.key(i)? {
                b"STITLE" => {
                    index.title = Some(i);
                    continue;
                }
                b"TITLE" => &mut index.title,
                b"CONTENT_ID" => &mut index.content_id,
                b"CATEGORY" => &mut index.category,
                b"PSP2_DISP_VER" => &mut index.min_version,
                b"APP_VER" => &mut index.app_version,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(i);
            }
        }
        Ok(index)
    }

    fn title(&self, index: &SfoIndex) -> anyhow::Result<Vec<u8>> {
        let i = index.title.ok_or_else(|| {
            PkgError::format(
                "cannot find title from sfo file, pkg is probably corrupted",
            )
        })?;
        Ok(sanitize_title(self.value(i)?))
    }

    fn entry(&self, i: u64) -> anyhow::Result<usize> {
        let offset = ENTRY_TABLE_OFFSET + i * ENTRY_SIZE;
        if offset + ENTRY_SIZE > self.buf.len() as u64 {
            return Err(PkgError::format("sfo information is too small"));
        }
        Ok(offset as usize)
    }

    fn key(&self, i: u64) -> anyhow::Result<&'a [u8]> {
        let entry = self.entry(i)?;
        let offset = self.buf.pread_with::<u16>(entry, LE)?;
        self.string_at(self.keys + u64::from(offset))
    }

    fn value(&self, i: u64) -> anyhow::Result<&'a [u8]> {
        let entry = self.entry(i)?;
        let offset = self
            .buf
            .pread_with::<u32>(entry + VALUE_OFFSET as usize, LE)?;
        self.string_at(self.values + u64::from(offset))
    }

    fn string_at(&self, offset: u64) -> anyhow::Result<&'a [u8]> {
        let buf = self.buf;
        let rest = usize::try_from(offset)
            .ok()
            .and_then(|offset| buf.get(offset..))
            .ok_or_else(|| {
                PkgError::format(format!(
                    "sfo string offset {:#X} is out of range",
                    offset
                ))
            })?;
        match rest.iter().position(|&b| b == 0) {
            Some(end) => Ok(&rest[..end]),
            None => Err(PkgError::format(format!(
                "sfo string at {:#X} is not terminated",
                offset
            ))),
        }
    }
}

fn lossy(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

/// Make a title usable as a file name.
///
/// Printable ASCII passes through except `<>"/\|?*`, `:` becomes ` -`,
/// newline becomes a space, bytes above 0x7F are kept as they are and
/// everything else is dropped. At most [`MAX_TITLE_LEN`] input bytes are
/// consumed, every `:` shortens that budget by one and the result never
/// exceeds [`MAX_TITLE_LEN`] bytes. Titles are not always UTF-8, so the
/// result stays raw bytes.
pub fn sanitize_title(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len().min(MAX_TITLE_LEN));
    let mut limit = MAX_TITLE_LEN;
    for (i, &b) in c_str(raw).iter().enumerate() {
        if i >= limit {
            break;
        }
        match b {
            b':' => {
                if out.len() + 2 > MAX_TITLE_LEN {
                    break;
                }
                out.extend_from_slice(b" -");
                limit -= 1;
            }
            b'\n' => out.push(b' '),
            0x20..=0x7E if !RESERVED.contains(&b) => out.push(b),
            0x80..=0xFF => out.push(b),
            _ => (),
        }
    }
    out
}

/// `03.570` -> `3.57`: drop one leading and one trailing zero.
pub fn format_min_version(raw: &str) -> String {
    let v = raw.strip_prefix('0').unwrap_or(raw);
    v.strip_suffix('0').unwrap_or(v).to_owned()
}

/// `01.02` -> `1.02`: drop one leading zero.
pub fn format_app_version(raw: &str) -> String {
    raw.strip_prefix('0').unwrap_or(raw).to_owned()
}
