#![allow(dead_code)]

use pkgunpack::{
    archive::ArchiveSink,
    cipher::CtrCipher,
    content::{ContentKind, LegacyFamily},
    keys::{ContentKeys, KeySlot},
};
use std::collections::BTreeMap;

pub const GAME_ID: &str = "UP0001-PCSE00001_00-0000000000000000";
pub const DLC_ID: &str = "EP0002-PCSF00002_00-BONUSPACK0000001";
pub const PSP_ID: &str = "UP9000-NPUG80114_00-0000000000000000";

pub const IV: [u8; 16] = [
    0x3C, 0x41, 0x5A, 0x07, 0x91, 0x2E, 0xB8, 0x66, 0x0D, 0xF3, 0x24, 0x7B,
    0xC9, 0x10, 0x5E, 0xA2,
];

const META_OFFSET: usize = 0x100;
const SFO_OFFSET: usize = 0x200;
const TAIL: [u8; 0x60] = [0xEE; 0x60];

#[derive(Debug, Clone)]
struct Item {
    name: String,
    data: Vec<u8>,
    sub_type: u8,
    flags: u8,
    encrypt: bool,
}

/// Assembles encrypted packages the way the publishing tools lay them out:
/// header, metadata blocks, sfo, encrypted area, then an unencrypted tail.
#[derive(Debug, Clone)]
pub struct PkgBuilder {
    content_id: String,
    key_type: u8,
    content_type: u32,
    sfo: Option<Vec<u8>>,
    items: Vec<Item>,
}

/// Offsets of a built package, for slicing expectations out of it.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub enc_offset: usize,
    pub items_size: usize,
    pub enc_size: usize,
}

impl PkgBuilder {
    pub fn new(content_id: &str, key_type: u8, content_type: u32) -> Self {
        Self {
            content_id: content_id.to_owned(),
            key_type,
            content_type,
            sfo: None,
            items: Vec::new(),
        }
    }

    pub fn sfo(mut self, entries: &[(&str, &str)]) -> Self {
        self.sfo = Some(build_sfo(entries));
        self
    }

    pub fn dir(self, name: &str) -> Self {
        self.item(name, Vec::new(), 0, 4, true)
    }

    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.item(name, data.to_vec(), 0, 3, true)
    }

    pub fn file_with_type(self, name: &str, data: &[u8], sub_type: u8) -> Self {
        self.item(name, data.to_vec(), sub_type, 3, true)
    }

    /// Stored without encryption.
    pub fn plain_file(self, name: &str, data: &[u8]) -> Self {
        self.item(name, data.to_vec(), 0, 3, false)
    }

    fn item(
        mut self,
        name: &str,
        data: Vec<u8>,
        sub_type: u8,
        flags: u8,
        encrypt: bool,
    ) -> Self {
        self.items.push(Item {
            name: name.to_owned(),
            data,
            sub_type,
            flags,
            encrypt,
        });
        self
    }

    pub fn layout(&self) -> Layout {
        let sfo_len = self.sfo.as_ref().map_or(0, Vec::len);
        let mut cursor = align(self.items.len() * 32);
        for item in &self.items {
            cursor = align(cursor + item.name.len());
        }
        let items_size = cursor;
        for item in &self.items {
            cursor = align(cursor + item.data.len());
        }
        Layout {
            enc_offset: align(SFO_OFFSET + sfo_len),
            items_size,
            enc_size: cursor,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let layout = self.layout();
        let keys = ContentKeys::derive(self.key_type, &IV).unwrap();
        let primary = CtrCipher::new(keys.primary(), &IV);
        let kind = LegacyFamily::from_content_type(self.content_type)
            .map_or(ContentKind::Game, ContentKind::LegacyMedia);

        let mut enc = vec![0; layout.enc_size];
        let mut name_offset = align(self.items.len() * 32);
        let mut data_offset = layout.items_size;
        for (i, item) in self.items.iter().enumerate() {
            let cipher = CtrCipher::new(
                keys.key(KeySlot::for_item(kind, item.sub_type)),
                &IV,
            );
            let entry = &mut enc[i * 32..(i + 1) * 32];
            entry[0..4].copy_from_slice(&(name_offset as u32).to_be_bytes());
            entry[4..8]
                .copy_from_slice(&(item.name.len() as u32).to_be_bytes());
            entry[8..16].copy_from_slice(&(data_offset as u64).to_be_bytes());
            entry[16..24]
                .copy_from_slice(&(item.data.len() as u64).to_be_bytes());
            entry[24] = item.sub_type;
            entry[27] = item.flags;

            let name = &mut enc[name_offset..name_offset + item.name.len()];
            name.copy_from_slice(item.name.as_bytes());
            cipher.xor(name_offset as u64 / 16, name);

            let data = &mut enc[data_offset..data_offset + item.data.len()];
            data.copy_from_slice(&item.data);
            if item.encrypt {
                cipher.xor(data_offset as u64 / 16, data);
            }

            name_offset = align(name_offset + item.name.len());
            data_offset = align(data_offset + item.data.len());
        }
        primary.xor(0, &mut enc[..self.items.len() * 32]);

        let meta_count = if self.sfo.is_some() { 3 } else { 2 };
        let mut out = vec![0; SFO_OFFSET];
        out[0..4].copy_from_slice(&0x7F50_4B47u32.to_be_bytes());
        out[8..12].copy_from_slice(&(META_OFFSET as u32).to_be_bytes());
        out[12..16].copy_from_slice(&(meta_count as u32).to_be_bytes());
        out[20..24].copy_from_slice(&(self.items.len() as u32).to_be_bytes());
        let total = layout.enc_offset + layout.enc_size + TAIL.len();
        out[24..32].copy_from_slice(&(total as u64).to_be_bytes());
        out[32..40].copy_from_slice(&(layout.enc_offset as u64).to_be_bytes());
        out[40..48].copy_from_slice(&(layout.enc_size as u64).to_be_bytes());
        out[0x30..0x30 + self.content_id.len()]
            .copy_from_slice(self.content_id.as_bytes());
        out[0x70..0x80].copy_from_slice(&IV);
        out[0xC0..0xC4].copy_from_slice(&0x7F65_7874u32.to_be_bytes());
        out[0xE7] = self.key_type;

        let mut meta = Vec::new();
        meta_block(&mut meta, 2, &[self.content_type]);
        meta_block(&mut meta, 13, &[0, layout.items_size as u32]);
        if let Some(sfo) = &self.sfo {
            meta_block(&mut meta, 14, &[SFO_OFFSET as u32, sfo.len() as u32]);
        }
        out[META_OFFSET..META_OFFSET + meta.len()].copy_from_slice(&meta);

        if let Some(sfo) = &self.sfo {
            out.extend_from_slice(sfo);
        }
        out.resize(layout.enc_offset, 0);
        out.extend(enc);
        out.extend_from_slice(&TAIL);
        out
    }
}

fn align(offset: usize) -> usize {
    (offset + 15) & !15
}

fn meta_block(out: &mut Vec<u8>, block_type: u32, payload: &[u32]) {
    out.extend_from_slice(&block_type.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32 * 4).to_be_bytes());
    payload
        .iter()
        .for_each(|v| out.extend_from_slice(&v.to_be_bytes()));
}

pub fn build_sfo(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut keys = Vec::new();
    let mut values = Vec::new();
    let mut table = Vec::new();
    for (key, value) in entries {
        table.extend_from_slice(&(keys.len() as u16).to_le_bytes());
        table.extend_from_slice(&0x0204u16.to_le_bytes());
        table.extend_from_slice(&(value.len() as u32 + 1).to_le_bytes());
        table.extend_from_slice(&(value.len() as u32 + 1).to_le_bytes());
        table.extend_from_slice(&(values.len() as u32).to_le_bytes());
        keys.extend_from_slice(key.as_bytes());
        keys.push(0);
        values.extend_from_slice(value.as_bytes());
        values.push(0);
    }
    keys.resize(align(keys.len()), 0);
    let key_offset = 0x14 + table.len();
    let value_offset = key_offset + keys.len();

    let mut buf = Vec::new();
    buf.extend_from_slice(&0x4653_5000u32.to_le_bytes());
    buf.extend_from_slice(&0x0101u32.to_le_bytes());
    buf.extend_from_slice(&(key_offset as u32).to_le_bytes());
    buf.extend_from_slice(&(value_offset as u32).to_le_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    buf.extend(table);
    buf.extend(keys);
    buf.extend(values);
    buf
}

/// Sink that keeps every entry in memory, in write order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub order: Vec<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    open: Option<String>,
    pub closed: bool,
}

impl MemorySink {
    pub fn file(&self, path: &str) -> &[u8] {
        self.files
            .get(path)
            .unwrap_or_else(|| panic!("missing entry {}", path))
    }
}

impl ArchiveSink for MemorySink {
    fn add_folder(&mut self, path: &str) -> anyhow::Result<()> {
        assert!(path.ends_with('/'), "folder {} lacks a slash", path);
        assert!(self.open.is_none());
        self.order.push(path.to_owned());
        Ok(())
    }

    fn begin_file(&mut self, path: &str, size: u64) -> anyhow::Result<()> {
        assert!(self.open.is_none());
        self.order.push(path.to_owned());
        self.files
            .insert(path.to_owned(), Vec::with_capacity(size as usize));
        self.open = Some(path.to_owned());
        Ok(())
    }

    fn write_chunk(&mut self, buf: &[u8]) -> anyhow::Result<()> {
        let open = self.open.as_ref().expect("no open file");
        self.files.get_mut(open).unwrap().extend_from_slice(buf);
        Ok(())
    }

    fn end_file(&mut self) -> anyhow::Result<()> {
        self.open.take().expect("no open file");
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Deterministic filler that doesn't repeat within a cipher block.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(u32::from(seed)) as u8)
        .collect()
}
