use crate::{
    archive::MAX_PATH,
    cipher::{CtrCipher, BLOCK_SIZE},
    content::ContentKind,
    error::PkgError,
    header::{PkgHeader, ITEM_ENTRY_SIZE},
    keys::{ContentKeys, KeySlot},
    positioned_io::ReadAt,
    util::{c_str, check_span, read_span},
};
use scroll::{Pread, BE};

/// Flag values marking a directory entry.
pub const DIRECTORY_FLAGS: [u8; 2] = [4, 18];

#[derive(Debug, Pread)]
struct RawItem {
    name_offset: u32,
    name_size: u32,
    data_offset: u64,
    data_size: u64,
    sub_type: u8,
    _reserved: [u8; 2],
    flags: u8,
    _padding: u32,
}

/// One decrypted item table entry. Offsets are relative to the encrypted
/// area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    pub index: u32,
    pub name: String,
    pub data_offset: u64,
    pub data_size: u64,
    pub sub_type: u8,
    pub flags: u8,
    pub slot: KeySlot,
}

impl ItemEntry {
    pub fn is_directory(&self) -> bool {
        DIRECTORY_FLAGS.contains(&self.flags)
    }
}

/// Random access to the encrypted item table.
#[derive(Debug)]
pub struct ItemTable<'a, R> {
    source: &'a R,
    size: u64,
    enc_offset: u64,
    items_offset: u64,
    count: u32,
    kind: ContentKind,
    primary: CtrCipher,
    secondary: CtrCipher,
}

impl<'a, R: ReadAt> ItemTable<'a, R> {
    pub fn new(
        source: &'a R,
        size: u64,
        header: &PkgHeader,
        items_offset: u32,
        keys: &ContentKeys,
        kind: ContentKind,
    ) -> Self {
        Self {
            source,
            size,
            enc_offset: header.enc_offset,
            items_offset: u64::from(items_offset),
            count: header.item_count,
            kind,
            primary: CtrCipher::new(keys.primary(), &header.iv),
            secondary: CtrCipher::new(
                keys.key(KeySlot::Secondary),
                &header.iv,
            ),
        }
    }

    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn cipher(&self, slot: KeySlot) -> &CtrCipher {
        match slot {
            KeySlot::Primary => &self.primary,
            KeySlot::Secondary => &self.secondary,
        }
    }

    /// Decrypt entry `index` and its name.
    pub fn read(&self, index: u32) -> anyhow::Result<ItemEntry> {
        let offset = self.items_offset + u64::from(index) * ITEM_ENTRY_SIZE;
        let mut buf = read_span(
            self.source,
            self.size,
            self.enc_offset + offset,
            ITEM_ENTRY_SIZE as usize,
            "item entry",
        )?;
        self.primary.xor(offset / BLOCK_SIZE as u64, &mut buf);
        let raw = buf.pread_with::<RawItem>(0, BE)?;
        log::debug!("Item {}: {:X?}", index, raw);

        if u64::from(raw.name_offset) % BLOCK_SIZE as u64 != 0
            || raw.data_offset % BLOCK_SIZE as u64 != 0
        {
            return Err(PkgError::format(format!(
                "item {} is not aligned to the cipher block size",
                index
            )));
        }
        let name_start = self.enc_offset + u64::from(raw.name_offset);
        check_span(
            self.size,
            name_start,
            u64::from(raw.name_size),
            "item name",
        )?;
        check_span(
            self.size,
            self.data_start(raw.data_offset)?,
            raw.data_size,
            "item data",
        )?;
        if raw.name_size as usize >= MAX_PATH {
            return Err(PkgError::format(
                "pkg file contains file with very long name",
            ));
        }

        let slot = KeySlot::for_item(self.kind, raw.sub_type);
        let mut name = read_span(
            self.source,
            self.size,
            name_start,
            raw.name_size as usize,
            "item name",
        )?;
        self.cipher(slot)
            .xor(u64::from(raw.name_offset) / BLOCK_SIZE as u64, &mut name);

        Ok(ItemEntry {
            index,
            name: String::from_utf8_lossy(c_str(&name)).into_owned(),
            data_offset: raw.data_offset,
            data_size: raw.data_size,
            sub_type: raw.sub_type,
            flags: raw.flags,
            slot,
        })
    }

    /// Absolute file offset of a data offset relative to the encrypted area.
    pub fn data_start(&self, data_offset: u64) -> anyhow::Result<u64> {
        self.enc_offset.checked_add(data_offset).ok_or_else(|| {
            PkgError::truncated("item data offset overflows")
        })
    }

    /// Read and decrypt a whole item payload. Only meant for small items.
    pub fn read_data(
        &self,
        entry: &ItemEntry,
        limit: u64,
    ) -> anyhow::Result<Vec<u8>> {
        if entry.data_size > limit {
            return Err(PkgError::format(format!(
                "item '{}' is too big: {:#X} bytes",
                entry.name, entry.data_size
            )));
        }
        let mut buf = read_span(
            self.source,
            self.size,
            self.data_start(entry.data_offset)?,
            entry.data_size as usize,
            "item data",
        )?;
        self.cipher(entry.slot)
            .xor(entry.data_offset / BLOCK_SIZE as u64, &mut buf);
        Ok(buf)
    }

    pub fn iter(&self) -> impl Iterator<Item = anyhow::Result<ItemEntry>> + '_ {
        (0..self.count).map(move |i| self.read(i))
    }
}
