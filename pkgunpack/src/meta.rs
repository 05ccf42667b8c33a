use crate::{
    error::PkgError, header::PkgHeader, positioned_io::ReadAt,
    util::read_span,
};
use scroll::{Pread, BE};

pub const BLOCK_CONTENT_TYPE: u32 = 2;
pub const BLOCK_ITEMS: u32 = 13;
pub const BLOCK_SFO: u32 = 14;

const BLOCK_HEADER_SIZE: u64 = 8;
const BLOCK_READ_SIZE: usize = 16;

#[derive(Debug, Pread)]
struct BlockHeader {
    block_type: u32,
    size: u32,
    first: u32,
    second: u32,
}

/// Values collected from the metadata blocks.
///
/// `items_offset` is relative to the encrypted area, `sfo_offset` is an
/// absolute file offset.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MetadataBlocks {
    pub content_type: u32,
    pub items_offset: u32,
    pub items_size: u32,
    pub sfo_offset: u32,
    pub sfo_size: u32,
}

impl MetadataBlocks {
    pub fn scan<R: ReadAt>(
        source: &R,
        size: u64,
        header: &PkgHeader,
    ) -> anyhow::Result<Self> {
        let mut blocks = Self::default();
        let mut offset = header.meta_offset;
        for _ in 0..header.meta_count {
            let buf = read_span(
                source,
                size,
                offset,
                BLOCK_READ_SIZE,
                "metadata block",
            )?;
            let block = buf.pread_with::<BlockHeader>(0, BE)?;
            log::debug!("Metadata block at {:#X}: {:X?}", offset, block);
            match block.block_type {
                BLOCK_CONTENT_TYPE => blocks.content_type = block.first,
                BLOCK_ITEMS => {
                    blocks.items_offset = block.first;
                    blocks.items_size = block.second;
                }
                BLOCK_SFO => {
                    blocks.sfo_offset = block.first;
                    blocks.sfo_size = block.second;
                }
                _ => (),
            }
            offset = offset
                .checked_add(BLOCK_HEADER_SIZE + u64::from(block.size))
                .ok_or_else(|| {
                    PkgError::truncated("metadata block offset overflows")
                })?;
        }
        Ok(blocks)
    }
}
