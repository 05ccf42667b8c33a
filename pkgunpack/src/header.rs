use crate::{
    error::PkgError,
    positioned_io::ReadAt,
    util::{c_str, read_span},
};
use scroll::{ctx, Pread, BE};

pub const PKG_MAGIC: u32 = 0x7F50_4B47;
pub const EXT_MAGIC: u32 = 0x7F65_7874;
pub const HEADER_SIZE: usize = 192;
pub const EXT_HEADER_SIZE: usize = 64;
pub const ITEM_ENTRY_SIZE: u64 = 32;

const CONTENT_ID_OFFSET: usize = 0x30;
const IV_OFFSET: usize = 0x70;
const KEY_TYPE_OFFSET: usize = 0xE7;

#[derive(Debug, Clone)]
pub struct PkgHeader {
    pub meta_offset: u64,
    pub meta_count: u32,
    pub item_count: u32,
    pub total_size: u64,
    pub enc_offset: u64,
    pub enc_size: u64,
    pub content_id: [u8; 48],
    pub iv: [u8; 16],
    pub key_type: u8,
}

impl PkgHeader {
    /// Read and validate the header of a container of `size` bytes.
    pub fn read<R: ReadAt>(source: &R, size: u64) -> anyhow::Result<Self> {
        let buf = read_span(
            source,
            size,
            0,
            HEADER_SIZE + EXT_HEADER_SIZE,
            "pkg header",
        )?;
        let header = buf.pread::<PkgHeader>(0)?;
        log::debug!("Header: {:#X?}", header);
        header.validate(size)?;
        Ok(header)
    }

    pub fn validate(&self, size: u64) -> anyhow::Result<()> {
        if size < self.total_size {
            return Err(PkgError::truncated(format!(
                "pkg file is too small: {:#X} bytes, header declares {:#X}",
                size, self.total_size
            )));
        }
        let table_end = u64::from(self.item_count)
            .checked_mul(ITEM_ENTRY_SIZE)
            .and_then(|len| len.checked_add(self.enc_offset));
        match table_end {
            Some(end) if end <= size => Ok(()),
            _ => Err(PkgError::truncated(format!(
                "pkg file is too small for {} items at {:#X}",
                self.item_count, self.enc_offset
            ))),
        }
    }

    /// Content id embedded in the header, up to its first NUL.
    pub fn content_id(&self) -> String {
        String::from_utf8_lossy(c_str(&self.content_id)).into_owned()
    }
}

impl<'a> ctx::TryFromCtx<'a, ()> for PkgHeader {
    type Error = anyhow::Error;
    fn try_from_ctx(buf: &'a [u8], _: ()) -> Result<(Self, usize), Self::Error> {
        if buf.len() < HEADER_SIZE + EXT_HEADER_SIZE
            || buf.pread_with::<u32>(0, BE)? != PKG_MAGIC
            || buf.pread_with::<u32>(HEADER_SIZE, BE)? != EXT_MAGIC
        {
            return Err(PkgError::format("not a pkg file"));
        }
        let mut content_id = [0; 48];
        content_id.copy_from_slice(&buf[CONTENT_ID_OFFSET..CONTENT_ID_OFFSET + 48]);
        let mut iv = [0; 16];
        iv.copy_from_slice(&buf[IV_OFFSET..IV_OFFSET + 16]);
        Ok((
            Self {
                meta_offset: u64::from(buf.pread_with::<u32>(8, BE)?),
                meta_count: buf.pread_with::<u32>(12, BE)?,
                item_count: buf.pread_with::<u32>(20, BE)?,
                total_size: buf.pread_with::<u64>(24, BE)?,
                enc_offset: buf.pread_with::<u64>(32, BE)?,
                enc_size: buf.pread_with::<u64>(40, BE)?,
                content_id,
                iv,
                key_type: buf[KEY_TYPE_OFFSET] & 7,
            },
            HEADER_SIZE + EXT_HEADER_SIZE,
        ))
    }
}
