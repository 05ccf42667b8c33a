use crate::{
    content::{ContentId, ContentKind, LegacyFamily},
    error::PkgError,
    header::PkgHeader,
    item::ItemTable,
    keys::ContentKeys,
    locate::find_legacy_title,
    meta::MetadataBlocks,
    positioned_io::{RandomAccessFile, ReadAt},
    region::Region,
    sfo::{self, sanitize_title, SfoInfo},
    util::{os_string, read_span},
};
use std::{borrow::Cow, ffi::OsString, path::Path};

/// Everything learned about a package before unpacking it.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    header: PkgHeader,
    blocks: MetadataBlocks,
    keys: ContentKeys,
    kind: ContentKind,
    title: Vec<u8>,
    content_id: ContentId,
    min_version: Option<String>,
    app_version: Option<String>,
}

impl PackageInfo {
    pub fn header(&self) -> &PkgHeader {
        &self.header
    }
    pub fn blocks(&self) -> &MetadataBlocks {
        &self.blocks
    }
    pub fn keys(&self) -> &ContentKeys {
        &self.keys
    }
    pub fn kind(&self) -> ContentKind {
        self.kind
    }
    /// Title for display. Bytes that aren't UTF-8 are replaced.
    pub fn title(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.title)
    }
    /// Sanitised title exactly as the package stores it.
    pub fn title_bytes(&self) -> &[u8] {
        &self.title
    }
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }
    pub fn region(&self) -> Region {
        self.content_id.region()
    }
    pub fn min_version(&self) -> Option<&str> {
        self.min_version.as_deref()
    }
    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    /// Whether a supplied license is checked and installed.
    pub fn accepts_license(&self) -> bool {
        match self.kind {
            ContentKind::Game | ContentKind::Dlc => true,
            ContentKind::Patch | ContentKind::LegacyMedia(_) => false,
        }
    }

    /// File name of the output archive. The title bytes are used as they
    /// are, so the name is only valid UTF-8 when the title is.
    pub fn archive_name(&self) -> OsString {
        let id = self.content_id.title_id();
        let suffix = match self.kind {
            ContentKind::LegacyMedia(family) => {
                format!(" [{}] [{}].zip", id, family.as_str())
            }
            ContentKind::Dlc => format!(
                " [{}] [{}] [DLC-{}].zip",
                id,
                self.region(),
                String::from_utf8_lossy(&sanitize_title(
                    self.content_id.label().as_bytes()
                ))
            ),
            ContentKind::Patch => format!(
                " [{}] [{}] [PATCH] [v{}].zip",
                id,
                self.region(),
                String::from_utf8_lossy(&sanitize_title(
                    self.app_version().unwrap_or("").as_bytes()
                ))
            ),
            ContentKind::Game => format!(" [{}] [{}].zip", id, self.region()),
        };
        let mut name = self.title.clone();
        name.extend_from_slice(suffix.as_bytes());
        os_string(name)
    }

    /// Folder inside the archive that items are written to. Empty for
    /// legacy media, which is written at the top level.
    pub fn root(&self) -> String {
        let id = self.content_id.title_id();
        match self.kind {
            ContentKind::Game => format!("app/{}", id),
            ContentKind::Patch => format!("patch/{}", id),
            ContentKind::Dlc => {
                format!("addcont/{}/{}", id, self.content_id.label())
            }
            ContentKind::LegacyMedia(_) => String::new(),
        }
    }

    /// Folder entries created ahead of the items, outermost first.
    pub fn scaffold(&self) -> Vec<String> {
        let id = self.content_id.title_id();
        match self.kind {
            ContentKind::Game => {
                vec!["app/".to_owned(), format!("app/{}/", id)]
            }
            ContentKind::Patch => {
                vec!["patch/".to_owned(), format!("patch/{}/", id)]
            }
            ContentKind::Dlc => vec![
                "addcont/".to_owned(),
                format!("addcont/{}/", id),
                format!("addcont/{}/{}/", id, self.content_id.label()),
            ],
            ContentKind::LegacyMedia(_) => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Package<R> {
    source: R,
    size: u64,
    info: PackageInfo,
}

impl Package<RandomAccessFile> {
    pub fn open_path(path: &Path) -> anyhow::Result<Self> {
        let size = std::fs::metadata(path)?.len();
        let file = RandomAccessFile::open(path)?;
        Self::open(file, size)
    }
}

impl<R: ReadAt> Package<R> {
    /// Parse a container of `size` bytes.
    pub fn open(source: R, size: u64) -> anyhow::Result<Self> {
        let header = PkgHeader::read(&source, size)?;
        let blocks = MetadataBlocks::scan(&source, size, &header)?;
        log::debug!("Metadata: {:#X?}", blocks);
        let keys = ContentKeys::derive(header.key_type, &header.iv)?;

        let info = match LegacyFamily::from_content_type(blocks.content_type) {
            Some(family) => {
                let kind = ContentKind::LegacyMedia(family);
                let table = ItemTable::new(
                    &source,
                    size,
                    &header,
                    blocks.items_offset,
                    &keys,
                    kind,
                );
                let title = find_legacy_title(&table)?;
                PackageInfo {
                    content_id: ContentId::parse(&header.content_id())?,
                    header,
                    blocks,
                    keys,
                    kind,
                    title,
                    min_version: None,
                    app_version: None,
                }
            }
            None => {
                let sfo = read_sfo(&source, size, &blocks)?;
                let kind = ContentKind::classify(blocks.content_type, sfo.patch);
                let content_id = match &sfo.content_id {
                    Some(id) => ContentId::parse(id)?,
                    None => {
                        log::warn!(
                            "No CONTENT_ID in sfo, using the header content id"
                        );
                        ContentId::parse(&header.content_id())?
                    }
                };
                if kind == ContentKind::Dlc && content_id.label().is_empty() {
                    return Err(PkgError::format(format!(
                        "DLC content id '{}' has no label",
                        content_id
                    )));
                }
                PackageInfo {
                    header,
                    blocks,
                    keys,
                    kind,
                    title: sfo.title,
                    content_id,
                    min_version: sfo.min_version,
                    app_version: sfo.app_version,
                }
            }
        };
        log::info!(
            "Opened {} package '{}' ({})",
            info.kind,
            info.title(),
            info.content_id
        );
        Ok(Self { source, size, info })
    }

    pub fn info(&self) -> &PackageInfo {
        &self.info
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn items(&self) -> ItemTable<'_, R> {
        ItemTable::new(
            &self.source,
            self.size,
            &self.info.header,
            self.info.blocks.items_offset,
            &self.info.keys,
            self.info.kind,
        )
    }
}

fn read_sfo<R: ReadAt>(
    source: &R,
    size: u64,
    blocks: &MetadataBlocks,
) -> anyhow::Result<SfoInfo> {
    sfo::check_size(u64::from(blocks.sfo_size))?;
    let buf = read_span(
        source,
        size,
        u64::from(blocks.sfo_offset),
        blocks.sfo_size as usize,
        "sfo",
    )?;
    SfoInfo::parse(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(kind: ContentKind, content_id: &str) -> PackageInfo {
        let header = PkgHeader {
            meta_offset: 0,
            meta_count: 0,
            item_count: 0,
            total_size: 0,
            enc_offset: 0,
            enc_size: 0,
            content_id: [0; 48],
            iv: [0; 16],
            key_type: 2,
        };
        PackageInfo {
            keys: ContentKeys::derive(2, &header.iv).unwrap(),
            header,
            blocks: MetadataBlocks::default(),
            kind,
            title: b"Title".to_vec(),
            content_id: ContentId::parse(content_id).unwrap(),
            min_version: None,
            app_version: None,
        }
    }

    #[test]
    fn legacy_names() {
        for (family, tag) in [
            (LegacyFamily::Psx, "PSX"),
            (LegacyFamily::Psp, "PSP"),
            (LegacyFamily::PspMini, "PSPMini"),
        ]
        .iter()
        {
            let info = info(
                ContentKind::LegacyMedia(*family),
                "UP9000-NPUJ00001_00-0000000000000000",
            );
            assert_eq!(
                info.archive_name(),
                format!("Title [NPUJ00001] [{}].zip", tag).as_str()
            );
            assert_eq!(info.root(), "");
            assert!(info.scaffold().is_empty());
            assert!(!info.accepts_license());
        }
    }

    #[test]
    fn patch_without_app_version() {
        let info = info(ContentKind::Patch, "JP0001-PCSG00001_00-0000000000000000");
        assert_eq!(
            info.archive_name(),
            "Title [PCSG00001] [JPN] [PATCH] [v].zip"
        );
        assert_eq!(info.scaffold(), vec!["patch/", "patch/PCSG00001/"]);
    }

    #[test]
    fn unknown_region_game() {
        let info = info(ContentKind::Game, "XX0001-ABCD00001_00-0000000000000000");
        assert_eq!(
            info.archive_name(),
            "Title [ABCD00001] [unknown region].zip"
        );
        assert_eq!(info.root(), "app/ABCD00001");
        assert!(info.accepts_license());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_title_in_name() {
        use std::os::unix::ffi::OsStrExt;
        let mut info =
            info(ContentKind::Game, "EP0001-PCSB00001_00-0000000000000000");
        info.title = b"Caf\xe9".to_vec();
        assert_eq!(info.title(), "Caf\u{fffd}");
        assert_eq!(
            info.archive_name().as_bytes(),
            &b"Caf\xe9 [PCSB00001] [EUR].zip"[..]
        );
    }
}
