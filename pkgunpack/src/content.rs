use crate::{error::PkgError, region::Region};
use std::fmt;

/// Content type codes stored in metadata block 2.
pub const CONTENT_TYPE_PSX: u32 = 0x6;
pub const CONTENT_TYPE_PSP: u32 = 0x7;
pub const CONTENT_TYPE_PSP_MINI: u32 = 0xF;
pub const CONTENT_TYPE_DLC: u32 = 0x16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyFamily {
    Psx,
    Psp,
    PspMini,
}

impl LegacyFamily {
    pub fn from_content_type(content_type: u32) -> Option<Self> {
        match content_type {
            CONTENT_TYPE_PSX => Some(Self::Psx),
            CONTENT_TYPE_PSP => Some(Self::Psp),
            CONTENT_TYPE_PSP_MINI => Some(Self::PspMini),
            _ => None,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Psx => "PSX",
            Self::Psp => "PSP",
            Self::PspMini => "PSPMini",
        }
    }
}

/// What a package installs, which decides its archive layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Game,
    Patch,
    Dlc,
    LegacyMedia(LegacyFamily),
}

impl ContentKind {
    /// `patch` comes from the SFO category and only matters for content
    /// types that are neither legacy media nor DLC.
    pub fn classify(content_type: u32, patch: bool) -> Self {
        if let Some(family) = LegacyFamily::from_content_type(content_type) {
            Self::LegacyMedia(family)
        } else if content_type == CONTENT_TYPE_DLC {
            Self::Dlc
        } else if patch {
            Self::Patch
        } else {
            Self::Game
        }
    }
    pub fn is_legacy(self) -> bool {
        matches!(self, Self::LegacyMedia(_))
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Game => "APP",
            Self::Patch => "PATCH",
            Self::Dlc => "DLC",
            Self::LegacyMedia(family) => family.as_str(),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content id such as `UP0001-PCSE00001_00-0000000000000000`.
///
/// Characters 7..16 are the title id, everything from 20 on is the label
/// naming an add-on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentId(String);

const TITLE_ID_RANGE: std::ops::Range<usize> = 7..16;
const LABEL_OFFSET: usize = 20;

impl ContentId {
    pub fn parse(id: &str) -> anyhow::Result<Self> {
        if !id.is_ascii() || id.len() < TITLE_ID_RANGE.end {
            return Err(PkgError::format(format!(
                "invalid content id '{}'",
                id.escape_debug()
            )));
        }
        Ok(Self(id.to_owned()))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn title_id(&self) -> &str {
        &self.0[TITLE_ID_RANGE]
    }
    pub fn label(&self) -> &str {
        self.0.get(LABEL_OFFSET..).unwrap_or("")
    }
    pub fn region(&self) -> Region {
        Region::from_title_id(self.title_id().as_bytes())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_content_types() {
        assert_eq!(
            ContentKind::classify(6, false),
            ContentKind::LegacyMedia(LegacyFamily::Psx)
        );
        assert_eq!(
            ContentKind::classify(7, true),
            ContentKind::LegacyMedia(LegacyFamily::Psp)
        );
        assert_eq!(
            ContentKind::classify(0xF, false),
            ContentKind::LegacyMedia(LegacyFamily::PspMini)
        );
        assert_eq!(ContentKind::classify(0x16, true), ContentKind::Dlc);
        assert_eq!(ContentKind::classify(0x15, true), ContentKind::Patch);
        assert_eq!(ContentKind::classify(0x15, false), ContentKind::Game);
        assert_eq!(ContentKind::classify(0, false), ContentKind::Game);
    }

    #[test]
    fn content_id_parts() {
        let id = ContentId::parse("EP9000-PCSF00007_00-ADDCONT000000001")
            .unwrap();
        assert_eq!(id.title_id(), "PCSF00007");
        assert_eq!(id.label(), "ADDCONT000000001");
        assert_eq!(id.region(), Region::Eur);
    }

    #[test]
    fn short_content_id() {
        let id = ContentId::parse("UP0001-PCSE00001").unwrap();
        assert_eq!(id.title_id(), "PCSE00001");
        assert_eq!(id.label(), "");
        assert!(ContentId::parse("UP0001-PCSE0000").is_err());
        assert!(ContentId::parse("UP0001-PCSÉ00001_00").is_err());
    }
}
