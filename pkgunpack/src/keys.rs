//! Content key derivation.
//!
//! The low three bits of header byte 0xE7 select the scheme. Type 1 packages
//! use the fixed PSP key directly and keep the PS3 key around for items that
//! are not PSP-encrypted; types 2 to 4 encrypt the header IV with one of
//! three fixed keys to obtain the content key.

use crate::{
    cipher::{ecb_encrypt_block, Key},
    content::ContentKind,
    error::PkgError,
};
use anyhow::Context;
use once_cell::sync::OnceCell;
use serde::Deserialize;

const KEYS_PATH: &str = "keys.json";

/// Item sub-type marking PSP-encrypted entries in legacy media packages.
pub const PSP_ITEM_TYPE: u8 = 0x90;

#[derive(Debug, Deserialize)]
struct KeyTable {
    ps3: Key,
    psp: Key,
    vita2: Key,
    vita3: Key,
    vita4: Key,
}

static KEY_TABLE: OnceCell<KeyTable> = OnceCell::new();

fn key_table() -> anyhow::Result<&'static KeyTable> {
    KEY_TABLE.get_or_try_init(|| {
        let raw = crate::Resources::get(KEYS_PATH).context(format!(
            "Could not find embedded resource: {}",
            KEYS_PATH
        ))?;
        Ok(serde_json::from_slice(&raw)?)
    })
}

/// Which of the two content keys decrypts an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    Primary,
    Secondary,
}

impl KeySlot {
    pub fn for_item(kind: ContentKind, sub_type: u8) -> Self {
        match kind {
            ContentKind::LegacyMedia(_) if sub_type == PSP_ITEM_TYPE => {
                Self::Primary
            }
            _ => Self::Secondary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentKeys {
    primary: Key,
    secondary: Option<Key>,
}

impl ContentKeys {
    pub fn derive(key_type: u8, iv: &[u8; 16]) -> anyhow::Result<Self> {
        let table = key_table()?;
        let wrapping = match key_type {
            1 => {
                return Ok(Self {
                    primary: table.psp,
                    secondary: Some(table.ps3),
                })
            }
            2 => &table.vita2,
            3 => &table.vita3,
            4 => &table.vita4,
            _ => {
                return Err(PkgError::format(format!(
                    "unsupported pkg key type {}",
                    key_type
                )))
            }
        };
        Ok(Self {
            primary: ecb_encrypt_block(wrapping, iv),
            secondary: None,
        })
    }

    pub fn primary(&self) -> &Key {
        &self.primary
    }

    /// Only type 1 packages carry a distinct secondary key; everywhere else
    /// the secondary slot resolves to the primary key.
    pub fn key(&self, slot: KeySlot) -> &Key {
        match (slot, &self.secondary) {
            (KeySlot::Secondary, Some(key)) => key,
            _ => &self.primary,
        }
    }
}
