#![deny(
    rust_2018_idioms,
    unreachable_pub,
    unsafe_code,
    unused_imports,
    unused_mut,
    missing_debug_implementations
)]

extern crate positioned_io_preview as positioned_io;

pub mod archive;
pub mod cipher;
pub mod content;
pub mod error;
pub mod header;
pub mod item;
pub mod keys;
pub mod license;
pub mod locate;
pub mod magic;
pub mod meta;
pub mod package;
pub mod region;
pub mod sfo;
pub mod trailer;
pub mod unpack;
pub mod util;

pub use positioned_io::{RandomAccessFile, ReadAt};

use rust_embed::RustEmbed;

/// Size of the buffer used when streaming item data into the archive.
pub const CHUNK_SIZE: usize = 1 << 16;

#[derive(Debug, RustEmbed)]
#[folder = "resources/"]
pub struct Resources;
