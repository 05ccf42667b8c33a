use crate::{
    archive::ArchiveSink,
    cipher::{CtrCipher, BLOCK_SIZE},
    license::License,
    package::Package,
    positioned_io::ReadAt,
    trailer::write_trailers,
    util::check_span,
    CHUNK_SIZE,
};
use bytes::BytesMut;

/// Installed packages keep their digest file as `body.bin`, undecrypted.
pub const DIGS_NAME: &str = "sce_sys/package/digs.bin";
pub const BODY_NAME: &str = "sce_sys/package/body.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    Item {
        index: u32,
        count: u32,
        name: &'a str,
    },
    Trailer(&'a str),
}

/// Write the decrypted package into `sink`.
///
/// The sink is left open so the caller decides when to close it. A license
/// is checked against the package before anything is written.
pub fn unpack<R, S>(
    package: &Package<R>,
    sink: &mut S,
    license: Option<&License>,
    progress: &mut dyn FnMut(Progress<'_>),
) -> anyhow::Result<()>
where
    R: ReadAt,
    S: ArchiveSink + ?Sized,
{
    let info = package.info();
    if let (Some(license), true) = (license, info.accepts_license()) {
        license.validate(info.content_id().as_str())?;
    }

    for folder in info.scaffold() {
        sink.add_folder(&folder)?;
    }

    let root = info.root();
    let table = package.items();
    let count = table.len();
    for index in 0..count {
        let entry = table.read(index)?;
        progress(Progress::Item {
            index,
            count,
            name: &entry.name,
        });

        if entry.is_directory() {
            sink.add_folder(&format!("{}/", entry_path(&root, &entry.name)))?;
            continue;
        }

        let (name, cipher) =
            if !info.kind().is_legacy() && entry.name == DIGS_NAME {
                (BODY_NAME, None)
            } else {
                (
                    entry.name.as_str(),
                    Some((table.cipher(entry.slot), entry.data_offset)),
                )
            };
        sink.begin_file(&entry_path(&root, name), entry.data_size)?;
        copy_span(
            package.source(),
            package.size(),
            table.data_start(entry.data_offset)?,
            entry.data_size,
            sink,
            cipher,
        )?;
        sink.end_file()?;
    }

    write_trailers(package, &root, sink, license, progress)
}

pub fn entry_path(root: &str, name: &str) -> String {
    if root.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{}", root, name)
    }
}

/// Stream `len` bytes at `offset` into the open sink entry.
///
/// With a cipher, each chunk is decrypted at the counter derived from its
/// own position, `data_offset` being the position of `offset` inside the
/// encrypted area.
pub(crate) fn copy_span<R, S>(
    source: &R,
    size: u64,
    offset: u64,
    len: u64,
    sink: &mut S,
    cipher: Option<(&CtrCipher, u64)>,
) -> anyhow::Result<()>
where
    R: ReadAt,
    S: ArchiveSink + ?Sized,
{
    check_span(size, offset, len, "data")?;
    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    buf.resize(CHUNK_SIZE, 0);
    let mut done = 0;
    while done < len {
        let chunk_len = (len - done).min(CHUNK_SIZE as u64) as usize;
        let chunk = &mut buf[..chunk_len];
        source.read_exact_at(offset + done, chunk)?;
        if let Some((cipher, data_offset)) = cipher {
            cipher.xor((data_offset + done) / BLOCK_SIZE as u64, chunk);
        }
        sink.write_chunk(chunk)?;
        done += chunk_len as u64;
    }
    Ok(())
}
