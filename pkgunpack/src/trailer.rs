use crate::{
    archive::ArchiveSink,
    error::PkgError,
    license::License,
    package::Package,
    positioned_io::ReadAt,
    unpack::{copy_span, entry_path, Progress},
    util::check_span,
};

pub const HEAD_NAME: &str = "sce_sys/package/head.bin";
pub const TAIL_NAME: &str = "sce_sys/package/tail.bin";
pub const STAT_NAME: &str = "sce_sys/package/stat.bin";
pub const WORK_NAME: &str = "sce_sys/package/work.bin";

pub const STAT_SIZE: usize = 768;

/// Write the package bookkeeping files the console expects next to the
/// installed content. Legacy media gets none of them.
pub fn write_trailers<R, S>(
    package: &Package<R>,
    root: &str,
    sink: &mut S,
    license: Option<&License>,
    progress: &mut dyn FnMut(Progress<'_>),
) -> anyhow::Result<()>
where
    R: ReadAt,
    S: ArchiveSink + ?Sized,
{
    let info = package.info();
    if info.kind().is_legacy() {
        return Ok(());
    }
    let header = info.header();

    // Unencrypted header plus the encrypted item table.
    let head_len = header
        .enc_offset
        .checked_add(u64::from(info.blocks().items_size))
        .ok_or_else(|| PkgError::truncated("head.bin span overflows"))?;
    progress(Progress::Trailer(HEAD_NAME));
    raw_entry(package, &entry_path(root, HEAD_NAME), 0, head_len, sink)?;

    let tail_start = header
        .enc_offset
        .checked_add(header.enc_size)
        .filter(|&start| start <= package.size())
        .ok_or_else(|| {
            PkgError::truncated(format!(
                "encrypted area ends past the end of the pkg ({:#X} bytes)",
                package.size()
            ))
        })?;
    progress(Progress::Trailer(TAIL_NAME));
    raw_entry(
        package,
        &entry_path(root, TAIL_NAME),
        tail_start,
        package.size() - tail_start,
        sink,
    )?;

    progress(Progress::Trailer(STAT_NAME));
    sink.begin_file(&entry_path(root, STAT_NAME), STAT_SIZE as u64)?;
    sink.write_chunk(&[0; STAT_SIZE])?;
    sink.end_file()?;

    if let (Some(license), true) = (license, info.accepts_license()) {
        progress(Progress::Trailer(WORK_NAME));
        let blob = license.as_bytes();
        sink.begin_file(&entry_path(root, WORK_NAME), blob.len() as u64)?;
        sink.write_chunk(blob)?;
        sink.end_file()?;
    }
    Ok(())
}

fn raw_entry<R, S>(
    package: &Package<R>,
    path: &str,
    offset: u64,
    len: u64,
    sink: &mut S,
) -> anyhow::Result<()>
where
    R: ReadAt,
    S: ArchiveSink + ?Sized,
{
    check_span(package.size(), offset, len, path)?;
    sink.begin_file(path, len)?;
    copy_span(package.source(), package.size(), offset, len, sink, None)?;
    sink.end_file()
}
