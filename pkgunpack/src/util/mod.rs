use crate::{error::PkgError, positioned_io::ReadAt};
use std::ffi::OsString;

/// Fail unless `[offset, offset + len)` lies inside a container of `size`
/// bytes.
pub fn check_span(
    size: u64,
    offset: u64,
    len: u64,
    what: &str,
) -> anyhow::Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(PkgError::truncated(format!(
            "pkg file is too short, {} at {:#X}+{:#X} exceeds {:#X}",
            what, offset, len, size
        ))),
    }
}

/// Bound-checked positioned read.
pub fn read_span<R: ReadAt>(
    source: &R,
    size: u64,
    offset: u64,
    len: usize,
    what: &str,
) -> anyhow::Result<Vec<u8>> {
    check_span(size, offset, len as u64, what)?;
    let mut buf = vec![0; len];
    source.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}

/// Bytes up to (not including) the first NUL.
pub fn c_str(buf: &[u8]) -> &[u8] {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    &buf[..end]
}

/// Raw file name bytes as an `OsString`. Unix takes them unchanged,
/// elsewhere invalid UTF-8 is replaced.
#[cfg(unix)]
pub fn os_string(name: Vec<u8>) -> OsString {
    use std::os::unix::ffi::OsStringExt;
    OsString::from_vec(name)
}

#[cfg(not(unix))]
pub fn os_string(name: Vec<u8>) -> OsString {
    OsString::from(String::from_utf8_lossy(&name).into_owned())
}
