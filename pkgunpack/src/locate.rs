use crate::{
    error::PkgError,
    item::ItemTable,
    positioned_io::ReadAt,
    sfo::{self, SfoInfo},
};

pub const LEGACY_SFO_NAME: &str = "PARAM.SFO";

/// Legacy media packages carry their `PARAM.SFO` as a regular item instead
/// of pointing at it from a metadata block, so the title has to be dug out
/// of the item table.
pub fn find_legacy_title<R: ReadAt>(
    table: &ItemTable<'_, R>,
) -> anyhow::Result<Vec<u8>> {
    for entry in table.iter() {
        let entry = entry?;
        if entry.name != LEGACY_SFO_NAME {
            continue;
        }
        log::debug!("Found {} at item {}", LEGACY_SFO_NAME, entry.index);
        sfo::check_size(entry.data_size)?;
        let buf = table.read_data(&entry, sfo::MAX_SFO_SIZE)?;
        return SfoInfo::parse_title(&buf);
    }
    Err(PkgError::format(format!(
        "cannot find {} in pkg items, pkg is probably corrupted",
        LEGACY_SFO_NAME
    )))
}
