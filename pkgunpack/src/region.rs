use std::fmt;

/// Publishing region encoded in the first four characters of a title id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Usa,
    Eur,
    Jpn,
    Asa,
    Unknown,
}

impl Region {
    pub fn from_title_id(id: &[u8]) -> Self {
        match id {
            [b'P', b'C', b'S', b'E' | b'A', ..] => Self::Usa,
            [b'P', b'C', b'S', b'F' | b'B', ..] => Self::Eur,
            [b'P', b'C', b'S', b'C' | b'G', ..]
            | [b'V', b'C', b'J', b'S', ..]
            | [b'V', b'L', b'J', b'S' | b'M', ..] => Self::Jpn,
            [b'P', b'C', b'S', b'H' | b'D', ..]
            | [b'V', b'C', b'A', b'S', ..]
            | [b'V', b'L', b'A', b'S', ..] => Self::Asa,
            _ => Self::Unknown,
        }
    }
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usa => "USA",
            Self::Eur => "EUR",
            Self::Jpn => "JPN",
            Self::Asa => "ASA",
            Self::Unknown => "unknown region",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_prefixes() {
        let table = [
            ("PCSE00001", Region::Usa),
            ("PCSA00001", Region::Usa),
            ("PCSF00001", Region::Eur),
            ("PCSB00001", Region::Eur),
            ("PCSC00001", Region::Jpn),
            ("VCJS10001", Region::Jpn),
            ("PCSG00001", Region::Jpn),
            ("VLJS00001", Region::Jpn),
            ("VLJM30001", Region::Jpn),
            ("VCAS32001", Region::Asa),
            ("PCSH00001", Region::Asa),
            ("VLAS00001", Region::Asa),
            ("PCSD00001", Region::Asa),
            ("NPEB00001", Region::Unknown),
            ("pcse00001", Region::Unknown),
            ("PCS", Region::Unknown),
            ("", Region::Unknown),
        ];
        for (id, region) in table.iter() {
            assert_eq!(Region::from_title_id(id.as_bytes()), *region, "{}", id);
        }
        assert_eq!(Region::Unknown.to_string(), "unknown region");
    }

    proptest! {
        #[test]
        fn any_input_resolves(id in proptest::collection::vec(any::<u8>(), 0..12)) {
            let region = Region::from_title_id(&id);
            let known: &[&[u8]] = &[
                b"PCSE", b"PCSA", b"PCSF", b"PCSB", b"PCSC", b"VCJS", b"PCSG",
                b"VLJS", b"VLJM", b"VCAS", b"PCSH", b"VLAS", b"PCSD",
            ];
            let prefixed = id.len() >= 4 && known.contains(&&id[..4]);
            prop_assert_eq!(region != Region::Unknown, prefixed);
        }
    }
}
