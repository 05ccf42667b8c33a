#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Magic {
    Pkg,
    Zip,
    NotRecognized,
}

impl Magic {
    /// Parse first few bytes of file to detect its type
    pub fn parse(buf: &[u8]) -> Self {
        match buf {
            // \x7FPKG
            [0x7F, 0x50, 0x4B, 0x47, ..] => Self::Pkg,
            // PK\x03\x04, usually an already unpacked package
            [0x50, 0x4B, 0x03, 0x04, ..] => Self::Zip,
            _ => Self::NotRecognized,
        }
    }

    pub fn is_pkg(self) -> bool {
        self == Self::Pkg
    }
}
