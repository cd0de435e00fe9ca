//! Legacy boot image header.
//!
//! A 64-byte big-endian header in front of the payload. Both the header and
//! the payload are protected by a CRC32.

use core::fmt;

pub const MAGIC: u32 = 0x2705_1956;
pub const HEADER_SIZE: usize = 64;
pub const NAME_LEN: usize = 32;

pub mod os {
    pub const LINUX: u8 = 5;
    pub const U_BOOT: u8 = 17;
    pub const OPENSBI: u8 = 31;
}

pub mod arch {
    pub const ARM64: u8 = 22;
    pub const RISCV: u8 = 26;
}

pub mod kind {
    pub const STANDALONE: u8 = 1;
    pub const KERNEL: u8 = 2;
    pub const FIRMWARE: u8 = 5;
}

pub const COMP_NONE: u8 = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    Truncated,
    BadMagic,
    BadHeaderCrc,
    BadDataCrc,
    Compressed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Truncated => "image truncated",
            Self::BadMagic => "bad image magic",
            Self::BadHeaderCrc => "bad header checksum",
            Self::BadDataCrc => "bad data checksum",
            Self::Compressed => "compressed images are not supported",
        })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub magic: u32,
    pub hcrc: u32,
    pub time: u32,
    pub size: u32,
    pub load: u32,
    pub entry: u32,
    pub dcrc: u32,
    pub os: u8,
    pub arch: u8,
    pub kind: u8,
    pub comp: u8,
    pub name: [u8; NAME_LEN],
}

impl Header {
    /// Builds a sealed header for an uncompressed firmware `payload`.
    pub fn new(name: &str, load: u32, entry: u32, payload: &[u8]) -> Self {
        let mut raw = [0u8; NAME_LEN];
        let len = name.len().min(NAME_LEN - 1);
        raw[..len].copy_from_slice(&name.as_bytes()[..len]);
        let mut ans = Self {
            magic: MAGIC,
            hcrc: 0,
            time: 0,
            size: payload.len() as u32,
            load,
            entry,
            dcrc: crc32fast::hash(payload),
            os: os::U_BOOT,
            arch: arch::RISCV,
            kind: kind::FIRMWARE,
            comp: COMP_NONE,
            name: raw,
        };
        ans.seal();
        ans
    }

    /// Recomputes the header checksum after fields were edited.
    pub fn seal(&mut self) {
        self.hcrc = 0;
        self.hcrc = crc32fast::hash(&self.to_bytes());
    }

    /// Parses and checks magic and header checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let raw: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::Truncated)?;
        let word = |i: usize| u32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&raw[32..]);
        let ans = Self {
            magic: word(0),
            hcrc: word(4),
            time: word(8),
            size: word(12),
            load: word(16),
            entry: word(20),
            dcrc: word(24),
            os: raw[28],
            arch: raw[29],
            kind: raw[30],
            comp: raw[31],
            name,
        };
        if ans.magic != MAGIC {
            return Err(Error::BadMagic);
        }
        let mut zeroed = *raw;
        zeroed[4..8].fill(0);
        if crc32fast::hash(&zeroed) != ans.hcrc {
            return Err(Error::BadHeaderCrc);
        }
        if ans.comp != COMP_NONE {
            return Err(Error::Compressed);
        }
        Ok(ans)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        for (i, word) in [
            self.magic, self.hcrc, self.time, self.size, self.load, self.entry, self.dcrc,
        ]
        .into_iter()
        .enumerate()
        {
            raw[i * 4..][..4].copy_from_slice(&word.to_be_bytes());
        }
        raw[28] = self.os;
        raw[29] = self.arch;
        raw[30] = self.kind;
        raw[31] = self.comp;
        raw[32..].copy_from_slice(&self.name);
        raw
    }

    /// Image name up to the first NUL; non-UTF-8 names read as `"?"`.
    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("?")
    }

    /// Starts a streaming payload check.
    pub fn data_check(&self) -> DataCheck {
        DataCheck {
            expected: self.dcrc,
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn check_data(&self, payload: &[u8]) -> Result<(), Error> {
        if payload.len() < self.size as usize {
            return Err(Error::Truncated);
        }
        let mut check = self.data_check();
        check.update(&payload[..self.size as usize]);
        check.finish()
    }
}

/// Payload CRC fed in chunks, for loaders that cannot map the whole payload.
pub struct DataCheck {
    expected: u32,
    hasher: crc32fast::Hasher,
}

impl DataCheck {
    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    pub fn finish(self) -> Result<(), Error> {
        if self.hasher.finalize() == self.expected {
            Ok(())
        } else {
            Err(Error::BadDataCrc)
        }
    }
}
