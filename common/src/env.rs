//! Environment blob: a little-endian CRC32 followed by `key=value\0` entries,
//! terminated by an empty entry and zero-padded to the storage size.

use core::fmt;

pub const CRC_LEN: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    Truncated,
    BadCrc,
    TooLarge,
    InvalidEntry,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Truncated => "environment truncated",
            Self::BadCrc => "bad CRC",
            Self::TooLarge => "environment does not fit",
            Self::InvalidEntry => "invalid environment entry",
        })
    }
}

/// Checks the CRC and returns the entry area.
pub fn verify(blob: &[u8]) -> Result<&[u8], Error> {
    if blob.len() <= CRC_LEN {
        return Err(Error::Truncated);
    }
    let (crc, data) = blob.split_at(CRC_LEN);
    let crc = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    if crc32fast::hash(data) == crc {
        Ok(data)
    } else {
        Err(Error::BadCrc)
    }
}

/// Iterates `(key, value)` pairs of an entry area. Malformed entries are skipped.
pub fn vars(data: &[u8]) -> Vars<'_> {
    Vars { rest: data }
}

/// Looks `key` up; a later definition wins over an earlier one.
pub fn get<'a>(data: &'a [u8], key: &str) -> Option<&'a str> {
    vars(data).filter(|(k, _)| *k == key).last().map(|(_, v)| v)
}

/// Serializes `vars` into `out`, which receives a complete blob of `out.len()` bytes.
pub fn encode<'a, I>(vars: I, out: &mut [u8]) -> Result<(), Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    if out.len() <= CRC_LEN {
        return Err(Error::TooLarge);
    }
    let (crc, data) = out.split_at_mut(CRC_LEN);
    data.fill(0);
    let mut pos = 0;
    for (key, value) in vars {
        if key.is_empty() || key.contains('=') || key.contains('\0') || value.contains('\0') {
            return Err(Error::InvalidEntry);
        }
        let len = key.len() + 1 + value.len() + 1;
        // keep room for the terminating empty entry
        if pos + len + 1 > data.len() {
            return Err(Error::TooLarge);
        }
        data[pos..][..key.len()].copy_from_slice(key.as_bytes());
        data[pos + key.len()] = b'=';
        data[pos + key.len() + 1..][..value.len()].copy_from_slice(value.as_bytes());
        pos += len;
    }
    crc.copy_from_slice(&crc32fast::hash(data).to_le_bytes());
    Ok(())
}

pub struct Vars<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Vars<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let end = self.rest.iter().position(|&c| c == 0).unwrap_or(self.rest.len());
            if end == 0 {
                return None;
            }
            let entry = &self.rest[..end];
            self.rest = self.rest.get(end + 1..).unwrap_or(&[]);
            let Ok(entry) = core::str::from_utf8(entry) else {
                continue;
            };
            if let Some((key, value)) = entry.split_once('=') {
                if !key.is_empty() {
                    return Some((key, value));
                }
            }
        }
    }
}
