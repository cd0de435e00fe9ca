//! Runtime environment.

use crate::heap::HeapBuf;
use common::env::{self, Vars, CRC_LEN};
use hal::{memory::Memory, storage::EnvStorage, Error};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvSource {
    Storage,
    /// Built into the image.
    Default,
}

/// Environment held in a heap buffer laid out like the stored blob.
pub struct Env<'h> {
    buf: HeapBuf<'h>,
    source: EnvSource,
}

impl<'h> Env<'h> {
    /// Loads the blob from `storage` and checks its CRC.
    ///
    /// Gives the buffer back on failure so the caller can fall back to the default.
    pub fn load(
        mut buf: HeapBuf<'h>,
        storage: &mut dyn EnvStorage,
    ) -> Result<Self, (HeapBuf<'h>, Error)> {
        let checked = storage
            .load(&mut buf)
            .and_then(|()| env::verify(&buf).map(|_| ()).map_err(Error::from));
        match checked {
            Ok(()) => Ok(Self {
                buf,
                source: EnvSource::Storage,
            }),
            Err(e) => Err((buf, e)),
        }
    }

    /// Copies the built-in entry area at `addr` into `buf`, truncating it to fit.
    pub fn default_from(
        mut buf: HeapBuf<'h>,
        mem: &dyn Memory,
        addr: usize,
        len: usize,
    ) -> Result<Self, Error> {
        buf.fill(0);
        if addr != 0 {
            let data = &mut buf[CRC_LEN..];
            // keep the final NUL so the entry area always terminates
            let n = len.min(data.len() - 1);
            mem.read(addr, &mut data[..n])?;
        }
        Ok(Self {
            buf,
            source: EnvSource::Default,
        })
    }

    #[inline]
    pub fn source(&self) -> EnvSource {
        self.source
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        env::get(&self.buf[CRC_LEN..], key)
    }

    #[inline]
    pub fn vars(&self) -> Vars<'_> {
        env::vars(&self.buf[CRC_LEN..])
    }
}
