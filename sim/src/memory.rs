use hal::{memory::Memory, Error};
use std::ptr::NonNull;

struct Region {
    base: usize,
    data: Box<[u8]>,
}

/// Banked RAM: each region is a zero-initialised host buffer at a fixed
/// physical base. Accesses must stay within one region.
#[derive(Default)]
pub struct SimMemory {
    regions: Vec<Region>,
}

impl SimMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `size` bytes of zeroed RAM at `base`.
    pub fn add_region(&mut self, base: usize, size: usize) -> &mut Self {
        self.regions.push(Region {
            base,
            data: vec![0u8; size].into_boxed_slice(),
        });
        self
    }

    fn locate(&self, addr: usize, len: usize) -> Result<(usize, usize), Error> {
        let end = addr.checked_add(len).ok_or(Error::Invalid)?;
        self.regions
            .iter()
            .enumerate()
            .find(|(_, r)| addr >= r.base && end <= r.base + r.data.len())
            .map(|(i, r)| (i, addr - r.base))
            .ok_or(Error::Invalid)
    }

    pub fn slice(&self, addr: usize, len: usize) -> Result<&[u8], Error> {
        let (i, off) = self.locate(addr, len)?;
        Ok(&self.regions[i].data[off..][..len])
    }

    pub fn slice_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8], Error> {
        let (i, off) = self.locate(addr, len)?;
        Ok(&mut self.regions[i].data[off..][..len])
    }
}

impl Memory for SimMemory {
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), Error> {
        buf.copy_from_slice(self.slice(addr, buf.len())?);
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), Error> {
        self.slice_mut(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    fn copy(&mut self, dst: usize, src: usize, len: usize) -> Result<(), Error> {
        let (si, soff) = self.locate(src, len)?;
        let (di, doff) = self.locate(dst, len)?;
        if si == di {
            self.regions[si].data.copy_within(soff..soff + len, doff);
        } else {
            let tmp = self.regions[si].data[soff..][..len].to_vec();
            self.regions[di].data[doff..][..len].copy_from_slice(&tmp);
        }
        Ok(())
    }

    fn fill(&mut self, addr: usize, len: usize, byte: u8) -> Result<(), Error> {
        self.slice_mut(addr, len)?.fill(byte);
        Ok(())
    }

    fn as_mut_ptr(&mut self, addr: usize, len: usize) -> Option<NonNull<u8>> {
        self.slice_mut(addr, len)
            .ok()
            .and_then(|s| NonNull::new(s.as_mut_ptr()))
    }
}
