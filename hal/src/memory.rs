//! Physical memory access.

use crate::Error;
use core::ptr::NonNull;

/// Byte-addressed view of the physical address space.
pub trait Memory {
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), Error>;

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), Error>;

    /// Copies `len` bytes from `src` to `dst`; the ranges may overlap.
    fn copy(&mut self, dst: usize, src: usize, len: usize) -> Result<(), Error>;

    fn fill(&mut self, addr: usize, len: usize, byte: u8) -> Result<(), Error>;

    /// Pointer to `len` bytes at `addr`, if the whole range is backed by RAM.
    fn as_mut_ptr(&mut self, addr: usize, len: usize) -> Option<NonNull<u8>>;

    #[inline]
    fn read_u64(&self, addr: usize) -> Result<u64, Error> {
        let mut buf = [0u8; 8];
        self.read(addr, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    #[inline]
    fn write_u64(&mut self, addr: usize, value: u64) -> Result<(), Error> {
        self.write(addr, &value.to_le_bytes())
    }
}

/// Identity-mapped physical memory, as seen by M-mode firmware.
pub struct Direct {
    range: core::ops::Range<usize>,
}

impl Direct {
    /// # Safety
    ///
    /// Every address in `range` must be RAM that nothing else accesses while
    /// this value is alive.
    pub const unsafe fn new(range: core::ops::Range<usize>) -> Self {
        Self { range }
    }

    fn check(&self, addr: usize, len: usize) -> Result<(), Error> {
        match addr.checked_add(len) {
            Some(end) if addr >= self.range.start && end <= self.range.end => Ok(()),
            _ => Err(Error::Invalid),
        }
    }
}

impl Memory for Direct {
    fn read(&self, addr: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.check(addr, buf.len())?;
        unsafe { buf.as_mut_ptr().copy_from(addr as *const u8, buf.len()) };
        Ok(())
    }

    fn write(&mut self, addr: usize, data: &[u8]) -> Result<(), Error> {
        self.check(addr, data.len())?;
        unsafe { (addr as *mut u8).copy_from(data.as_ptr(), data.len()) };
        Ok(())
    }

    fn copy(&mut self, dst: usize, src: usize, len: usize) -> Result<(), Error> {
        self.check(dst, len)?;
        self.check(src, len)?;
        unsafe { (dst as *mut u8).copy_from(src as *const u8, len) };
        Ok(())
    }

    fn fill(&mut self, addr: usize, len: usize, byte: u8) -> Result<(), Error> {
        self.check(addr, len)?;
        unsafe { (addr as *mut u8).write_bytes(byte, len) };
        Ok(())
    }

    fn as_mut_ptr(&mut self, addr: usize, len: usize) -> Option<NonNull<u8>> {
        self.check(addr, len).ok()?;
        NonNull::new(addr as *mut u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_access_stays_in_range() {
        let mut ram = [0u8; 64];
        let base = ram.as_mut_ptr() as usize;
        let mut mem = unsafe { Direct::new(base..base + ram.len()) };

        mem.write_u64(base + 8, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(mem.read_u64(base + 8), Ok(0x1122_3344_5566_7788));
        mem.copy(base + 12, base + 8, 8).unwrap();
        assert_eq!(mem.read_u64(base + 12), Ok(0x1122_3344_5566_7788));
        mem.fill(base, 4, 0xaa).unwrap();

        assert_eq!(mem.write(base + 60, &[0; 8]), Err(Error::Invalid));
        assert_eq!(mem.read_u64(base - 8), Err(Error::Invalid));
        assert!(mem.as_mut_ptr(base + 32, 64).is_none());
        drop(mem);
        assert_eq!(ram[..4], [0xaa; 4]);
    }
}
