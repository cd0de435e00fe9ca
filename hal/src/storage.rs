//! Boot media.

use crate::{memory::Memory, Error};
use common::BootDevice;

/// Where the persistent environment lives.
pub trait EnvStorage {
    /// Reads the raw environment blob into `buf`, which is exactly the configured size.
    fn load(&mut self, buf: &mut [u8]) -> Result<(), Error>;
}

/// Reads a next-stage image from one kind of boot medium.
pub trait Loader {
    fn name(&self) -> &'static str;

    fn supports(&self, device: BootDevice) -> bool;

    /// Copies at most `max_len` bytes of the image on `device` to `dest`.
    ///
    /// Returns the number of bytes placed.
    fn load(
        &mut self,
        device: BootDevice,
        mem: &mut dyn Memory,
        dest: usize,
        max_len: usize,
    ) -> Result<usize, Error>;
}
