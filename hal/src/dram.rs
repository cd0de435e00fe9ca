use crate::Error;
use common::{BoardInfo, DramBank};

/// DRAM controller.
pub trait Dram {
    /// Starts or continues controller training.
    ///
    /// Returns [`nb::Error::WouldBlock`] while calibration is in progress and
    /// `(base, size)` of the detected memory once it is done.
    fn init(&mut self) -> nb::Result<(usize, usize), Error>;

    /// Fills the bank list of `bd` for memory detected at `base`.
    fn banksize(&mut self, base: usize, size: usize, bd: &mut BoardInfo) -> Result<(), Error> {
        bd.set_bank(0, DramBank::new(base, size));
        Ok(())
    }

    /// Highest address the relocated monitor may use.
    fn usable_ram_top(&self, base: usize, size: usize) -> usize {
        base.saturating_add(size)
    }
}
