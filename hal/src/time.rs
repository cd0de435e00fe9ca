use crate::Error;
use embedded_hal::delay::DelayNs;

/// Free-running timer, usable before DRAM and without interrupts.
pub trait Timer: DelayNs {
    fn init(&mut self) -> Result<(), Error>;

    /// Microseconds since [`Timer::init`].
    fn micros(&self) -> u64;
}
