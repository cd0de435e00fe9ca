use crate::Error;

/// Frozen clock rates, in Hz.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Clocks {
    pub cpu: u32,
    pub bus: u32,
}

/// Clock control unit.
pub trait Ccu {
    /// Programs PLLs and bus dividers. Must be idempotent and must not allocate.
    fn init(&mut self) -> Result<Clocks, Error>;
}
