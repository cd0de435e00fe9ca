/// Core-level operations of the boot hart.
pub trait Cpu {
    fn disable_interrupts(&mut self);

    fn enable_interrupts(&mut self);

    /// Writes back data cache lines covering `start..end`.
    fn flush_dcache_range(&mut self, start: usize, end: usize);

    fn invalidate_icache_all(&mut self);

    /// Transfers control to `entry`, passing `arg` in the first argument register.
    ///
    /// Returns only if the image returns, which the caller treats as an error.
    fn jump_to_image(&mut self, entry: usize, arg: usize);

    /// Resets the whole SoC.
    fn reset(&mut self) -> !;
}
