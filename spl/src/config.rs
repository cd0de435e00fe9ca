//! Board configuration, fixed at build time.

use crate::reloc::Arch;
use common::{memory, BootDevice};

/// Everything a board port chooses at build time.
#[derive(Clone, Debug)]
pub struct Config {
    /// Printed in the banner.
    pub board: &'static str,
    pub arch: Arch,
    pub baudrate: u32,
    /// Pre-DRAM home of global data, inside on-chip SRAM.
    pub scratch_addr: usize,
    /// Alignment of the relocation address; a power of two.
    pub reloc_align: usize,
    pub malloc_len: usize,
    pub stack_size: usize,
    /// Upper bound on DRAM training.
    pub dram_timeout_us: u64,
    /// Boot-mode strap value to primary boot device.
    pub boot_modes: &'static [(u32, BootDevice)],
    /// Tried in order after the primary device, unless `boot_targets` is set.
    pub boot_fallback: &'static [BootDevice],
    /// Where loaders place the image, header included.
    pub load_addr: usize,
    pub max_image_size: usize,
    /// Accept images without a legacy header, entered at `load_addr`.
    pub raw_image_support: bool,
    /// Size of the environment blob, CRC included.
    pub env_size: usize,
    pub enable_interrupts: bool,
    /// Reset the SoC instead of parking when boot fails.
    pub reset_on_hang: bool,
}

impl Config {
    pub const DEFAULT: Self = Self {
        board: "generic",
        arch: Arch::Riscv64,
        baudrate: 115_200,
        scratch_addr: memory::SRAM + 0x1_f000,
        reloc_align: memory::PAGE,
        malloc_len: 0x10_0000,
        stack_size: 0x1_0000,
        dram_timeout_us: 100_000,
        boot_modes: &[
            (0, BootDevice::Mmc(1)),
            (1, BootDevice::Spi),
            (2, BootDevice::Nand),
            (3, BootDevice::Usb),
            (4, BootDevice::Ram),
        ],
        boot_fallback: &[BootDevice::Spi],
        load_addr: memory::DRAM + 0x20_0000,
        max_image_size: 0x20_0000,
        raw_image_support: true,
        env_size: 0x2000,
        enable_interrupts: false,
        reset_on_hang: false,
    };

    /// Primary boot device for a strap value.
    pub fn boot_device(&self, mode: u32) -> Option<BootDevice> {
        self.boot_modes
            .iter()
            .find(|(m, _)| *m == mode)
            .map(|(_, dev)| *dev)
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}
