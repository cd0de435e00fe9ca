//! Global data.
//!
//! One record carries board state through every boot phase. It starts in
//! on-chip scratch memory and is moved exactly once, to the slot reserved
//! for it next to the relocated image. The move consumes the early handle,
//! so no code can keep using the pre-relocation copy.

use crate::{bootstage::Bootstage, console::PreConsole, layout::RelocPlan};
use common::{BoardInfo, BootDevice};
use core::{
    fmt,
    marker::PhantomData,
    ops::{BitOr, Deref, DerefMut, Range},
};

/// Global data before relocation.
pub struct Early;

/// Global data after relocation.
pub struct Relocated;

/// Boot progress flags.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct GdFlags(u32);

impl GdFlags {
    /// Code is running from its relocated copy.
    pub const RELOC: Self = Self(1 << 0);
    /// Devices may be used.
    pub const DEVINIT: Self = Self(1 << 1);
    /// Console output is suppressed.
    pub const SILENT: Self = Self(1 << 2);
    pub const HAVE_CONSOLE: Self = Self(1 << 3);
    pub const DRAM_READY: Self = Self(1 << 4);
    pub const FULL_MALLOC_INIT: Self = Self(1 << 5);
    pub const ENV_READY: Self = Self(1 << 6);
    /// The built-in environment is in use.
    pub const ENV_DEFAULT: Self = Self(1 << 7);
    /// Linked at the relocation address; nothing was copied.
    pub const SKIP_RELOC: Self = Self(1 << 8);
    pub const SPL_INIT: Self = Self(1 << 9);

    const NAMES: [(Self, &'static str); 10] = [
        (Self::RELOC, "RELOC"),
        (Self::DEVINIT, "DEVINIT"),
        (Self::SILENT, "SILENT"),
        (Self::HAVE_CONSOLE, "HAVE_CONSOLE"),
        (Self::DRAM_READY, "DRAM_READY"),
        (Self::FULL_MALLOC_INIT, "FULL_MALLOC_INIT"),
        (Self::ENV_READY, "ENV_READY"),
        (Self::ENV_DEFAULT, "ENV_DEFAULT"),
        (Self::SKIP_RELOC, "SKIP_RELOC"),
        (Self::SPL_INIT, "SPL_INIT"),
    ];

    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for GdFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for GdFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}

/// The global data record.
pub struct GlobalData {
    pub bd: BoardInfo,
    /// Flags given by the boot ROM or the previous stage.
    pub boot_flags: u32,
    pub cpu_clk: u32,
    pub bus_clk: u32,
    pub baudrate: u32,
    pub ram_base: usize,
    pub ram_size: usize,
    /// Top of RAM usable by the monitor.
    pub ram_top: usize,
    /// Image size including BSS.
    pub mon_len: usize,
    pub relocaddr: usize,
    pub malloc_base: usize,
    pub malloc_limit: usize,
    pub start_addr_sp: usize,
    /// Where global data lives after relocation.
    pub new_gd: usize,
    /// Reserved board-info slot.
    pub bd_addr: usize,
    /// Device tree, zero if none.
    pub fdt_blob: usize,
    /// Built-in environment, zero if none.
    pub env_addr: usize,
    pub env_len: usize,
    pub boot_device: Option<BootDevice>,
    reloc_off: usize,
    flags: GdFlags,
    pub(crate) precon: PreConsole,
    pub(crate) bootstage: Bootstage,
}

impl GlobalData {
    const fn new() -> Self {
        Self {
            bd: BoardInfo::EMPTY,
            boot_flags: 0,
            cpu_clk: 0,
            bus_clk: 0,
            baudrate: 0,
            ram_base: 0,
            ram_size: 0,
            ram_top: 0,
            mon_len: 0,
            relocaddr: 0,
            malloc_base: 0,
            malloc_limit: 0,
            start_addr_sp: 0,
            new_gd: 0,
            bd_addr: 0,
            fdt_blob: 0,
            env_addr: 0,
            env_len: 0,
            boot_device: None,
            reloc_off: 0,
            flags: GdFlags::empty(),
            precon: PreConsole::new(),
            bootstage: Bootstage::new(),
        }
    }

    /// Distance from the link address to the relocated copy; zero before relocation.
    #[inline]
    pub fn reloc_off(&self) -> usize {
        self.reloc_off
    }

    #[inline]
    pub fn flags(&self) -> GdFlags {
        self.flags
    }

    /// Sets board-owned flags. `RELOC` is only ever set by relocation.
    pub fn set_flags(&mut self, flags: GdFlags) {
        let mut flags = flags;
        flags.remove(GdFlags::RELOC);
        self.flags.insert(flags);
    }

    #[inline]
    pub fn bootstage(&self) -> &Bootstage {
        &self.bootstage
    }
}

/// Handle to the live global data in boot phase `S`.
pub struct Gd<S> {
    addr: usize,
    data: GlobalData,
    _stage: PhantomData<S>,
}

impl<S> Gd<S> {
    /// Address the live record occupies.
    #[inline]
    pub fn addr(&self) -> usize {
        self.addr
    }
}

impl Gd<Early> {
    /// Places a zeroed record at `scratch`, a link-time constant in on-chip memory.
    pub fn init(scratch: usize) -> Self {
        Self {
            addr: scratch,
            data: GlobalData::new(),
            _stage: PhantomData,
        }
    }

    /// Moves global data to the slot `plan` reserved for it.
    ///
    /// Every pointer that referred into `image` at its link address is moved
    /// by the relocation offset, exactly once. After this the early handle is
    /// gone and the returned one is the only way to reach global data.
    pub fn relocate(self, plan: &RelocPlan, image: Range<usize>) -> Gd<Relocated> {
        let mut data = self.data;
        let off = plan.reloc_off;
        let fix = |ptr: usize| {
            if ptr != 0 && image.contains(&ptr) {
                ptr.wrapping_add(off)
            } else {
                ptr
            }
        };
        data.fdt_blob = fix(data.fdt_blob);
        data.env_addr = fix(data.env_addr);
        data.relocaddr = plan.relocaddr;
        data.reloc_off = off;
        data.new_gd = plan.global_data;
        data.bd_addr = plan.board_info;
        data.flags.insert(GdFlags::RELOC);
        log::debug!("global data {:#x} -> {:#x}", self.addr, plan.global_data);
        Gd {
            addr: plan.global_data,
            data,
            _stage: PhantomData,
        }
    }
}

impl<S> Deref for Gd<S> {
    type Target = GlobalData;

    #[inline]
    fn deref(&self) -> &GlobalData {
        &self.data
    }
}

impl<S> DerefMut for Gd<S> {
    #[inline]
    fn deref_mut(&mut self) -> &mut GlobalData {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    #[test]
    fn flags_debug_lists_names() {
        let flags = GdFlags::RELOC | GdFlags::ENV_DEFAULT;
        assert_eq!(format!("{flags:?}"), "{RELOC, ENV_DEFAULT}");
        assert!(flags.contains(GdFlags::RELOC));
        assert!(!flags.contains(GdFlags::RELOC | GdFlags::SILENT));
    }

    #[test]
    fn board_code_cannot_claim_relocation() {
        let mut gd = Gd::init(0x3_f000);
        gd.set_flags(GdFlags::RELOC | GdFlags::SILENT);
        assert_eq!(gd.flags(), GdFlags::SILENT);
        assert_eq!(gd.reloc_off(), 0);
        assert_eq!(gd.addr(), 0x3_f000);
    }
}
