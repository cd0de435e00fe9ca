//! Self-relocation: copy the running image to its DRAM home and patch it.

use crate::{
    gd::{Early, Gd, Relocated},
    layout::RelocPlan,
};
use common::NR_DRAM_BANKS;
use core::ops::Range;
use hal::{cpu::Cpu, memory::Memory, Error};

/// Size of an ELF64 `Rela` entry.
pub const RELA_SIZE: usize = 24;

/// Bytes board info takes in its reserved slot.
pub const BOARD_INFO_LEN: usize = 16 + 16 * NR_DRAM_BANKS;

/// Target architecture, selecting the relocation type that may appear in `.rela.dyn`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Arch {
    Aarch64,
    Riscv64,
}

impl Arch {
    /// The `*_RELATIVE` relocation type.
    pub const fn r_relative(self) -> u32 {
        match self {
            Self::Aarch64 => 1027,
            Self::Riscv64 => 3,
        }
    }
}

/// One `.rela.dyn` entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rela {
    pub offset: u64,
    pub info: u64,
    pub addend: i64,
}

impl Rela {
    pub fn parse(raw: &[u8; RELA_SIZE]) -> Self {
        let word = |i: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&raw[i * 8..][..8]);
            u64::from_le_bytes(buf)
        };
        Self {
            offset: word(0),
            info: word(1),
            addend: word(2) as i64,
        }
    }

    pub fn to_bytes(&self) -> [u8; RELA_SIZE] {
        let mut raw = [0u8; RELA_SIZE];
        raw[..8].copy_from_slice(&self.offset.to_le_bytes());
        raw[8..16].copy_from_slice(&self.info.to_le_bytes());
        raw[16..].copy_from_slice(&self.addend.to_le_bytes());
        raw
    }

    #[inline]
    pub const fn kind(&self) -> u32 {
        self.info as u32
    }
}

/// Linker-provided facts about the running image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageInfo {
    pub link_addr: usize,
    /// End of the bytes that are copied, i.e. text and data.
    pub copy_end: usize,
    pub rela_start: usize,
    pub rela_end: usize,
    pub bss_start: usize,
    pub bss_end: usize,
    pub entry: usize,
    /// Device tree linked into the image.
    pub fdt: Option<usize>,
    /// Built-in environment, as `(address, length)` of its entry area.
    pub default_env: Option<(usize, usize)>,
}

impl ImageInfo {
    #[inline]
    pub const fn mon_len(&self) -> usize {
        self.bss_end - self.link_addr
    }

    /// Address range the image occupies at its link address.
    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.link_addr..self.bss_end
    }

    #[inline]
    pub const fn copy_len(&self) -> usize {
        self.copy_end - self.link_addr
    }

    fn relas<'m>(
        &self,
        mem: &'m dyn Memory,
    ) -> impl Iterator<Item = Result<Rela, Error>> + 'm {
        (self.rela_start..self.rela_end)
            .step_by(RELA_SIZE)
            .map(move |addr| {
                let mut raw = [0u8; RELA_SIZE];
                mem.read(addr, &mut raw)?;
                Ok(Rela::parse(&raw))
            })
    }
}

/// Checks the image facts and every relocation entry before anything is copied.
///
/// Returns the number of fixups. Only `arch`'s RELATIVE type is accepted, and
/// each patched word must lie in the copied part of the image.
pub fn validate_relocs(mem: &dyn Memory, image: &ImageInfo, arch: Arch) -> Result<usize, Error> {
    let ordered = image.link_addr <= image.copy_end
        && image.copy_end <= image.bss_start
        && image.bss_start <= image.bss_end
        && image.rela_start <= image.rela_end;
    if !ordered || (image.rela_end - image.rela_start) % RELA_SIZE != 0 {
        return Err(Error::Invalid);
    }
    let patchable = image.link_addr as u64..(image.copy_end as u64).saturating_sub(7);
    let mut count = 0;
    for rela in image.relas(mem) {
        let rela = rela?;
        if rela.kind() != arch.r_relative() {
            log::error!("unsupported relocation type {}", rela.kind());
            return Err(Error::NotSupported);
        }
        if !patchable.contains(&rela.offset) || rela.offset % 8 != 0 {
            log::error!("relocation at {:#x} is outside the image", rela.offset);
            return Err(Error::Invalid);
        }
        count += 1;
    }
    Ok(count)
}

/// Copies the image to `plan.relocaddr`, applies the RELATIVE fixups,
/// writes back caches, then swaps global data to its relocated home.
///
/// Entries are read from the source image, which is still intact. With a
/// zero offset the copy is skipped but global data is swapped all the same.
pub fn relocate_code(
    gd: Gd<Early>,
    plan: &RelocPlan,
    image: &ImageInfo,
    mem: &mut dyn Memory,
    cpu: &mut dyn Cpu,
) -> Result<Gd<Relocated>, (Gd<Early>, Error)> {
    if plan.reloc_off != 0 {
        if let Err(e) = copy_and_fixup(plan, image, mem, cpu) {
            return Err((gd, e));
        }
    }
    if let Err(e) = publish_board_info(&gd, plan.board_info, mem) {
        return Err((gd, e));
    }
    let gd = gd.relocate(plan, image.range());
    log::debug!(
        "continuing at {:#x}",
        image.entry.wrapping_add(gd.reloc_off())
    );
    Ok(gd)
}

fn copy_and_fixup(
    plan: &RelocPlan,
    image: &ImageInfo,
    mem: &mut dyn Memory,
    cpu: &mut dyn Cpu,
) -> Result<usize, Error> {
    let off = plan.reloc_off as u64;
    mem.copy(plan.relocaddr, image.link_addr, image.copy_len())?;
    let mut fixups = 0;
    for i in 0..(image.rela_end - image.rela_start) / RELA_SIZE {
        let mut raw = [0u8; RELA_SIZE];
        mem.read(image.rela_start + i * RELA_SIZE, &mut raw)?;
        let rela = Rela::parse(&raw);
        let target = rela.offset.wrapping_add(off) as usize;
        mem.write_u64(target, (rela.addend as u64).wrapping_add(off))?;
        fixups += 1;
    }
    cpu.flush_dcache_range(plan.relocaddr, plan.relocaddr + image.copy_len());
    cpu.invalidate_icache_all();
    log::debug!("relocated {} bytes, {fixups} fixups", image.copy_len());
    Ok(fixups)
}

/// Stores board info in its reserved slot for the next stage:
/// `arch_number`, `boot_params`, then `(start, size)` per bank, as 64-bit words.
fn publish_board_info(gd: &Gd<Early>, addr: usize, mem: &mut dyn Memory) -> Result<(), Error> {
    mem.write_u64(addr, gd.bd.arch_number as u64)?;
    mem.write_u64(addr + 8, gd.bd.boot_params as u64)?;
    let mut slot = addr + 16;
    for bank in gd.bd.banks() {
        mem.write_u64(slot, bank.start as u64)?;
        mem.write_u64(slot + 8, bank.size as u64)?;
        slot += 16;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rela_layout() {
        let rela = Rela {
            offset: 0x2_0010,
            info: 3,
            addend: 0x2_0100,
        };
        let raw = rela.to_bytes();
        assert_eq!(raw[..8], 0x2_0010u64.to_le_bytes());
        assert_eq!(raw[8], 3);
        assert_eq!(Rela::parse(&raw), rela);
        assert_eq!(rela.kind(), Arch::Riscv64.r_relative());
    }

    #[test]
    fn mon_len_spans_bss() {
        let image = ImageInfo {
            link_addr: 0x2_0000,
            copy_end: 0x2_4000,
            rela_start: 0x2_4000,
            rela_end: 0x2_4030,
            bss_start: 0x2_4000,
            bss_end: 0x2_5000,
            entry: 0x2_0000,
            fdt: None,
            default_env: None,
        };
        assert_eq!(image.mon_len(), 0x5000);
        assert_eq!(image.copy_len(), 0x4000);
    }
}
