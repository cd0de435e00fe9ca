//! Where the monitor goes in DRAM.
//!
//! The relocated image sits below the top of RAM; heap, board info, global
//! data and the stack are carved upward from its end:
//!
//! ```text
//! relocaddr                                                        ram_top
//! | image (mon_len) | malloc | board info | global data | stack ... |
//! ```

use common::memory::{align_down, align_up, overlaps};
use core::ops::Range;
use hal::Error;

/// Slack between carve-outs and the stack top.
const PADDING: usize = 32;

/// Sizes of the regions reserved next to the relocated image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Reserve {
    pub malloc: usize,
    pub board_info: usize,
    pub global_data: usize,
    pub stack: usize,
}

impl Reserve {
    /// Bytes needed beyond the image itself, each region 16-byte aligned.
    pub fn extra(&self) -> Option<usize> {
        [self.malloc, self.board_info, self.global_data, self.stack]
            .into_iter()
            .try_fold(PADDING, |acc, len| acc.checked_add(align_up(len, 16)?))
    }
}

/// `round_down(ram_top - (image_size + reserved_extra), align)`.
pub fn relocation_address(
    ram_top: usize,
    image_size: usize,
    reserved_extra: usize,
    align: usize,
) -> Result<usize, Error> {
    if !align.is_power_of_two() {
        return Err(Error::Invalid);
    }
    let total = image_size
        .checked_add(reserved_extra)
        .ok_or(Error::NoMemory)?;
    let addr = ram_top.checked_sub(total).ok_or(Error::NoMemory)?;
    Ok(align_down(addr, align))
}

/// Inputs of the layout computation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LayoutInput {
    pub ram_base: usize,
    pub ram_top: usize,
    pub link_addr: usize,
    pub mon_len: usize,
    pub align: usize,
    pub reserve: Reserve,
}

/// Result of the layout computation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelocPlan {
    pub relocaddr: usize,
    /// `relocaddr - link_addr`, modulo the address width.
    pub reloc_off: usize,
    pub mon_len: usize,
    pub malloc: Range<usize>,
    pub board_info: usize,
    pub global_data: usize,
    pub stack: Range<usize>,
}

impl RelocPlan {
    /// Pure function of `input`.
    pub fn compute(input: &LayoutInput) -> Result<Self, Error> {
        let extra = input.reserve.extra().ok_or(Error::NoMemory)?;
        let relocaddr = relocation_address(input.ram_top, input.mon_len, extra, input.align)?;
        if relocaddr < input.ram_base {
            return Err(Error::NoMemory);
        }
        let image = relocaddr..relocaddr + input.mon_len;
        let running = input.link_addr..input.link_addr.saturating_add(input.mon_len);
        // copying over the running image would destroy the code doing the copy
        if relocaddr != input.link_addr && overlaps(&image, &running) {
            return Err(Error::Overlap);
        }

        let mut cursor = align_up(image.end, 16).ok_or(Error::NoMemory)?;
        let mut carve = |len: usize| {
            let start = cursor;
            cursor += align_up(len, 16).unwrap_or(usize::MAX);
            start..cursor
        };
        let malloc = carve(input.reserve.malloc);
        let board_info = carve(input.reserve.board_info).start;
        let global_data = carve(input.reserve.global_data).start;
        let stack = cursor..align_down(input.ram_top, 16);
        debug_assert!(stack.len() >= input.reserve.stack);

        Ok(Self {
            relocaddr,
            reloc_off: relocaddr.wrapping_sub(input.link_addr),
            mon_len: input.mon_len,
            malloc,
            board_info,
            global_data,
            stack,
        })
    }

    /// The relocated image.
    #[inline]
    pub fn image(&self) -> Range<usize> {
        self.relocaddr..self.relocaddr + self.mon_len
    }

    /// Everything the relocated monitor owns.
    #[inline]
    pub fn monitor(&self) -> Range<usize> {
        self.relocaddr..self.stack.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVE: Reserve = Reserve {
        malloc: 0x10_0000,
        board_info: 80,
        global_data: 1024,
        stack: 0x4000,
    };

    fn input(ram_top: usize) -> LayoutInput {
        LayoutInput {
            ram_base: 0x4000_0000,
            ram_top,
            link_addr: 0x2_0000,
            mon_len: 0x8000,
            align: 0x1000,
            reserve: RESERVE,
        }
    }

    #[test]
    fn regions_are_disjoint_and_ordered() {
        let plan = RelocPlan::compute(&input(0x4800_0000)).unwrap();
        assert_eq!(plan.relocaddr % 0x1000, 0);
        assert!(plan.image().end <= plan.malloc.start);
        assert!(plan.malloc.end <= plan.board_info);
        assert!(plan.board_info + 80 <= plan.global_data);
        assert!(plan.global_data + 1024 <= plan.stack.start);
        assert!(plan.stack.len() >= RESERVE.stack);
        assert!(plan.stack.end <= 0x4800_0000);
        assert_eq!(plan.reloc_off, plan.relocaddr - 0x2_0000);
    }

    #[test]
    fn bad_alignment_and_small_ram_are_rejected() {
        assert_eq!(relocation_address(0x9000_0000, 0x1000, 0, 0x1800), Err(Error::Invalid));
        assert_eq!(relocation_address(0x1000, 0x1000, 1, 0x1000), Err(Error::NoMemory));
        assert_eq!(
            RelocPlan::compute(&input(0x4000_8000)),
            Err(Error::NoMemory)
        );
    }

    #[test]
    fn overlapping_the_running_image_is_rejected() {
        let mut inp = input(0x4800_0000);
        let plan = RelocPlan::compute(&inp).unwrap();
        inp.link_addr = plan.relocaddr + 0x100;
        assert_eq!(RelocPlan::compute(&inp), Err(Error::Overlap));
        inp.link_addr = plan.relocaddr;
        assert_eq!(RelocPlan::compute(&inp).unwrap().reloc_off, 0);
    }
}
