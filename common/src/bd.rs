//! Board information: detected DRAM banks and board identity.

use core::ops::Range;

/// Maximum number of DRAM banks a board may report.
pub const NR_DRAM_BANKS: usize = 4;

/// One contiguous DRAM bank.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DramBank {
    pub start: usize,
    pub size: usize,
}

impl DramBank {
    pub const EMPTY: Self = Self { start: 0, size: 0 };

    #[inline]
    pub const fn new(start: usize, size: usize) -> Self {
        Self { start, size }
    }

    #[inline]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.start + self.size
    }
}

/// Board information handed from DRAM sizing to the layout code and the next stage.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BoardInfo {
    /// unique id for this board
    pub arch_number: u32,
    /// where this board expects boot parameters
    pub boot_params: usize,
    dram: [DramBank; NR_DRAM_BANKS],
}

impl BoardInfo {
    pub const EMPTY: Self = Self {
        arch_number: 0,
        boot_params: 0,
        dram: [DramBank::EMPTY; NR_DRAM_BANKS],
    };

    /// Stores `bank` at `index`.
    ///
    /// Returns `false` if `index` is beyond [`NR_DRAM_BANKS`].
    pub fn set_bank(&mut self, index: usize, bank: DramBank) -> bool {
        match self.dram.get_mut(index) {
            Some(slot) => {
                *slot = bank;
                true
            }
            None => false,
        }
    }

    /// Non-empty banks in slot order.
    pub fn banks(&self) -> impl Iterator<Item = &DramBank> + '_ {
        self.dram.iter().filter(|b| b.size != 0)
    }

    #[inline]
    pub fn total_size(&self) -> usize {
        self.banks().map(|b| b.size).sum()
    }

    /// Banks must be non-empty, ascending and disjoint.
    pub fn is_well_formed(&self) -> bool {
        let mut prev_end = None;
        let mut any = false;
        for bank in self.banks() {
            any = true;
            let Some(end) = bank.start.checked_add(bank.size) else {
                return false;
            };
            if matches!(prev_end, Some(prev) if bank.start < prev) {
                return false;
            }
            prev_end = Some(end);
        }
        any
    }
}

impl Default for BoardInfo {
    fn default() -> Self {
        Self::EMPTY
    }
}
