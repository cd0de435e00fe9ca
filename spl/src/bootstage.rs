//! Boot progress timestamps.

use core::fmt;

pub const MAX_RECORDS: usize = 16;

/// Boot milestones.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootstageId {
    Start,
    ConsoleReady,
    DramReady,
    Relocated,
    BoardInitR,
    BootDevice,
    ImageLoaded,
    Handoff,
}

impl BootstageId {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ConsoleReady => "console_ready",
            Self::DramReady => "dram_ready",
            Self::Relocated => "relocated",
            Self::BoardInitR => "board_init_r",
            Self::BootDevice => "boot_device",
            Self::ImageLoaded => "image_loaded",
            Self::Handoff => "handoff",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Record {
    pub id: BootstageId,
    pub time_us: u64,
}

/// Fixed-size record table kept in global data.
pub struct Bootstage {
    records: [Record; MAX_RECORDS],
    len: usize,
    dropped: usize,
}

impl Bootstage {
    pub(crate) const fn new() -> Self {
        Self {
            records: [Record {
                id: BootstageId::Start,
                time_us: 0,
            }; MAX_RECORDS],
            len: 0,
            dropped: 0,
        }
    }

    /// Records `id` at `time_us`; once the table is full further marks are counted only.
    pub fn mark(&mut self, id: BootstageId, time_us: u64) {
        match self.records.get_mut(self.len) {
            Some(slot) => {
                *slot = Record { id, time_us };
                self.len += 1;
            }
            None => self.dropped += 1,
        }
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records[..self.len]
    }

    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn get(&self, id: BootstageId) -> Option<u64> {
        self.records().iter().find(|r| r.id == id).map(|r| r.time_us)
    }

    /// Logs every record with the time since the previous one.
    pub fn report(&self) {
        let mut prev = 0;
        for r in self.records() {
            log::info!("{}", Line { record: r, prev });
            prev = r.time_us;
        }
        if self.dropped != 0 {
            log::warn!("bootstage: {} records dropped", self.dropped);
        }
    }
}

struct Line<'a> {
    record: &'a Record,
    prev: u64,
}

impl fmt::Display for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>11}us {:>+11}us  {}",
            self.record.time_us,
            self.record.time_us.saturating_sub(self.prev),
            self.record.id.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_table_counts_drops() {
        let mut stage = Bootstage::new();
        for i in 0..MAX_RECORDS as u64 + 3 {
            stage.mark(BootstageId::BootDevice, i);
        }
        assert_eq!(stage.records().len(), MAX_RECORDS);
        assert_eq!(stage.dropped(), 3);
        assert_eq!(stage.get(BootstageId::BootDevice), Some(0));
        assert_eq!(stage.get(BootstageId::Handoff), None);
    }
}
