use crate::{parse_int, XError};
use common::memory::{DRAM, SRAM};
use spl::{
    layout::{LayoutInput, RelocPlan, Reserve},
    reloc::BOARD_INFO_LEN,
    Config, GlobalData,
};
use std::error::Error;

#[derive(Args)]
pub struct LayoutArgs {
    /// DRAM size, e.g. `512M`.
    #[clap(long, value_parser = parse_int)]
    ram_size: usize,
    #[clap(long, value_parser = parse_int, default_value_t = DRAM)]
    ram_base: usize,
    /// Image size including bss.
    #[clap(long, value_parser = parse_int, default_value_t = 0x8000)]
    mon_len: usize,
    #[clap(long, value_parser = parse_int, default_value_t = SRAM)]
    link_addr: usize,
    #[clap(long, value_parser = parse_int, default_value_t = Config::DEFAULT.reloc_align)]
    align: usize,
    #[clap(long, value_parser = parse_int, default_value_t = Config::DEFAULT.malloc_len)]
    malloc: usize,
    #[clap(long, value_parser = parse_int, default_value_t = Config::DEFAULT.stack_size)]
    stack: usize,
}

impl LayoutArgs {
    pub fn show(&self) -> Result<(), Box<dyn Error>> {
        let ram_top = self
            .ram_base
            .checked_add(self.ram_size)
            .ok_or_else(|| XError::InvalidArgument("DRAM ends beyond the address space".into()))?;
        let input = LayoutInput {
            ram_base: self.ram_base,
            ram_top,
            link_addr: self.link_addr,
            mon_len: self.mon_len,
            align: self.align,
            reserve: Reserve {
                malloc: self.malloc,
                board_info: BOARD_INFO_LEN,
                global_data: std::mem::size_of::<GlobalData>(),
                stack: self.stack,
            },
        };
        let plan = RelocPlan::compute(&input)
            .map_err(|e| XError::InvalidArgument(format!("no layout: {e}")))?;
        debug!("{plan:x?}");
        println!(
            "
| region      | start              | end                |
|-------------|--------------------|--------------------|
| image       | {:#018x} | {:#018x} |
| malloc      | {:#018x} | {:#018x} |
| board info  | {:#018x} | {:#018x} |
| global data | {:#018x} | {:#018x} |
| stack       | {:#018x} | {:#018x} |

relocation offset {:#x}
",
            plan.relocaddr,
            plan.image().end,
            plan.malloc.start,
            plan.malloc.end,
            plan.board_info,
            plan.board_info + input.reserve.board_info,
            plan.global_data,
            plan.global_data + input.reserve.global_data,
            plan.stack.start,
            plan.stack.end,
            plan.reloc_off,
        );
        Ok(())
    }
}
