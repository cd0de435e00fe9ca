use hal::Error;
use spl::{
    gd::{Gd, GdFlags},
    layout::{relocation_address, LayoutInput, RelocPlan, Reserve},
};

const RESERVE: Reserve = Reserve {
    malloc: 0x10_0000,
    board_info: 80,
    global_data: 512,
    stack: 0x1_0000,
};

#[test]
fn relocation_address_of_a_typical_board() {
    assert_eq!(
        relocation_address(0x9000_0000, 0x8_0000, 0x10_0000, 0x1000),
        Ok(0x8fe8_0000)
    );
    // unaligned results round down
    assert_eq!(
        relocation_address(0x9000_0000, 0x8_0010, 0x10_0000, 0x1000),
        Ok(0x8fe7_f000)
    );
    assert_eq!(
        relocation_address(0x9000_0000, 0, 0, 0x10_0000),
        Ok(0x9000_0000)
    );
}

#[test]
fn plans_fit_below_ram_top() {
    for ram_top in [0x4100_0000, 0x4800_0000, 0x8000_0000, 0xc000_0000] {
        for mon_len in [0x10, 0x8000, 0x3_4567] {
            for align in [0x10, 0x1000, 0x1_0000] {
                let input = LayoutInput {
                    ram_base: 0x4000_0000,
                    ram_top,
                    link_addr: 0x2_0000,
                    mon_len,
                    align,
                    reserve: RESERVE,
                };
                let plan = RelocPlan::compute(&input).unwrap();
                let extra = RESERVE.extra().unwrap();

                assert_eq!(plan.relocaddr % align, 0);
                assert!(plan.relocaddr >= input.ram_base);
                assert!(plan.relocaddr + mon_len + extra <= ram_top);
                assert!(plan.image().end <= plan.malloc.start);
                assert_eq!(plan.malloc.len(), RESERVE.malloc);
                assert!(plan.malloc.end <= plan.board_info);
                assert!(plan.board_info + RESERVE.board_info <= plan.global_data);
                assert!(plan.global_data + RESERVE.global_data <= plan.stack.start);
                assert!(plan.stack.len() >= RESERVE.stack);
                assert!(plan.monitor().end <= ram_top);
                assert_eq!(plan.relocaddr.wrapping_sub(plan.reloc_off), input.link_addr);
                // same input, same plan
                assert_eq!(RelocPlan::compute(&input), Ok(plan));
            }
        }
    }
}

#[test]
fn oversized_monitor_is_rejected() {
    let input = LayoutInput {
        ram_base: 0x4000_0000,
        ram_top: 0x4010_0000,
        link_addr: 0x2_0000,
        mon_len: 0x1_0000,
        align: 0x1000,
        reserve: RESERVE,
    };
    assert_eq!(RelocPlan::compute(&input), Err(Error::NoMemory));
}

#[test]
fn global_data_follows_the_image() {
    let input = LayoutInput {
        ram_base: 0x4000_0000,
        ram_top: 0x4800_0000,
        link_addr: 0x2_0000,
        mon_len: 0x9000,
        align: 0x1000,
        reserve: RESERVE,
    };
    let plan = RelocPlan::compute(&input).unwrap();
    let image = input.link_addr..input.link_addr + input.mon_len;

    let mut gd = Gd::init(0x3_f000);
    gd.fdt_blob = 0x2_8000;
    gd.env_addr = 0x2_8800;
    let old = (gd.addr(), gd.fdt_blob, gd.env_addr);

    let gd = gd.relocate(&plan, image);
    assert_eq!(gd.addr(), plan.global_data);
    assert_eq!(gd.addr(), gd.new_gd);
    assert_eq!(gd.bd_addr, plan.board_info);
    assert_eq!(gd.relocaddr, plan.relocaddr);
    assert_eq!(old.1.wrapping_add(gd.reloc_off()), gd.fdt_blob);
    assert_eq!(old.2.wrapping_add(gd.reloc_off()), gd.env_addr);
    assert_ne!(old.0, gd.addr());
    assert!(gd.flags().contains(GdFlags::RELOC));
}
