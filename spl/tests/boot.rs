use common::{memory::DRAM, BootDevice};
use hal::{memory::Memory, time::Timer, Error};
use sim::{
    legacy_image, sample_firmware, sample_firmware_at, CpuEvent, Firmware, SimBoard, SimBootMode,
    DRAM_SIZE,
};
use spl::{
    bootstage::BootstageId,
    initcall::InitcallError,
    reloc::Rela,
    Abort, BootFailure, Config, GdFlags, Handoff, Hang,
};
use std::panic::{self, AssertUnwindSafe};

/// Where test payloads ask to be placed.
const NEXT: usize = DRAM + 0x40_0000;

fn board_with(fw: &Firmware) -> SimBoard {
    let mut board = SimBoard::new();
    fw.install(&mut board.memory).unwrap();
    // garbage where the monitor will land
    board
        .memory
        .fill(DRAM + (6 << 20), DRAM_SIZE - (6 << 20), 0xa5)
        .unwrap();
    board
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

fn next_stage() -> Vec<u8> {
    legacy_image("next", NEXT as u32, NEXT as u32 + 0x40, &payload(0x300))
}

fn run(board: &mut SimBoard, cfg: &Config, fw: &Firmware) -> Result<Handoff, Abort> {
    board.with_platform(|p| spl::run(p, cfg, &fw.info, 0))
}

fn aborted(result: Result<Handoff, Abort>) -> Abort {
    match result {
        Ok(handoff) => panic!("booted {} unexpectedly", handoff.image.name()),
        Err(abort) => abort,
    }
}

#[test]
fn boots_legacy_image_from_the_strapped_device() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    let handoff = run(&mut board, &Config::DEFAULT, &fw).unwrap();

    let image = handoff.image;
    assert_eq!(image.device, BootDevice::Mmc(1));
    assert_eq!(image.name(), "next");
    assert_eq!(image.load_addr, NEXT);
    assert_eq!(image.entry_point, NEXT + 0x40);
    assert_eq!(image.size, 0x300);
    assert_eq!(board.memory.slice(NEXT, 0x300).unwrap(), payload(0x300));
    assert_eq!(board.load_order(), [BootDevice::Mmc(1)]);

    let gd = &handoff.gd;
    assert_eq!(gd.boot_device, Some(BootDevice::Mmc(1)));
    assert!(gd.bootstage().get(BootstageId::Handoff).is_some());
    let expected = GdFlags::RELOC
        | GdFlags::DEVINIT
        | GdFlags::HAVE_CONSOLE
        | GdFlags::DRAM_READY
        | GdFlags::FULL_MALLOC_INIT
        | GdFlags::ENV_READY
        | GdFlags::ENV_DEFAULT
        | GdFlags::SPL_INIT;
    assert_eq!(gd.flags(), expected);

    let out = board.serial.output();
    assert!(out.contains("\nU-Boot SPL "), "{out}");
    assert!(out.contains("(generic)\n"), "{out}");
    assert!(out.contains("DRAM:  8 MiB\n"), "{out}");
    assert!(
        out.contains("*** Warning - no medium found (err=-123), using default environment\n"),
        "{out}"
    );
    assert!(out.contains("Trying to boot from MMC1\n"), "{out}");
    assert_eq!(board.serial.baudrate, Some(115_200));
}

#[test]
fn early_output_is_replayed_once_the_console_is_up() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    run(&mut board, &Config::DEFAULT, &fw).unwrap();

    let out = board.serial.output();
    assert!(out.starts_with("CPU:   1008 MHz, bus 200 MHz\n\nU-Boot SPL "), "{out}");
    assert_eq!(out.matches("CPU:").count(), 1, "{out}");
    assert!(!out.contains("pre-console"), "{out}");
}

#[test]
fn silent_boot_prints_nothing() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);
    let silent = GdFlags::SILENT.bits();

    let handoff = board
        .with_platform(|p| spl::run(p, &Config::DEFAULT, &fw.info, silent))
        .unwrap();

    assert_eq!(handoff.image.device, BootDevice::Mmc(1));
    assert!(handoff.gd.flags().contains(GdFlags::SILENT | GdFlags::HAVE_CONSOLE));
    assert_eq!(handoff.gd.boot_flags, silent);
    assert_eq!(board.serial.output(), "");
    assert_eq!(board.serial.baudrate, Some(115_200));
}

#[test]
fn silent_hang_prints_nothing() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.boot_mode = SimBootMode(9);
    let cfg = Config {
        reset_on_hang: true,
        ..Config::DEFAULT
    };
    let silent = GdFlags::SILENT.bits();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: () = board.with_platform(|p| spl::spl_main(p, &cfg, &fw.info, silent));
    }));

    assert!(result.is_err());
    assert_eq!(board.serial.output(), "");
}

#[test]
fn image_linked_at_its_destination_is_not_copied() {
    // where the sample image ends up on this board
    let relocaddr = {
        let fw = sample_firmware();
        let mut board = board_with(&fw);
        let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
        board.loaders.push(mmc);
        run(&mut board, &Config::DEFAULT, &fw).unwrap().gd.relocaddr
    };
    let fw = sample_firmware_at(relocaddr);
    let mut board = SimBoard::new();
    fw.install(&mut board.memory).unwrap();
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    let handoff = run(&mut board, &Config::DEFAULT, &fw).unwrap();

    let gd = &handoff.gd;
    assert!(gd.flags().contains(GdFlags::SKIP_RELOC | GdFlags::RELOC));
    assert_eq!(gd.reloc_off(), 0);
    assert_eq!(gd.relocaddr, relocaddr);
    assert_eq!(gd.addr(), gd.new_gd);
    assert_eq!(gd.fdt_blob, fw.info.fdt.unwrap());
    assert!(!board.cpu.events.contains(&CpuEvent::InvalidateIcache));
    for &(addr, value) in &fw.pointers {
        assert_eq!(board.memory.read_u64(addr), Ok(value as u64));
    }
}

#[test]
fn relocated_image_is_patched_and_bss_cleared() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    let handoff = run(&mut board, &Config::DEFAULT, &fw).unwrap();
    let gd = &handoff.gd;
    let off = gd.reloc_off();
    let info = &fw.info;

    assert_eq!(gd.relocaddr, info.link_addr.wrapping_add(off));
    assert_eq!(gd.addr(), gd.new_gd);
    assert!(gd.relocaddr > gd.ram_base && gd.start_addr_sp <= gd.ram_top);
    for &(addr, value) in &fw.pointers {
        assert_eq!(board.memory.read_u64(addr + off), Ok((value + off) as u64));
        // the running copy is left alone
        assert_eq!(board.memory.read_u64(addr), Ok(value as u64));
    }
    let bss = board
        .memory
        .slice(info.bss_start + off, info.bss_end - info.bss_start)
        .unwrap();
    assert!(bss.iter().all(|&b| b == 0));

    let fdt = info.fdt.unwrap() + off;
    assert_eq!(handoff.arg, fdt);
    assert_eq!(gd.fdt_blob, fdt);
    assert_eq!(board.memory.slice(fdt, 4).unwrap(), [0xd0, 0x0d, 0xfe, 0xed]);

    assert_eq!(board.memory.read_u64(gd.bd_addr + 16), Ok(DRAM as u64));
    assert_eq!(board.memory.read_u64(gd.bd_addr + 24), Ok(DRAM_SIZE as u64));

    let copy = gd.relocaddr..gd.relocaddr + info.copy_len();
    assert!(board.cpu.events.contains(&CpuEvent::FlushDcache {
        start: copy.start,
        end: copy.end,
    }));
}

#[test]
fn jump_cleans_caches_before_entering() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    let handoff = run(&mut board, &Config::DEFAULT, &fw).unwrap();
    board.cpu.events.clear();
    let abort = handoff.jump(&mut board.cpu);

    assert_eq!(
        board.cpu.events,
        [
            CpuEvent::DisableInterrupts,
            CpuEvent::FlushDcache {
                start: NEXT,
                end: NEXT + 0x300,
            },
            CpuEvent::InvalidateIcache,
            CpuEvent::Jump {
                entry: NEXT + 0x40,
                arg: handoff.arg,
            },
        ]
    );
    assert_eq!(abort.reason, Hang::ImageReturned { entry: NEXT + 0x40 });
}

#[test]
fn stored_environment_selects_boot_targets() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mut blob = vec![0u8; Config::DEFAULT.env_size];
    common::env::encode([("boot_targets", "nand usb"), ("bootdelay", "0")], &mut blob).unwrap();
    board.env.blob = Some(blob);
    let mmc = board.loader("mmc").failing(BootDevice::Mmc(1), Error::NoMedium);
    let spi = board.loader("spi").image(BootDevice::Spi, next_stage());
    let nand = board.loader("nand").image(BootDevice::Nand, next_stage());
    board.loaders.extend([mmc, spi, nand]);

    let handoff = run(&mut board, &Config::DEFAULT, &fw).unwrap();

    assert_eq!(handoff.image.device, BootDevice::Nand);
    assert_eq!(board.load_order(), [BootDevice::Mmc(1), BootDevice::Nand]);
    assert!(!handoff.gd.flags().contains(GdFlags::ENV_DEFAULT));
    assert!(handoff.gd.flags().contains(GdFlags::ENV_READY));
    assert!(!board.serial.output().contains("*** Warning"));
}

#[test]
fn falls_back_in_order_until_one_boots() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mut corrupt = next_stage();
    *corrupt.last_mut().unwrap() ^= 0xff;
    let mmc = board.loader("mmc").failing(BootDevice::Mmc(1), Error::Io);
    let spi = board.loader("spi").image(BootDevice::Spi, corrupt);
    let nand = board.loader("nand").image(BootDevice::Nand, next_stage());
    board.loaders.extend([mmc, spi, nand]);
    let cfg = Config {
        boot_fallback: &[BootDevice::Spi, BootDevice::Nand, BootDevice::Usb],
        ..Config::DEFAULT
    };

    let handoff = run(&mut board, &cfg, &fw).unwrap();

    assert_eq!(handoff.image.device, BootDevice::Nand);
    assert_eq!(
        board.load_order(),
        [BootDevice::Mmc(1), BootDevice::Spi, BootDevice::Nand]
    );
    let out = board.serial.output();
    assert!(out.contains("Load from MMC1 failed: I/O error (err=-5)\n"), "{out}");
    assert!(out.contains("Load from SPI failed: bad checksum (err=-84)\n"), "{out}");
    assert!(!out.contains("Trying to boot from USB"), "{out}");
}

#[test]
fn every_candidate_is_tried_once_before_giving_up() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").failing(BootDevice::Mmc(1), Error::Io);
    let spi = board.loader("spi").failing(BootDevice::Spi, Error::Timeout);
    let nand = board.loader("nand").failing(BootDevice::Nand, Error::NoMedium);
    board.loaders.extend([mmc, spi, nand]);
    let cfg = Config {
        boot_fallback: &[BootDevice::Spi, BootDevice::Nand],
        ..Config::DEFAULT
    };

    let abort = aborted(run(&mut board, &cfg, &fw));

    assert_eq!(
        abort.reason,
        Hang::Boot(BootFailure::Exhausted {
            tried: 3,
            last: Some((BootDevice::Nand, Error::NoMedium)),
        })
    );
    assert_eq!(
        board.load_order(),
        [BootDevice::Mmc(1), BootDevice::Spi, BootDevice::Nand]
    );
    assert!(abort.console_ready());
}

#[test]
fn unknown_boot_mode_loads_nothing() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.boot_mode = SimBootMode(9);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    let abort = aborted(run(&mut board, &Config::DEFAULT, &fw));

    assert_eq!(abort.reason, Hang::Boot(BootFailure::UnknownBootMode(9)));
    assert!(board.load_order().is_empty());
}

#[test]
fn raw_image_is_entered_at_the_load_address() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.boot_mode = SimBootMode(4);
    let ram = board.loader("ram").image(BootDevice::Ram, payload(0x120));
    board.loaders.push(ram);
    let cfg = Config::DEFAULT;

    let handoff = run(&mut board, &cfg, &fw).unwrap();

    assert_eq!(handoff.image.device, BootDevice::Ram);
    assert_eq!(handoff.image.header, None);
    assert_eq!(handoff.image.name(), "raw image");
    assert_eq!(handoff.image.entry_point, cfg.load_addr);
    assert_eq!(handoff.image.size, 0x120);
}

#[test]
fn raw_image_is_refused_when_unsupported() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.boot_mode = SimBootMode(4);
    let ram = board.loader("ram").image(BootDevice::Ram, payload(0x120));
    board.loaders.push(ram);
    let cfg = Config {
        raw_image_support: false,
        boot_fallback: &[],
        ..Config::DEFAULT
    };

    let abort = aborted(run(&mut board, &cfg, &fw));

    assert_eq!(
        abort.reason,
        Hang::Boot(BootFailure::Exhausted {
            tried: 1,
            last: Some((BootDevice::Ram, Error::BadMagic)),
        })
    );
}

#[test]
fn image_may_not_land_on_the_monitor() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let top = (DRAM + DRAM_SIZE - 0x1000) as u32;
    let mmc = board
        .loader("mmc")
        .image(BootDevice::Mmc(1), legacy_image("evil", top, top, &payload(0x100)));
    board.loaders.push(mmc);
    let cfg = Config {
        boot_fallback: &[],
        ..Config::DEFAULT
    };

    let abort = aborted(run(&mut board, &cfg, &fw));

    assert_eq!(
        abort.reason,
        Hang::Boot(BootFailure::Exhausted {
            tried: 1,
            last: Some((BootDevice::Mmc(1), Error::Overlap)),
        })
    );
}

#[test]
fn dram_that_never_trains_times_out() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.dram.training_polls = u32::MAX;

    let abort = aborted(run(&mut board, &Config::DEFAULT, &fw));

    assert_eq!(
        abort.reason,
        Hang::Initcall(InitcallError {
            name: "dram_init",
            error: Error::Timeout,
        })
    );
    assert!(!abort.flags.contains(GdFlags::DRAM_READY));
    assert!(abort.console_ready());
    assert!(board.timer.micros() >= Config::DEFAULT.dram_timeout_us);
}

#[test]
fn required_device_failure_is_fatal() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board
        .devices
        .bind("usb@4101000", false, Err(Error::NoDevice))
        .bind("mmc@4020000", true, Err(Error::Io))
        .bind("spi@4025000", true, Ok(()));

    let abort = aborted(run(&mut board, &Config::DEFAULT, &fw));

    assert_eq!(
        abort.reason,
        Hang::Initcall(InitcallError {
            name: "initr_dm",
            error: Error::Io,
        })
    );
    assert!(abort.flags.contains(GdFlags::RELOC));
    assert_eq!(
        board.devices.probed,
        ["usb@4101000", "mmc@4020000", "spi@4025000"]
    );
}

#[test]
fn optional_device_failure_is_tolerated() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.devices.bind("usb@4101000", false, Err(Error::NoDevice));
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);

    assert!(run(&mut board, &Config::DEFAULT, &fw).is_ok());
}

#[test]
fn foreign_relocation_stops_before_copying() {
    let mut fw = sample_firmware();
    fw.push_rela(Rela {
        offset: fw.info.link_addr as u64 + 0x10,
        info: 2,
        addend: 0,
    });
    let mut board = board_with(&fw);

    let abort = aborted(run(&mut board, &Config::DEFAULT, &fw));

    assert_eq!(
        abort.reason,
        Hang::Initcall(InitcallError {
            name: "validate_relocs",
            error: Error::NotSupported,
        })
    );
    assert!(!board.cpu.events.contains(&CpuEvent::InvalidateIcache));
}

#[test]
fn hang_reports_then_resets() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    board.boot_mode = SimBootMode(9);
    let cfg = Config {
        reset_on_hang: true,
        ..Config::DEFAULT
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: () = board.with_platform(|p| spl::spl_main(p, &cfg, &fw.info, 0));
    }));

    assert!(result.is_err());
    let out = board.serial.output();
    assert!(
        out.ends_with("unsupported boot mode 0x9\n### ERROR ### Please RESET the board ###\n"),
        "{out}"
    );
}

#[test]
#[should_panic(expected = "reset")]
fn returning_image_ends_in_reset() {
    let fw = sample_firmware();
    let mut board = board_with(&fw);
    let mmc = board.loader("mmc").image(BootDevice::Mmc(1), next_stage());
    board.loaders.push(mmc);
    let cfg = Config {
        reset_on_hang: true,
        ..Config::DEFAULT
    };

    let _: () = board.with_platform(|p| spl::spl_main(p, &cfg, &fw.info, 0));
}
