//! Data shared by the boot stages and by the host-side tools.

#![cfg_attr(not(test), no_std)]

mod arrow;

pub mod bd;
pub mod boot_device;
pub mod env;
pub mod image;
pub mod memory;

pub use arrow::Arrow;
pub use bd::{BoardInfo, DramBank, NR_DRAM_BANKS};
pub use boot_device::BootDevice;
