//! Contracts the staged-boot core consumes from board code.
//!
//! Every trait here is object safe; the core holds the board's drivers as
//! `&mut dyn` references and never names a concrete SoC.

#![cfg_attr(not(test), no_std)]

pub mod boot_mode;
pub mod ccu;
pub mod cpu;
pub mod dm;
pub mod dram;
pub mod memory;
pub mod serial;
pub mod storage;
pub mod time;

mod error;

pub use error::Error;
