//! Board support for the CC2538.
//!
//! Drivers for the system controller, the UARTs, the SSI ports and the AES engine. All of
//! them reach their registers through [`mmio::Mmio`], so they can be exercised against a
//! modelled register file on the host.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub use cc2538_pac as pac;
use embedded_hal as hal;

pub mod crypto;
pub mod interrupt;
pub mod memory_map;
pub mod mmio;
pub mod serial;
pub mod spi;
pub mod sys_ctrl;

#[cfg(test)]
mod testing;

use crate::crypto::AesEngine;
use crate::interrupt::Nvic;
use crate::mmio::RealMmio;
use crate::serial::{Serial, UartPort};
use crate::spi::{Disabled, Spi, SsiPort};
use crate::sys_ctrl::{SysCtrl, Unconfigured};

/// Every driver of this crate, bound to the real registers.
///
/// None of the drivers touches its peripheral on construction. Clocks have to be gated on
/// through `sys_ctrl` before a driver is used.
pub struct Board {
    pub sys_ctrl: SysCtrl<RealMmio, Unconfigured>,
    pub uart0: Serial<RealMmio>,
    pub uart1: Serial<RealMmio>,
    pub ssi0: Spi<RealMmio, Disabled>,
    pub ssi1: Spi<RealMmio, Disabled>,
    pub aes: AesEngine<RealMmio>,
    pub nvic: Nvic,
}

impl Board {
    /// Consuming the PAC singleton is what makes the register handles exclusive.
    pub fn new(_peripherals: pac::Peripherals, nvic: cortex_m::peripheral::NVIC) -> Self {
        let mmio = unsafe { RealMmio::new() };
        Self {
            sys_ctrl: SysCtrl::new(mmio),
            uart0: Serial::new(mmio, UartPort::Uart0),
            uart1: Serial::new(mmio, UartPort::Uart1),
            ssi0: Spi::new(mmio, SsiPort::Ssi0),
            ssi1: Spi::new(mmio, SsiPort::Ssi1),
            aes: AesEngine::new(mmio),
            nvic: Nvic::new(nvic),
        }
    }

    /// Take the board once. Returns `None` if the peripherals were already taken.
    pub fn take() -> Option<Self> {
        // Core peripherals first, so a failure here doesn't strand the PAC singleton.
        let core = cortex_m::Peripherals::take()?;
        let peripherals = pac::Peripherals::take()?;
        Some(Self::new(peripherals, core.NVIC))
    }
}

/// Customer configuration area in the last flash page, read by the boot ROM.
#[cfg(feature = "rt")]
#[repr(C)]
struct FlashCca {
    bootloader_backdoor: u32,
    image_valid: u32,
    app_entry: u32,
    lock_bits: [u8; 32],
}

#[cfg(feature = "rt")]
#[link_section = ".flash_cca"]
#[used]
static FLASH_CCA: FlashCca = FlashCca {
    // Backdoor disabled.
    bootloader_backdoor: 0xF3FF_FFFF,
    image_valid: 0,
    app_entry: memory_map::FLASH_BASE,
    lock_bits: [0xFF; 32],
};
