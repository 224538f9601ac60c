//! System control: clock sources, dividers, peripheral gating and power modes.

use core::convert::TryFrom;
use core::marker::PhantomData;

use crate::memory_map::SYS_CTRL_BASE;
use crate::mmio::Mmio;

const CLOCK_CTRL: u32 = 0x000;
const CLOCK_STA: u32 = 0x004;
const PMCTL: u32 = 0x058;
const CLD: u32 = 0x080;

const OSC32K: u32 = 1 << 24;
const AMP_DET: u32 = 1 << 21;
const OSC: u32 = 1 << 16;
const IO_DIV_SHIFT: u32 = 8;
const IO_DIV_MASK: u32 = 0x7 << IO_DIV_SHIFT;
const SYS_DIV_MASK: u32 = 0x7;

const PMCTL_MASK: u32 = 0x3;
const CLD_EN: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The id does not name a peripheral known to the system controller.
    UnknownPeripheral(u16),
    /// The peripheral has no software reset bit.
    NoResetControl,
    /// The RC oscillator cannot run the system clock at 32 MHz.
    InvalidClockConfig,
    UnknownPowerMode(u32),
}

/// Source of the 32 MHz clock tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Osc {
    /// 32 MHz crystal.
    Osc32Mhz,
    /// 16 MHz RC oscillator.
    Osc16Mhz,
}

/// Source of the 32 kHz clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Osc32k {
    Crystal,
    Rc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ClockDiv {
    Clock32Mhz = 0b000,
    Clock16Mhz = 0b001,
    Clock8Mhz = 0b010,
    Clock4Mhz = 0b011,
    Clock2Mhz = 0b100,
    Clock1Mhz = 0b101,
    Clock05Mhz = 0b110,
    Clock025Mhz = 0b111,
}

impl ClockDiv {
    pub const fn as_freq(&self) -> u32 {
        match self {
            ClockDiv::Clock32Mhz => 32_000_000,
            ClockDiv::Clock16Mhz => 16_000_000,
            ClockDiv::Clock8Mhz => 8_000_000,
            ClockDiv::Clock4Mhz => 4_000_000,
            ClockDiv::Clock2Mhz => 2_000_000,
            ClockDiv::Clock1Mhz => 1_000_000,
            ClockDiv::Clock05Mhz => 500_000,
            ClockDiv::Clock025Mhz => 250_000,
        }
    }

    /// The divider for a 3-bit register field. Higher bits are ignored.
    pub const fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => ClockDiv::Clock32Mhz,
            1 => ClockDiv::Clock16Mhz,
            2 => ClockDiv::Clock8Mhz,
            3 => ClockDiv::Clock4Mhz,
            4 => ClockDiv::Clock2Mhz,
            5 => ClockDiv::Clock1Mhz,
            6 => ClockDiv::Clock05Mhz,
            _ => ClockDiv::Clock025Mhz,
        }
    }

    const fn bits(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum PowerMode {
    /// Deep sleep enters no power mode, only the core sleeps.
    NoAction = 0,
    Pm1 = 1,
    Pm2 = 2,
    Pm3 = 3,
}

impl TryFrom<u32> for PowerMode {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PowerMode::NoAction),
            1 => Ok(PowerMode::Pm1),
            2 => Ok(PowerMode::Pm2),
            3 => Ok(PowerMode::Pm3),
            other => Err(Error::UnknownPowerMode(other)),
        }
    }
}

/// A peripheral gated by the system controller.
///
/// The id encodes the peripheral class in the high byte and the instance within the class in
/// the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Peripheral {
    Gpt0 = 0x0000,
    Gpt1 = 0x0001,
    Gpt2 = 0x0002,
    Gpt3 = 0x0003,
    Ssi0 = 0x0100,
    Ssi1 = 0x0101,
    Uart0 = 0x0200,
    Uart1 = 0x0201,
    I2c = 0x0300,
    Pka = 0x0400,
    Aes = 0x0401,
    Rfc = 0x0500,
}

impl Peripheral {
    pub const fn id(self) -> u16 {
        self as u16
    }

    pub const fn class(self) -> u8 {
        (self.id() >> 8) as u8
    }

    pub const fn instance(self) -> u8 {
        self.id() as u8
    }

    fn bank(self) -> Bank {
        match self.class() {
            0 => Bank::with_reset(0x008),
            1 => Bank::with_reset(0x018),
            2 => Bank::with_reset(0x028),
            3 => Bank::with_reset(0x038),
            4 => Bank::with_reset(0x048),
            _ => Bank {
                run: 0x0A8,
                sleep: 0x0AC,
                deep_sleep: 0x0B0,
                reset: None,
            },
        }
    }

    fn mask(self) -> u32 {
        1 << self.instance()
    }
}

impl TryFrom<u16> for Peripheral {
    type Error = Error;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Ok(match id {
            0x0000 => Peripheral::Gpt0,
            0x0001 => Peripheral::Gpt1,
            0x0002 => Peripheral::Gpt2,
            0x0003 => Peripheral::Gpt3,
            0x0100 => Peripheral::Ssi0,
            0x0101 => Peripheral::Ssi1,
            0x0200 => Peripheral::Uart0,
            0x0201 => Peripheral::Uart1,
            0x0300 => Peripheral::I2c,
            0x0400 => Peripheral::Pka,
            0x0401 => Peripheral::Aes,
            0x0500 => Peripheral::Rfc,
            other => return Err(Error::UnknownPeripheral(other)),
        })
    }
}

/// Clock gating registers of one peripheral class.
struct Bank {
    run: u32,
    sleep: u32,
    deep_sleep: u32,
    reset: Option<u32>,
}

impl Bank {
    const fn with_reset(run: u32) -> Self {
        Self {
            run,
            sleep: run + 0x4,
            deep_sleep: run + 0x8,
            reset: Some(run + 0xC),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    pub osc32k: Osc32k,
    pub osc: Osc,
    pub io_div: ClockDiv,
    pub sys_div: ClockDiv,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            osc32k: Osc32k::Rc,
            osc: Osc::Osc16Mhz,
            io_div: ClockDiv::Clock16Mhz,
            sys_div: ClockDiv::Clock16Mhz,
        }
    }
}

impl ClockConfig {
    pub const fn sys_freq(&self) -> u32 {
        self.sys_div.as_freq()
    }

    pub const fn io_freq(&self) -> u32 {
        self.io_div.as_freq()
    }
}

pub struct Unconfigured;
pub struct Frozen;

pub struct SysCtrl<M, STATE> {
    mmio: M,
    config: ClockConfig,
    _state: PhantomData<STATE>,
}

impl<M: Mmio> SysCtrl<M, Unconfigured> {
    pub fn new(mmio: M) -> Self {
        Self {
            mmio,
            config: Default::default(),
            _state: PhantomData,
        }
    }

    pub fn use_crystal_osc32k(&mut self) {
        self.config.osc32k = Osc32k::Crystal;
    }

    pub fn disable_crystal_osc32k(&mut self) {
        self.config.osc32k = Osc32k::Rc;
    }

    pub fn set_osc(&mut self, osc: Osc) {
        self.config.osc = osc;
    }

    pub fn set_io_div(&mut self, div: ClockDiv) {
        self.config.io_div = div;
    }

    pub fn set_sys_div(&mut self, div: ClockDiv) {
        self.config.sys_div = div;
    }

    /// Switch the clock tree to the configured sources and dividers.
    ///
    /// Blocks until the oscillator switch is acknowledged. The I/O divider is never left
    /// faster than the system clock, so the frozen config may report a slower I/O clock than
    /// was asked for.
    pub fn freeze(mut self) -> Result<SysCtrl<M, Frozen>, Error> {
        self.clock_set(self.config.osc32k, self.config.osc, self.config.sys_div)?;
        self.io_clock_set(self.config.io_div);

        let ctrl = self.mmio.read(SYS_CTRL_BASE + CLOCK_CTRL);
        self.config.io_div = ClockDiv::from_bits(ctrl >> IO_DIV_SHIFT);

        Ok(SysCtrl {
            mmio: self.mmio,
            config: self.config,
            _state: PhantomData,
        })
    }
}

impl<M: Mmio> SysCtrl<M, Frozen> {
    pub const fn config(&self) -> ClockConfig {
        self.config
    }
}

impl<M: Mmio, STATE> SysCtrl<M, STATE> {
    pub fn free(self) -> M {
        self.mmio
    }

    /// Select the clock sources and the system clock divider.
    pub fn clock_set(&mut self, osc32k: Osc32k, osc: Osc, sys_div: ClockDiv) -> Result<(), Error> {
        if osc == Osc::Osc16Mhz && sys_div == ClockDiv::Clock32Mhz {
            error!("32 MHz system clock requested from the RC oscillator");
            return Err(Error::InvalidClockConfig);
        }

        let mut ctrl = self.mmio.read(SYS_CTRL_BASE + CLOCK_CTRL) & !(OSC32K | OSC | AMP_DET);
        if osc32k == Osc32k::Rc {
            ctrl |= OSC32K;
        }
        match osc {
            Osc::Osc16Mhz => ctrl |= OSC,
            Osc::Osc32Mhz => ctrl |= AMP_DET,
        }
        self.mmio.write(SYS_CTRL_BASE + CLOCK_CTRL, ctrl);

        // Wait for the oscillator switch.
        while (self.mmio.read(SYS_CTRL_BASE + CLOCK_STA) ^ ctrl) & OSC != 0 {}

        let sys = sys_div.bits();
        self.mmio.modify(SYS_CTRL_BASE + CLOCK_CTRL, |v| {
            let io = ((v & IO_DIV_MASK) >> IO_DIV_SHIFT).max(sys);
            (v & !(SYS_DIV_MASK | IO_DIV_MASK)) | sys | (io << IO_DIV_SHIFT)
        });

        debug!("system clock {} Hz", sys_div.as_freq());
        Ok(())
    }

    /// The system clock frequency currently in effect.
    pub fn clock_get(&self) -> u32 {
        let sta = self.mmio.read(SYS_CTRL_BASE + CLOCK_STA);
        let freq = ClockDiv::from_bits(sta).as_freq();
        if sta & OSC != 0 {
            freq.min(16_000_000)
        } else {
            freq
        }
    }

    /// Set the I/O clock divider, never faster than the system clock.
    pub fn io_clock_set(&mut self, div: ClockDiv) {
        self.mmio.modify(SYS_CTRL_BASE + CLOCK_CTRL, |v| {
            let io = div.bits().max(v & SYS_DIV_MASK);
            (v & !IO_DIV_MASK) | (io << IO_DIV_SHIFT)
        });
    }

    pub fn io_clock_get(&self) -> u32 {
        let sta = self.mmio.read(SYS_CTRL_BASE + CLOCK_STA);
        let freq = ClockDiv::from_bits(sta >> IO_DIV_SHIFT).as_freq();
        if sta & OSC != 0 {
            freq.min(16_000_000)
        } else {
            freq
        }
    }

    /// Busy-wait for `count` iterations of three cycles each.
    pub fn delay(&self, count: u32) {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::delay(count.saturating_mul(3));

        #[cfg(not(target_arch = "arm"))]
        for _ in 0..count {
            core::hint::spin_loop();
        }
    }

    /// Clock the peripheral in run mode.
    pub fn peripheral_enable(&mut self, peripheral: Peripheral) {
        self.mmio
            .set_bits(SYS_CTRL_BASE + peripheral.bank().run, peripheral.mask());
    }

    pub fn peripheral_disable(&mut self, peripheral: Peripheral) {
        self.mmio
            .clear_bits(SYS_CTRL_BASE + peripheral.bank().run, peripheral.mask());
    }

    /// Keep the peripheral clocked in sleep mode.
    pub fn peripheral_sleep_enable(&mut self, peripheral: Peripheral) {
        self.mmio
            .set_bits(SYS_CTRL_BASE + peripheral.bank().sleep, peripheral.mask());
    }

    pub fn peripheral_sleep_disable(&mut self, peripheral: Peripheral) {
        self.mmio
            .clear_bits(SYS_CTRL_BASE + peripheral.bank().sleep, peripheral.mask());
    }

    /// Keep the peripheral clocked in deep sleep mode.
    pub fn peripheral_deep_sleep_enable(&mut self, peripheral: Peripheral) {
        self.mmio
            .set_bits(SYS_CTRL_BASE + peripheral.bank().deep_sleep, peripheral.mask());
    }

    pub fn peripheral_deep_sleep_disable(&mut self, peripheral: Peripheral) {
        self.mmio
            .clear_bits(SYS_CTRL_BASE + peripheral.bank().deep_sleep, peripheral.mask());
    }

    /// Pulse the software reset of the peripheral.
    pub fn peripheral_reset(&mut self, peripheral: Peripheral) -> Result<(), Error> {
        let reg = peripheral.bank().reset.ok_or(Error::NoResetControl)?;
        self.mmio.set_bits(SYS_CTRL_BASE + reg, peripheral.mask());
        self.mmio.clear_bits(SYS_CTRL_BASE + reg, peripheral.mask());
        trace!("reset peripheral {:x}", peripheral.id());
        Ok(())
    }

    /// Every peripheral that can be named is present on the CC2538.
    pub fn peripheral_present(&self, _peripheral: Peripheral) -> bool {
        true
    }

    /// Select the power mode entered on deep sleep.
    pub fn power_mode_set(&mut self, mode: PowerMode) {
        self.mmio.write(SYS_CTRL_BASE + PMCTL, mode as u32);
    }

    pub fn power_mode_get(&self) -> PowerMode {
        match self.mmio.read(SYS_CTRL_BASE + PMCTL) & PMCTL_MASK {
            0 => PowerMode::NoAction,
            1 => PowerMode::Pm1,
            2 => PowerMode::Pm2,
            _ => PowerMode::Pm3,
        }
    }

    pub fn clock_loss_detect_enable(&mut self) {
        self.mmio.set_bits(SYS_CTRL_BASE + CLD, CLD_EN);
    }

    /// Put the core to sleep until the next interrupt.
    pub fn sleep(&mut self) {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();

        #[cfg(not(target_arch = "arm"))]
        unimplemented!();
    }

    /// Enter deep sleep, and the power mode selected with [`SysCtrl::power_mode_set`].
    pub fn deep_sleep(&mut self) {
        #[cfg(target_arch = "arm")]
        unsafe {
            const SLEEPDEEP: u32 = 1 << 2;
            let scb = &*cortex_m::peripheral::SCB::PTR;
            scb.scr.modify(|v| v | SLEEPDEEP);
            cortex_m::asm::wfi();
            scb.scr.modify(|v| v & !SLEEPDEEP);
        }

        #[cfg(not(target_arch = "arm"))]
        unimplemented!();
    }

    /// Reset the whole system.
    pub fn reset(&mut self) -> ! {
        #[cfg(target_arch = "arm")]
        cortex_m::peripheral::SCB::sys_reset();

        #[cfg(not(target_arch = "arm"))]
        unimplemented!();
    }
}
