//! Synchronous serial interface.
//!
//! [`Spi`] is configured while `Disabled` and moves words only once `Enabled`.

use core::marker::PhantomData;

use bitflags::bitflags;

use crate::interrupt::{Handler, InterruptController, Vector};
use crate::memory_map::{SSI0_BASE, SSI1_BASE};
use crate::mmio::Mmio;
use crate::sys_ctrl::Peripheral;

pub use crate::serial::ClockSource;

const CR0: u32 = 0x000;
const CR1: u32 = 0x004;
const DR: u32 = 0x008;
const SR: u32 = 0x00C;
const CPSR: u32 = 0x010;
const IM: u32 = 0x014;
const RIS: u32 = 0x018;
const MIS: u32 = 0x01C;
const ICR: u32 = 0x020;
const DMACTL: u32 = 0x024;
const CC: u32 = 0xFC8;

const CR1_SOD: u32 = 0x8;
const CR1_MS: u32 = 0x4;
const CR1_SSE: u32 = 0x2;

const SR_BSY: u32 = 0x10;
const SR_RFF: u32 = 0x08;
const SR_RNE: u32 = 0x04;
const SR_TNF: u32 = 0x02;
const SR_TFE: u32 = 0x01;

const CR0_FRF: u32 = 0x30;

const MAX_PRESCALER: u32 = 254;
const MAX_SCR: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The bit rate is zero, too fast for the clock and role, or too slow to divide down to.
    InvalidBitRate,
    /// Frames are 4 to 16 bits wide.
    InvalidDataWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SsiPort {
    Ssi0,
    Ssi1,
}

impl SsiPort {
    pub const fn base(self) -> u32 {
        match self {
            SsiPort::Ssi0 => SSI0_BASE,
            SsiPort::Ssi1 => SSI1_BASE,
        }
    }

    pub const fn vector(self) -> Vector {
        match self {
            SsiPort::Ssi0 => Vector::Ssi0,
            SsiPort::Ssi1 => Vector::Ssi1,
        }
    }

    pub const fn peripheral(self) -> Peripheral {
        match self {
            SsiPort::Ssi0 => Peripheral::Ssi0,
            SsiPort::Ssi1 => Peripheral::Ssi1,
        }
    }
}

/// Frame format. The Motorola modes encode clock polarity and phase in their low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFormat {
    /// Polarity 0, phase 0.
    MotorolaMode0 = 0x00,
    /// Polarity 0, phase 1.
    MotorolaMode1 = 0x02,
    /// Polarity 1, phase 0.
    MotorolaMode2 = 0x01,
    /// Polarity 1, phase 1.
    MotorolaMode3 = 0x03,
    /// TI synchronous serial.
    Ti = 0x10,
    /// National Microwire.
    Microwire = 0x20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Master,
    Slave,
    /// Slave that never drives its output line.
    SlaveOutputDisabled,
}

/// Prescaler and serial clock rate that divide the SSI clock down to the bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockDivider {
    /// Even, 2 to 254.
    pub prescaler: u32,
    pub scr: u32,
}

impl ClockDivider {
    /// The smallest prescaler, and its serial clock rate, that reaches `bit_rate` from
    /// `clock`.
    pub fn search(clock: u32, bit_rate: u32) -> Result<Self, Error> {
        if bit_rate == 0 {
            return Err(Error::InvalidBitRate);
        }
        let max_div = clock / bit_rate;
        if max_div < 2 {
            return Err(Error::InvalidBitRate);
        }

        let mut prescaler = 2;
        loop {
            let scr = max_div / prescaler - 1;
            if scr <= MAX_SCR {
                return Ok(Self { prescaler, scr });
            }
            prescaler += 2;
            if prescaler > MAX_PRESCALER {
                return Err(Error::InvalidBitRate);
            }
        }
    }

    /// The bit rate this divider produces from `clock`.
    pub const fn effective_rate(&self, clock: u32) -> u32 {
        clock / (self.prescaler * (1 + self.scr))
    }
}

bitflags! {
    pub struct Interrupts: u32 {
        /// Transmit FIFO half empty or less.
        const TXFF = 0x8;
        /// Receive FIFO half full or more.
        const RXFF = 0x4;
        const RXTO = 0x2;
        const RXOR = 0x1;
    }
}

bitflags! {
    pub struct DmaFlags: u32 {
        const TX = 0x2;
        const RX = 0x1;
    }
}

pub struct Disabled;
pub struct Enabled;

pub struct Spi<M, STATE> {
    mmio: M,
    port: SsiPort,
    _state: PhantomData<STATE>,
}

impl<M: Mmio> Spi<M, Disabled> {
    /// Take control of an SSI port. No register is touched until [`Spi::configure`], which
    /// also clears a stale enable bit.
    pub fn new(mmio: M, port: SsiPort) -> Self {
        Spi {
            mmio,
            port,
            _state: PhantomData,
        }
    }

    /// Set role, frame format, bit rate and frame width.
    ///
    /// A master runs at up to half of `clock`, a slave at up to a twelfth.
    pub fn configure(
        &mut self,
        clock: u32,
        format: FrameFormat,
        mode: Mode,
        bit_rate: u32,
        data_width: u8,
    ) -> Result<ClockDivider, Error> {
        if !(4..=16).contains(&data_width) {
            return Err(Error::InvalidDataWidth);
        }
        let max_rate = match mode {
            Mode::Master => clock / 2,
            Mode::Slave | Mode::SlaveOutputDisabled => clock / 12,
        };
        if bit_rate > max_rate {
            return Err(Error::InvalidBitRate);
        }
        let divider = ClockDivider::search(clock, bit_rate)?;

        let cr1 = match mode {
            Mode::Master => 0,
            Mode::Slave => CR1_MS,
            Mode::SlaveOutputDisabled => CR1_MS | CR1_SOD,
        };
        self.mmio.write(self.reg(CR1), cr1);
        self.mmio.write(self.reg(CPSR), divider.prescaler);

        let format = format as u32;
        let cr0 = (divider.scr << 8)
            | ((format & 0x3) << 6)
            | (format & CR0_FRF)
            | (data_width as u32 - 1);
        self.mmio.write(self.reg(CR0), cr0);

        debug!(
            "ssi{}: cpsr {} scr {}",
            self.port as u8,
            divider.prescaler,
            divider.scr
        );
        Ok(divider)
    }

    pub fn enable(self) -> Spi<M, Enabled> {
        self.mmio.set_bits(self.reg(CR1), CR1_SSE);
        Spi {
            mmio: self.mmio,
            port: self.port,
            _state: PhantomData,
        }
    }
}

impl<M: Mmio> Spi<M, Enabled> {
    pub fn disable(self) -> Spi<M, Disabled> {
        self.mmio.clear_bits(self.reg(CR1), CR1_SSE);
        Spi {
            mmio: self.mmio,
            port: self.port,
            _state: PhantomData,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.mmio.read(self.reg(SR)) & SR_BSY != 0
    }

    pub fn is_receive_fifo_full(&self) -> bool {
        self.mmio.read(self.reg(SR)) & SR_RFF != 0
    }

    pub fn is_send_fifo_empty(&self) -> bool {
        self.mmio.read(self.reg(SR)) & SR_TFE != 0
    }

    /// Wait for room in the transmit FIFO and queue `word`.
    pub fn write_word(&mut self, word: u32) {
        while self.mmio.read(self.reg(SR)) & SR_TNF == 0 {}
        self.mmio.write(self.reg(DR), word);
    }

    /// Queue `word` if the transmit FIFO has room.
    pub fn try_write_word(&mut self, word: u32) -> bool {
        if self.mmio.read(self.reg(SR)) & SR_TNF != 0 {
            self.mmio.write(self.reg(DR), word);
            true
        } else {
            false
        }
    }

    /// Wait for a received word and return it.
    pub fn read_word(&mut self) -> u32 {
        while self.mmio.read(self.reg(SR)) & SR_RNE == 0 {}
        self.mmio.read(self.reg(DR))
    }

    pub fn try_read_word(&mut self) -> Option<u32> {
        if self.mmio.read(self.reg(SR)) & SR_RNE != 0 {
            Some(self.mmio.read(self.reg(DR)))
        } else {
            None
        }
    }

    /// Queue every byte of `data`, one frame each.
    pub fn write(&mut self, data: &[u8]) {
        for b in data.iter() {
            self.write_word(*b as u32);
        }
    }
}

impl<M: Mmio, STATE> Spi<M, STATE> {
    pub fn port(&self) -> SsiPort {
        self.port
    }

    pub fn free(self) -> M {
        self.mmio
    }

    fn reg(&self, offset: u32) -> u32 {
        self.port.base() + offset
    }

    /// Install `handler` for this port and enable its vector.
    pub fn int_register<C>(&mut self, ctl: &mut C, handler: Handler)
    where
        C: InterruptController + ?Sized,
    {
        ctl.register(self.port.vector(), handler);
        ctl.enable(self.port.vector());
    }

    pub fn int_unregister<C>(&mut self, ctl: &mut C)
    where
        C: InterruptController + ?Sized,
    {
        ctl.disable(self.port.vector());
        ctl.unregister(self.port.vector());
    }

    pub fn int_enable(&mut self, interrupts: Interrupts) {
        self.mmio.set_bits(self.reg(IM), interrupts.bits());
    }

    pub fn int_disable(&mut self, interrupts: Interrupts) {
        self.mmio.clear_bits(self.reg(IM), interrupts.bits());
    }

    pub fn int_status(&self, masked: bool) -> Interrupts {
        let reg = if masked { MIS } else { RIS };
        Interrupts::from_bits_truncate(self.mmio.read(self.reg(reg)))
    }

    pub fn int_clear(&mut self, interrupts: Interrupts) {
        self.mmio.write(self.reg(ICR), interrupts.bits());
    }

    pub fn dma_enable(&mut self, flags: DmaFlags) {
        self.mmio.set_bits(self.reg(DMACTL), flags.bits());
    }

    pub fn dma_disable(&mut self, flags: DmaFlags) {
        self.mmio.clear_bits(self.reg(DMACTL), flags.bits());
    }

    pub fn set_clock_source(&mut self, source: ClockSource) {
        self.mmio.write(self.reg(CC), source as u32);
    }

    pub fn clock_source(&self) -> ClockSource {
        if self.mmio.read(self.reg(CC)) & 0x1 != 0 {
            ClockSource::Piosc
        } else {
            ClockSource::System
        }
    }
}
