//! UART driver.
//!
//! The two UARTs share one register layout and differ only in base address and interrupt
//! vector, so a single [`Serial`] drives either of them depending on its [`UartPort`].

use core::fmt::Write;

use bitflags::bitflags;

use crate::hal::serial;
use crate::interrupt::{Handler, InterruptController, Vector};
use crate::memory_map::{UART0_BASE, UART1_BASE};
use crate::mmio::Mmio;
use crate::sys_ctrl::{ClockConfig, Peripheral};

const DR: u32 = 0x000;
const RSR_ECR: u32 = 0x004;
const FR: u32 = 0x018;
const IBRD: u32 = 0x024;
const FBRD: u32 = 0x028;
const LCRH: u32 = 0x02C;
const CTL: u32 = 0x030;
const IFLS: u32 = 0x034;
const IM: u32 = 0x038;
const RIS: u32 = 0x03C;
const MIS: u32 = 0x040;
const ICR: u32 = 0x044;
const DMACTL: u32 = 0x048;
const NINEBITADDR: u32 = 0x0A4;
const NINEBITAMASK: u32 = 0x0A8;
const CC: u32 = 0xFC8;

const FR_TXFE: u32 = 0x80;
const FR_TXFF: u32 = 0x20;
const FR_RXFE: u32 = 0x10;
const FR_BUSY: u32 = 0x08;

const CTL_RXE: u32 = 0x200;
const CTL_TXE: u32 = 0x100;
const CTL_HSE: u32 = 0x20;
const CTL_EOT: u32 = 0x10;
const CTL_SIRLP: u32 = 0x04;
const CTL_SIREN: u32 = 0x02;
const CTL_UARTEN: u32 = 0x01;

const LCRH_SPS: u32 = 0x80;
const LCRH_WLEN: u32 = 0x60;
const LCRH_FEN: u32 = 0x10;
const LCRH_STP2: u32 = 0x08;
const LCRH_EPS: u32 = 0x04;
const LCRH_PEN: u32 = 0x02;
const LCRH_BRK: u32 = 0x01;
const LCRH_PARITY: u32 = LCRH_SPS | LCRH_EPS | LCRH_PEN;

const IFLS_TX: u32 = 0x07;
const IFLS_RX: u32 = 0x38;

const NINEBITADDR_EN: u32 = 0x8000;

// Receive status that the data register reports next to each character.
const DR_FE: u32 = 0x100;
const DR_PE: u32 = 0x200;
const DR_BE: u32 = 0x400;
const DR_OE: u32 = 0x800;

/// Receive error carried by a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Framing,
    Parity,
    Break,
    Overrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartPort {
    Uart0,
    Uart1,
}

impl UartPort {
    pub const fn base(self) -> u32 {
        match self {
            UartPort::Uart0 => UART0_BASE,
            UartPort::Uart1 => UART1_BASE,
        }
    }

    pub const fn vector(self) -> Vector {
        match self {
            UartPort::Uart0 => Vector::Uart0,
            UartPort::Uart1 => Vector::Uart1,
        }
    }

    /// The system controller gate of this UART.
    pub const fn peripheral(self) -> Peripheral {
        match self {
            UartPort::Uart0 => Peripheral::Uart0,
            UartPort::Uart1 => Peripheral::Uart1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordLength {
    Five = 0x00,
    Six = 0x20,
    Seven = 0x40,
    Eight = 0x60,
}

impl WordLength {
    fn from_bits(lcrh: u32) -> Self {
        match lcrh & LCRH_WLEN {
            0x00 => WordLength::Five,
            0x20 => WordLength::Six,
            0x40 => WordLength::Seven,
            _ => WordLength::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None = 0x00,
    Even = 0x06,
    Odd = 0x02,
    /// Parity bit always set.
    One = 0x82,
    /// Parity bit always clear.
    Zero = 0x86,
}

impl Parity {
    fn from_bits(lcrh: u32) -> Self {
        if lcrh & LCRH_PEN == 0 {
            return Parity::None;
        }
        match lcrh & (LCRH_SPS | LCRH_EPS) {
            0x00 => Parity::Odd,
            LCRH_EPS => Parity::Even,
            LCRH_SPS => Parity::One,
            _ => Parity::Zero,
        }
    }
}

/// Frame format of a UART line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineConfig {
    pub word_length: WordLength,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl Default for LineConfig {
    /// 8N1.
    fn default() -> Self {
        Self {
            word_length: WordLength::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl LineConfig {
    pub fn bits(&self) -> u32 {
        let stop = match self.stop_bits {
            StopBits::One => 0,
            StopBits::Two => LCRH_STP2,
        };
        self.word_length as u32 | stop | self.parity as u32
    }

    pub fn from_bits(lcrh: u32) -> Self {
        Self {
            word_length: WordLength::from_bits(lcrh),
            stop_bits: if lcrh & LCRH_STP2 != 0 {
                StopBits::Two
            } else {
                StopBits::One
            },
            parity: Parity::from_bits(lcrh),
        }
    }
}

/// Transmit interrupt trigger, as a fill level of the transmit FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxFifoLevel {
    OneEighth = 0x0,
    TwoEighths = 0x1,
    FourEighths = 0x2,
    SixEighths = 0x3,
    SevenEighths = 0x4,
}

/// Receive interrupt trigger, as a fill level of the receive FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifoLevel {
    OneEighth = 0x00,
    TwoEighths = 0x08,
    FourEighths = 0x10,
    SixEighths = 0x18,
    SevenEighths = 0x20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxIntMode {
    /// Interrupt on the transmit FIFO level.
    Fifo,
    /// Interrupt once the last bit has left the shift register.
    EndOfTransmission,
}

/// Baud clock of the UART and SSI blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    System = 0,
    /// Precision internal oscillator.
    Piosc = 1,
}

bitflags! {
    /// UART interrupt sources.
    pub struct Interrupts: u32 {
        const NINE_BIT = 0x1000;
        const OVERRUN = 0x400;
        const BREAK = 0x200;
        const PARITY = 0x100;
        const FRAMING = 0x80;
        const RX_TIMEOUT = 0x40;
        const TX = 0x20;
        const RX = 0x10;
        const CTS = 0x02;
    }
}

bitflags! {
    pub struct DmaFlags: u32 {
        /// Stop receive DMA on an error.
        const ERR_RXSTOP = 0x4;
        const TX = 0x2;
        const RX = 0x1;
    }
}

bitflags! {
    /// Sticky receive errors.
    pub struct RxErrors: u32 {
        const OVERRUN = 0x8;
        const BREAK = 0x4;
        const PARITY = 0x2;
        const FRAMING = 0x1;
    }
}

/// Station address matched in 9-bit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NineBitAddress {
    pub address: u8,
    pub mask: u8,
}

impl NineBitAddress {
    /// Whether an address byte (a byte received with the ninth bit set) selects this station.
    pub const fn matches(&self, byte: u8) -> bool {
        (byte & self.mask) == (self.address & self.mask)
    }
}

pub struct Serial<M> {
    mmio: M,
    port: UartPort,
}

impl<M: Mmio> Serial<M> {
    /// Take control of a UART without touching its registers.
    pub fn new(mmio: M, port: UartPort) -> Self {
        Self { mmio, port }
    }

    /// Configure the UART for `baud_rate` off the I/O clock and enable it.
    pub fn with_config(
        mmio: M,
        port: UartPort,
        clocks: &ClockConfig,
        baud_rate: u32,
        line: LineConfig,
    ) -> Self {
        let mut serial = Self::new(mmio, port);
        serial.configure(clocks.io_freq(), baud_rate, line);
        serial.enable();
        serial
    }

    pub fn port(&self) -> UartPort {
        self.port
    }

    /// Release the register handle.
    pub fn free(self) -> M {
        self.mmio
    }

    fn reg(&self, offset: u32) -> u32 {
        self.port.base() + offset
    }

    /// Set the baud rate and frame format.
    ///
    /// Waits for the transmitter to drain and leaves the UART disabled. Rates above a
    /// sixteenth of the clock switch to high-speed mode (8x oversampling).
    pub fn configure(&mut self, clock: u32, baud_rate: u32, line: LineConfig) {
        self.disable();

        let mut baud_rate = baud_rate.max(1);
        let high_speed = baud_rate.saturating_mul(16) > clock;
        if high_speed {
            self.mmio.set_bits(self.reg(CTL), CTL_HSE);
            baud_rate /= 2;
        } else {
            self.mmio.clear_bits(self.reg(CTL), CTL_HSE);
        }

        let div = ((clock * 8) / baud_rate + 1) / 2;
        self.mmio.write(self.reg(IBRD), div / 64);
        self.mmio.write(self.reg(FBRD), div % 64);
        self.mmio.write(self.reg(LCRH), line.bits());
        self.mmio.write(self.reg(FR), 0);

        debug!(
            "uart{}: ibrd {} fbrd {} hse {}",
            self.port as u8,
            div / 64,
            div % 64,
            high_speed
        );
    }

    /// Baud rate and frame format currently programmed, for a UART clocked at `clock`.
    pub fn config(&self, clock: u32) -> (u32, LineConfig) {
        let int = self.mmio.read(self.reg(IBRD));
        let frac = self.mmio.read(self.reg(FBRD));
        let divisor = (64 * int + frac).max(1);
        let mut baud_rate = (clock * 4) / divisor;
        if self.mmio.read(self.reg(CTL)) & CTL_HSE != 0 {
            baud_rate *= 2;
        }
        (
            baud_rate,
            LineConfig::from_bits(self.mmio.read(self.reg(LCRH))),
        )
    }

    pub fn set_parity(&mut self, parity: Parity) {
        self.mmio
            .modify(self.reg(LCRH), |v| (v & !LCRH_PARITY) | parity as u32);
    }

    pub fn parity(&self) -> Parity {
        Parity::from_bits(self.mmio.read(self.reg(LCRH)))
    }

    pub fn set_stop_bits(&mut self, stop_bits: StopBits) {
        match stop_bits {
            StopBits::One => self.mmio.clear_bits(self.reg(LCRH), LCRH_STP2),
            StopBits::Two => self.mmio.set_bits(self.reg(LCRH), LCRH_STP2),
        }
    }

    pub fn set_word_length(&mut self, word_length: WordLength) {
        self.mmio
            .modify(self.reg(LCRH), |v| (v & !LCRH_WLEN) | word_length as u32);
    }

    pub fn set_fifo_level(&mut self, tx: TxFifoLevel, rx: RxFifoLevel) {
        self.mmio.write(self.reg(IFLS), tx as u32 | rx as u32);
    }

    pub fn fifo_level(&self) -> (TxFifoLevel, RxFifoLevel) {
        let ifls = self.mmio.read(self.reg(IFLS));
        let tx = match ifls & IFLS_TX {
            0x0 => TxFifoLevel::OneEighth,
            0x1 => TxFifoLevel::TwoEighths,
            0x2 => TxFifoLevel::FourEighths,
            0x3 => TxFifoLevel::SixEighths,
            _ => TxFifoLevel::SevenEighths,
        };
        let rx = match ifls & IFLS_RX {
            0x00 => RxFifoLevel::OneEighth,
            0x08 => RxFifoLevel::TwoEighths,
            0x10 => RxFifoLevel::FourEighths,
            0x18 => RxFifoLevel::SixEighths,
            _ => RxFifoLevel::SevenEighths,
        };
        (tx, rx)
    }

    /// Enable the FIFOs, the transmitter and the receiver.
    pub fn enable(&mut self) {
        self.mmio.set_bits(self.reg(LCRH), LCRH_FEN);
        self.mmio
            .set_bits(self.reg(CTL), CTL_UARTEN | CTL_TXE | CTL_RXE);
    }

    /// Wait for the end of the current transmission, then disable the UART.
    pub fn disable(&mut self) {
        while self.is_busy() {}
        self.mmio.clear_bits(self.reg(LCRH), LCRH_FEN);
        self.mmio
            .clear_bits(self.reg(CTL), CTL_UARTEN | CTL_TXE | CTL_RXE);
    }

    pub fn enable_fifo(&mut self) {
        self.mmio.set_bits(self.reg(LCRH), LCRH_FEN);
    }

    pub fn disable_fifo(&mut self) {
        self.mmio.clear_bits(self.reg(LCRH), LCRH_FEN);
    }

    /// Switch to IrDA SIR encoding.
    pub fn enable_sir(&mut self, low_power: bool) {
        let mut bits = CTL_SIREN;
        if low_power {
            bits |= CTL_SIRLP;
        }
        self.mmio.set_bits(self.reg(CTL), bits);
    }

    pub fn disable_sir(&mut self) {
        self.mmio.clear_bits(self.reg(CTL), CTL_SIREN | CTL_SIRLP);
    }

    pub fn set_tx_int_mode(&mut self, mode: TxIntMode) {
        match mode {
            TxIntMode::Fifo => self.mmio.clear_bits(self.reg(CTL), CTL_EOT),
            TxIntMode::EndOfTransmission => self.mmio.set_bits(self.reg(CTL), CTL_EOT),
        }
    }

    pub fn tx_int_mode(&self) -> TxIntMode {
        if self.mmio.read(self.reg(CTL)) & CTL_EOT != 0 {
            TxIntMode::EndOfTransmission
        } else {
            TxIntMode::Fifo
        }
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

    /// Whether the receive FIFO holds at least one character.
    pub fn chars_available(&self) -> bool {
        self.mmio.read(self.reg(FR)) & FR_RXFE == 0
    }

    /// Whether the transmit FIFO has room for a character.
    pub fn space_available(&self) -> bool {
        self.mmio.read(self.reg(FR)) & FR_TXFF == 0
    }

    /// Wait for a character and return it.
    pub fn read_byte(&mut self) -> u8 {
        while !self.chars_available() {}
        self.mmio.read(self.reg(DR)) as u8
    }

    pub fn try_read_byte(&mut self) -> Option<u8> {
        if self.chars_available() {
            Some(self.mmio.read(self.reg(DR)) as u8)
        } else {
            None
        }
    }

    /// Wait for room in the transmit FIFO and queue `byte`.
    pub fn write_byte(&mut self, byte: u8) {
        while !self.space_available() {}
        self.mmio.write(self.reg(DR), byte as u32);
    }

    /// Queue `byte` if the transmit FIFO has room.
    pub fn try_write_byte(&mut self, byte: u8) -> bool {
        if self.space_available() {
            self.mmio.write(self.reg(DR), byte as u32);
            true
        } else {
            false
        }
    }

    /// Hold the line low while `on`.
    pub fn set_break(&mut self, on: bool) {
        if on {
            self.mmio.set_bits(self.reg(LCRH), LCRH_BRK);
        } else {
            self.mmio.clear_bits(self.reg(LCRH), LCRH_BRK);
        }
    }

    /// Whether a character is still being shifted out.
    pub fn is_busy(&self) -> bool {
        self.mmio.read(self.reg(FR)) & FR_BUSY != 0
    }

    /// Install `handler` for this UART and enable its vector.
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

    /// Raw or, with `masked`, enabled pending interrupts.
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

    /// Receive errors latched since the last [`Serial::clear_rx_errors`].
    pub fn rx_errors(&self) -> RxErrors {
        RxErrors::from_bits_truncate(self.mmio.read(self.reg(RSR_ECR)))
    }

    pub fn clear_rx_errors(&mut self) {
        self.mmio.write(self.reg(RSR_ECR), 0);
    }

    pub fn nine_bit_enable(&mut self) {
        self.mmio.set_bits(self.reg(NINEBITADDR), NINEBITADDR_EN);
    }

    pub fn nine_bit_disable(&mut self) {
        self.mmio.clear_bits(self.reg(NINEBITADDR), NINEBITADDR_EN);
    }

    /// Set the station address used in 9-bit mode. The mode enable is left as it is.
    pub fn set_nine_bit_address(&mut self, address: u8, mask: u8) {
        self.mmio.modify(self.reg(NINEBITADDR), |v| {
            (v & NINEBITADDR_EN) | address as u32
        });
        self.mmio.write(self.reg(NINEBITAMASK), mask as u32);
    }

    pub fn nine_bit_address(&self) -> NineBitAddress {
        NineBitAddress {
            address: self.mmio.read(self.reg(NINEBITADDR)) as u8,
            mask: self.mmio.read(self.reg(NINEBITAMASK)) as u8,
        }
    }

    /// Send `address` with the ninth bit set.
    ///
    /// Drains the transmitter before and after, and restores the line control register
    /// exactly as it was.
    pub fn send_nine_bit_address(&mut self, address: u8) {
        self.wait_tx_idle();

        let lcrh = self.mmio.read(self.reg(LCRH));
        self.mmio.write(
            self.reg(LCRH),
            (lcrh & !LCRH_EPS) | LCRH_SPS | LCRH_PEN,
        );
        self.mmio.write(self.reg(DR), address as u32);

        self.wait_tx_idle();
        self.mmio.write(self.reg(LCRH), lcrh);
    }

    fn wait_tx_idle(&self) {
        while self.mmio.read(self.reg(FR)) & (FR_TXFE | FR_BUSY) != FR_TXFE {}
    }
}

impl<M: Mmio> serial::nb::Read<u8> for Serial<M> {
    type Error = Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        if !self.chars_available() {
            return Err(nb::Error::WouldBlock);
        }

        let data = self.mmio.read(self.reg(DR));
        if data & DR_OE != 0 {
            Err(nb::Error::Other(Error::Overrun))
        } else if data & DR_BE != 0 {
            Err(nb::Error::Other(Error::Break))
        } else if data & DR_PE != 0 {
            Err(nb::Error::Other(Error::Parity))
        } else if data & DR_FE != 0 {
            Err(nb::Error::Other(Error::Framing))
        } else {
            Ok(data as u8)
        }
    }
}

impl<M: Mmio> serial::nb::Write<u8> for Serial<M> {
    type Error = Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        if self.try_write_byte(word) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.is_busy() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }
}

impl<M: Mmio> serial::blocking::Write<u8> for Serial<M> {
    type Error = Error;

    fn write(&mut self, buffer: &[u8]) -> Result<(), Self::Error> {
        for b in buffer {
            self.write_byte(*b);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while self.is_busy() {}
        Ok(())
    }
}

impl<M: Mmio> Write for Serial<M> {
    fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
        for b in s.bytes() {
            self.write_byte(b);
        }
        Ok(())
    }
}
