//! Word-sized access to memory-mapped registers.
//!
//! Every driver in this crate talks to its peripheral through an [`Mmio`] implementation
//! instead of dereferencing register addresses itself. On the target that is [`RealMmio`];
//! the unit tests substitute a register file that models the peripherals.

use core::ptr;

/// Access to a 32-bit physical address space.
pub trait Mmio {
    /// Read the register at `addr`.
    fn read(&self, addr: u32) -> u32;

    /// Write `value` to the register at `addr`.
    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write of the register at `addr`.
    ///
    /// Not atomic: an interrupt handler touching the same register between the read and the
    /// write loses its update.
    #[inline]
    fn modify<F>(&self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    #[inline]
    fn set_bits(&self, addr: u32, mask: u32) {
        self.modify(addr, |v| v | mask);
    }

    #[inline]
    fn clear_bits(&self, addr: u32, mask: u32) {
        self.modify(addr, |v| v & !mask);
    }

    /// The address a bus master inside the SoC (the AES DMA) uses for `len` bytes at `buf`.
    #[inline]
    fn bus_address(&self, buf: *const u8, len: usize) -> u32 {
        let _ = len;
        buf as usize as u32
    }
}

impl<T: Mmio + ?Sized> Mmio for &T {
    #[inline]
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    #[inline]
    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }

    #[inline]
    fn bus_address(&self, buf: *const u8, len: usize) -> u32 {
        (**self).bus_address(buf, len)
    }
}

/// Volatile loads and stores to the physical address space of the CC2538.
#[derive(Debug, Clone, Copy)]
pub struct RealMmio {
    _private: (),
}

impl RealMmio {
    /// # Safety
    ///
    /// The caller must own the peripherals this handle will be used on. Nothing else may
    /// access those registers behind the drivers' backs.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmio for RealMmio {
    #[inline]
    fn read(&self, addr: u32) -> u32 {
        unsafe { ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline]
    fn write(&self, addr: u32, value: u32) {
        unsafe { ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}
