//! Interrupt vector installation.
//!
//! Drivers don't dispatch interrupts themselves. They map their port onto a fixed [`Vector`]
//! and hand it to an [`InterruptController`], which on the target is the [`Nvic`].

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

/// An interrupt handler as stored in the vector table.
pub type Handler = extern "C" fn();

/// Exception numbers of the peripheral interrupts, alternate interrupt map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Vector {
    Uart0 = 21,
    Uart1 = 22,
    Ssi0 = 23,
    Ssi1 = 50,
    Aes = 159,
}

impl Vector {
    /// Position in the vector table.
    pub const fn exception_number(self) -> u16 {
        self as u16
    }
}

// The NVIC counts from the first external interrupt, after the 16 system exceptions.
unsafe impl InterruptNumber for Vector {
    #[inline]
    fn number(self) -> u16 {
        self as u16 - 16
    }
}

/// Registers handlers and gates interrupt vectors.
pub trait InterruptController {
    /// Install `handler` for `vector`.
    fn register(&mut self, vector: Vector, handler: Handler);

    /// Remove whatever handler is installed for `vector`.
    fn unregister(&mut self, vector: Vector);

    fn enable(&mut self, vector: Vector);

    fn disable(&mut self, vector: Vector);

    /// Clear a pending request for `vector`.
    fn pend_clear(&mut self, vector: Vector);
}

/// The Cortex-M3 interrupt controller.
///
/// Registering a handler moves the vector table into RAM the first time, copying the table
/// that is active at that point.
pub struct Nvic {
    nvic: NVIC,
}

impl Nvic {
    pub fn new(nvic: NVIC) -> Self {
        Self { nvic }
    }

    /// Give back the core peripheral.
    pub fn free(self) -> NVIC {
        self.nvic
    }
}

impl InterruptController for Nvic {
    fn register(&mut self, vector: Vector, handler: Handler) {
        unsafe { vector_table::install(vector.exception_number() as usize, handler as usize) };
    }

    fn unregister(&mut self, vector: Vector) {
        let parked = unhandled as Handler as usize;
        unsafe { vector_table::install(vector.exception_number() as usize, parked) };
    }

    fn enable(&mut self, vector: Vector) {
        unsafe { NVIC::unmask(vector) };
    }

    fn disable(&mut self, vector: Vector) {
        NVIC::mask(vector);
    }

    fn pend_clear(&mut self, vector: Vector) {
        NVIC::unpend(vector);
    }
}

/// Installed in place of an unregistered handler.
extern "C" fn unhandled() {
    loop {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(target_arch = "arm")]
mod vector_table {
    use core::ptr::addr_of_mut;

    use cortex_m::peripheral::SCB;

    /// 16 system exceptions and 147 peripheral interrupts.
    const NUM_VECTORS: usize = 163;

    // VTOR requires the table to be aligned to its size rounded up to a power of two.
    #[repr(C, align(1024))]
    struct RamVectors([usize; NUM_VECTORS]);

    static mut RAM_VECTORS: RamVectors = RamVectors([0; NUM_VECTORS]);

    pub(super) unsafe fn install(index: usize, entry: usize) {
        let scb = &*SCB::PTR;
        let table = addr_of_mut!(RAM_VECTORS) as *mut usize;

        let active = scb.vtor.read();
        if active != table as u32 {
            let current = active as usize as *const usize;
            for i in 0..NUM_VECTORS {
                table.add(i).write_volatile(current.add(i).read_volatile());
            }
            scb.vtor.write(table as u32);
        }

        table.add(index).write_volatile(entry);
    }
}

#[cfg(not(target_arch = "arm"))]
mod vector_table {
    pub(super) unsafe fn install(_index: usize, _entry: usize) {
        unimplemented!()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Event {
        Register(Vector),
        Unregister(Vector),
        Enable(Vector),
        Disable(Vector),
        PendClear(Vector),
    }

    /// Records every call for later inspection.
    #[derive(Default)]
    pub(crate) struct RecordingController {
        pub events: Vec<Event>,
    }

    impl InterruptController for RecordingController {
        fn register(&mut self, vector: Vector, _handler: Handler) {
            self.events.push(Event::Register(vector));
        }

        fn unregister(&mut self, vector: Vector) {
            self.events.push(Event::Unregister(vector));
        }

        fn enable(&mut self, vector: Vector) {
            self.events.push(Event::Enable(vector));
        }

        fn disable(&mut self, vector: Vector) {
            self.events.push(Event::Disable(vector));
        }

        fn pend_clear(&mut self, vector: Vector) {
            self.events.push(Event::PendClear(vector));
        }
    }

    #[test]
    fn irq_numbers_skip_system_exceptions() {
        assert_eq!(InterruptNumber::number(Vector::Uart0), 5);
        assert_eq!(InterruptNumber::number(Vector::Uart1), 6);
        assert_eq!(InterruptNumber::number(Vector::Ssi0), 7);
        assert_eq!(InterruptNumber::number(Vector::Ssi1), 34);
        assert_eq!(InterruptNumber::number(Vector::Aes), 143);
        assert_eq!(Vector::Aes.exception_number(), 159);
    }
}
