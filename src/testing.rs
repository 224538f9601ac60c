//! Host-side register file for the unit tests.
//!
//! [`RegisterFile`] implements [`Mmio`] over a plain word map. Peripherals whose registers
//! have side effects (FIFO flags, write-1-to-clear, status mirrors, DMA) attach a [`Device`]
//! model that claims their address window.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;

use crate::mmio::Mmio;

/// Backing store shared by all attached devices.
#[derive(Default)]
pub(crate) struct Bus {
    words: HashMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    reads: Vec<u32>,
    buffers: Vec<(u32, *const u8, usize)>,
}

impl Bus {
    pub fn peek(&self, addr: u32) -> u32 {
        self.words.get(&addr).copied().unwrap_or(0)
    }

    pub fn poke(&mut self, addr: u32, value: u32) {
        self.words.insert(addr, value);
    }

    /// The host memory behind a DMA address handed out by [`Mmio::bus_address`].
    pub fn host_buffer(&self, addr: u32) -> Option<(*const u8, usize)> {
        self.buffers
            .iter()
            .find(|(bus, _, _)| *bus == addr)
            .map(|(_, ptr, len)| (*ptr, *len))
    }
}

/// Side effects of one peripheral's registers.
pub(crate) trait Device {
    fn claims(&self, addr: u32) -> bool;

    fn read(&mut self, bus: &mut Bus, addr: u32) -> u32 {
        bus.peek(addr)
    }

    fn write(&mut self, bus: &mut Bus, addr: u32, value: u32) {
        bus.poke(addr, value)
    }
}

#[derive(Default)]
pub(crate) struct RegisterFile {
    bus: RefCell<Bus>,
    devices: RefCell<Vec<Rc<RefCell<dyn Device>>>>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, device: Rc<RefCell<dyn Device>>) {
        self.devices.borrow_mut().push(device);
    }

    /// Value of a register, bypassing device side effects.
    pub fn peek(&self, addr: u32) -> u32 {
        self.bus.borrow().peek(addr)
    }

    /// Preset a register, bypassing device side effects.
    pub fn poke(&self, addr: u32, value: u32) {
        self.bus.borrow_mut().poke(addr, value)
    }

    /// Every value written to `addr`, oldest first.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.bus
            .borrow()
            .writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    /// All writes, oldest first.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.bus.borrow().writes.clone()
    }

    /// How many times `addr` has been read.
    pub fn read_count(&self, addr: u32) -> usize {
        self.bus.borrow().reads.iter().filter(|a| **a == addr).count()
    }

    fn device_for(&self, addr: u32) -> Option<Rc<RefCell<dyn Device>>> {
        self.devices
            .borrow()
            .iter()
            .find(|d| d.borrow().claims(addr))
            .cloned()
    }
}

impl Mmio for RegisterFile {
    fn read(&self, addr: u32) -> u32 {
        let mut bus = self.bus.borrow_mut();
        bus.reads.push(addr);
        match self.device_for(addr) {
            Some(device) => device.borrow_mut().read(&mut bus, addr),
            None => bus.peek(addr),
        }
    }

    fn write(&self, addr: u32, value: u32) {
        let mut bus = self.bus.borrow_mut();
        bus.writes.push((addr, value));
        match self.device_for(addr) {
            Some(device) => device.borrow_mut().write(&mut bus, addr, value),
            None => bus.poke(addr, value),
        }
    }

    // Host pointers don't fit the 32-bit DMA registers; hand out stand-in SRAM addresses.
    fn bus_address(&self, buf: *const u8, len: usize) -> u32 {
        let mut bus = self.bus.borrow_mut();
        let addr = 0x2000_0000 + 0x100 * bus.buffers.len() as u32;
        bus.buffers.push((addr, buf, len));
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clearing {
        base: u32,
    }

    impl Device for Clearing {
        fn claims(&self, addr: u32) -> bool {
            addr == self.base
        }

        fn write(&mut self, bus: &mut Bus, addr: u32, value: u32) {
            let old = bus.peek(addr);
            bus.poke(addr, old & !value);
        }
    }

    #[test]
    fn plain_words_and_trace() {
        let regs = RegisterFile::new();
        regs.write(0x10, 0xdead_beef);
        regs.modify(0x10, |v| v & 0xffff);
        assert_eq!(regs.read(0x10), 0xbeef);
        assert_eq!(regs.writes_to(0x10), [0xdead_beef, 0xbeef]);
        assert_eq!(regs.read_count(0x10), 2);
        assert_eq!(regs.read(0x14), 0);
    }

    #[test]
    fn devices_see_writes() {
        let regs = RegisterFile::new();
        regs.attach(Rc::new(RefCell::new(Clearing { base: 0x40 })));
        regs.poke(0x40, 0b1111);
        regs.write(0x40, 0b0101);
        assert_eq!(regs.peek(0x40), 0b1010);
    }

    #[test]
    fn bus_addresses_map_back_to_host_memory() {
        let regs = RegisterFile::new();
        let data = [1u8, 2, 3];
        let addr = regs.bus_address(data.as_ptr(), data.len());
        let (ptr, len) = regs.bus.borrow().host_buffer(addr).unwrap();
        assert_eq!(ptr, data.as_ptr());
        assert_eq!(len, 3);
    }
}
