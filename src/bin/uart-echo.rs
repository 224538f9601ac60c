#![no_main]
#![no_std]

use cortex_m_rt as rt;
use rt::entry;

use panic_rtt_target as _;

use rtt_target::{rprintln, rtt_init_print};

use embedded_hal::serial::nb::{Read, Write};
use cc2538_bsp::mmio::Mmio;
use cc2538_bsp::serial::{LineConfig, Serial, UartPort};
use cc2538_bsp::sys_ctrl::*;
use cc2538_bsp::Board;

const IOC_PA1_SEL: u32 = 0x400D_4004;
const IOC_PA1_OVER: u32 = 0x400D_4084;
const IOC_PA0_OVER: u32 = 0x400D_4080;
const IOC_UARTRXD_UART0: u32 = 0x400D_4100;
const GPIO_A_AFSEL: u32 = 0x400D_9420;

#[entry]
fn main() -> ! {
    rtt_init_print!();

    match inner_main() {
        Ok(()) => cortex_m::peripheral::SCB::sys_reset(),
        Err(e) => panic!("{}", e),
    }
}

/// Route UART0 to PA0 (RX) and PA1 (TX), the pins of the SmartRF06 USB bridge.
fn pin_mux(mmio: &impl Mmio) {
    mmio.write(IOC_PA1_SEL, 0);
    mmio.write(IOC_PA1_OVER, 0x8);
    mmio.write(IOC_PA0_OVER, 0);
    mmio.write(IOC_UARTRXD_UART0, 0);
    mmio.set_bits(GPIO_A_AFSEL, 0b11);
}

fn inner_main() -> Result<(), &'static str> {
    let board = Board::take().ok_or("unable to get peripherals")?;

    // Setup the clock
    let mut sys_ctrl = board.sys_ctrl;
    sys_ctrl.set_osc(Osc::Osc32Mhz);
    sys_ctrl.set_sys_div(ClockDiv::Clock32Mhz);
    sys_ctrl.set_io_div(ClockDiv::Clock32Mhz);
    let mut sys_ctrl = sys_ctrl.freeze().map_err(|_| "clock switch failed")?;
    sys_ctrl.peripheral_enable(Peripheral::Uart0);

    let mmio = board.uart0.free();
    pin_mux(&mmio);

    let mut uart = Serial::with_config(
        mmio,
        UartPort::Uart0,
        &sys_ctrl.config(),
        115_200,
        LineConfig::default(),
    );
    rprintln!("uart0 at {} baud", uart.config(sys_ctrl.io_clock_get()).0);

    loop {
        match nb::block!(uart.read()) {
            Ok(byte) => {
                nb::block!(uart.write(byte)).map_err(|_| "write failed")?;
            }
            Err(e) => rprintln!("rx error: {:?}", e),
        }
    }
}
