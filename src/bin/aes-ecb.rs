#![no_main]
#![no_std]

use cortex_m_rt as rt;
use rt::entry;

use panic_rtt_target as _;

use rtt_target::{rprintln, rtt_init_print};

use cc2538_bsp::crypto::{AesKey, Direction, KeyArea};
use cc2538_bsp::sys_ctrl::*;
use cc2538_bsp::Board;

// FIPS-197 appendix C.1
const KEY: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];
const PLAINTEXT: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
    0xff,
];
const CIPHERTEXT: [u8; 16] = [
    0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4, 0xc5,
    0x5a,
];

#[entry]
fn main() -> ! {
    rtt_init_print!(BlockIfFull);

    match inner_main() {
        Ok(()) => loop {
            cortex_m::asm::wfi();
        },
        Err(e) => panic!("{}", e),
    }
}

fn inner_main() -> Result<(), &'static str> {
    let board = Board::take().ok_or("unable to get peripherals")?;

    // Setup the clock
    let mut sys_ctrl = board.sys_ctrl;
    sys_ctrl.set_osc(Osc::Osc32Mhz);
    sys_ctrl.set_sys_div(ClockDiv::Clock32Mhz);
    sys_ctrl.set_io_div(ClockDiv::Clock32Mhz);
    let mut sys_ctrl = sys_ctrl.freeze().map_err(|_| "clock switch failed")?;

    sys_ctrl.peripheral_enable(Peripheral::Aes);
    sys_ctrl
        .peripheral_reset(Peripheral::Aes)
        .map_err(|_| "unable to reset the AES engine")?;

    let mut aes = board.aes;
    let area = KeyArea::new(0).ok_or("bad key area")?;
    aes.load_key(&AesKey::Key128(KEY), area)
        .map_err(|_| "key load failed")?;

    let mut block = [0; 16];
    aes.ecb_blocking(&PLAINTEXT, &mut block, area, Direction::Encrypt)
        .map_err(|_| "encryption failed")?;
    rprintln!("ciphertext {:02x?}", block);
    if block != CIPHERTEXT {
        return Err("ciphertext mismatch");
    }

    let mut decrypted = [0; 16];
    aes.ecb_blocking(&block, &mut decrypted, area, Direction::Decrypt)
        .map_err(|_| "decryption failed")?;
    rprintln!("plaintext {:02x?}", decrypted);
    if decrypted != PLAINTEXT {
        return Err("plaintext mismatch");
    }

    rprintln!("aes-ecb ok");
    Ok(())
}
