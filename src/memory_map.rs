//! Base addresses of the peripherals driven by this crate.

pub const SSI0_BASE: u32 = 0x4000_8000;
pub const SSI1_BASE: u32 = 0x4000_9000;
pub const UART0_BASE: u32 = 0x4000_C000;
pub const UART1_BASE: u32 = 0x4000_D000;
pub const AES_BASE: u32 = 0x4008_B000;
pub const SYS_CTRL_BASE: u32 = 0x400D_2000;

pub const FLASH_BASE: u32 = 0x0020_0000;
