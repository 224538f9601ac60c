use crate::memory_map::AES_BASE;
use crate::mmio::Mmio;

use super::{AesOp, CryptoError};

pub mod ecb;
pub mod keys;

use keys::{AesKey, KeyArea, KeyBuffer};

const DMAC_CH0_CTRL: u32 = AES_BASE + 0x000;
const DMAC_CH0_EXTADDR: u32 = AES_BASE + 0x004;
const DMAC_CH0_DMALENGTH: u32 = AES_BASE + 0x00C;
const DMAC_CH1_CTRL: u32 = AES_BASE + 0x020;
const DMAC_CH1_EXTADDR: u32 = AES_BASE + 0x024;
const DMAC_CH1_DMALENGTH: u32 = AES_BASE + 0x02C;
const DMAC_CH_EN: u32 = 0x1;

const KEY_STORE_WRITE_AREA: u32 = AES_BASE + 0x400;
const KEY_STORE_WRITTEN_AREA: u32 = AES_BASE + 0x404;
const KEY_STORE_SIZE: u32 = AES_BASE + 0x408;
const KEY_STORE_READ_AREA: u32 = AES_BASE + 0x40C;
const KEY_STORE_SIZE_MASK: u32 = 0x3;
const READ_AREA_BUSY: u32 = 1 << 31;

const AES_CTRL: u32 = AES_BASE + 0x550;
const AES_C_LENGTH_0: u32 = AES_BASE + 0x554;
const AES_C_LENGTH_1: u32 = AES_BASE + 0x558;
const AES_CTRL_DIRECTION_ENCRYPT: u32 = 0x4;
const AES_CTRL_KEY_SIZE_SHIFT: u32 = 3;

const CTRL_ALG_SEL: u32 = AES_BASE + 0x700;
const CTRL_INT_CFG: u32 = AES_BASE + 0x780;
const CTRL_INT_EN: u32 = AES_BASE + 0x784;
const CTRL_INT_CLR: u32 = AES_BASE + 0x788;
const CTRL_INT_STAT: u32 = AES_BASE + 0x790;

const ALG_SEL_KEYSTORE: u32 = 0x1;
const ALG_SEL_AES: u32 = 0x2;

const INT_CFG_LEVEL: u32 = 0x1;

const INT_DMA_BUS_ERR: u32 = 1 << 31;
const INT_KEY_ST_WR_ERR: u32 = 1 << 30;
const INT_KEY_ST_RD_ERR: u32 = 1 << 29;
const INT_DMA_IN_DONE: u32 = 0x2;
const INT_RESULT_AV: u32 = 0x1;
const INT_ERRORS: u32 = INT_DMA_BUS_ERR | INT_KEY_ST_WR_ERR | INT_KEY_ST_RD_ERR;

/// The AES engine together with its key store.
pub struct AesEngine<M> {
    mmio: M,
    op: AesOp,
}

impl<M: Mmio> AesEngine<M> {
    pub fn new(mmio: M) -> Self {
        Self {
            mmio,
            op: AesOp::None,
        }
    }

    pub fn free(self) -> M {
        self.mmio
    }

    /// The operation holding the engine.
    pub fn current_op(&self) -> AesOp {
        self.op
    }

    /// Release the engine after the hardware was reset under a running operation.
    pub fn clear_current_op(&mut self) {
        self.op = AesOp::None;
    }

    /// Whether the engine's master control has an algorithm selected.
    pub fn is_in_use(&self) -> bool {
        self.mmio.read(CTRL_ALG_SEL) != 0
    }

    fn acquire(&mut self, op: AesOp) -> Result<(), CryptoError> {
        if self.op != AesOp::None {
            warn!("aes engine busy");
            return Err(CryptoError::Busy);
        }
        self.op = op;
        Ok(())
    }

    /// Drop the algorithm selection and give the engine back.
    fn release(&mut self) {
        self.mmio.write(CTRL_ALG_SEL, 0);
        self.op = AesOp::None;
    }

    /// Reprogram the interrupt setup, which is not retained in PM2.
    fn workaround(&self) {
        self.mmio.write(CTRL_INT_CFG, INT_CFG_LEVEL);
        self.mmio
            .write(CTRL_INT_EN, INT_DMA_IN_DONE | INT_RESULT_AV);
    }

    fn start_dma(&self, ctrl: u32, ext_addr: u32, length: u32, data: *const u8, len: usize) {
        self.mmio.write(ctrl, DMAC_CH_EN);
        self.mmio
            .write(ext_addr, self.mmio.bus_address(data, len));
        self.mmio.write(length, len as u32);
    }

    /// Store `key` in the key store, starting at `area`.
    ///
    /// 192 and 256-bit keys take two areas, `area` and the one after it, and need an even
    /// `area`. Loading a key of another size than the one stored before erases the whole key
    /// store.
    pub fn load_key(&mut self, key: &AesKey, area: KeyArea) -> Result<(), CryptoError> {
        let size = key.size();
        if size.areas() == 2 && area.index() % 2 != 0 {
            return Err(CryptoError::InvalidKeyArea);
        }
        self.acquire(AesOp::KeyLoad)?;

        self.workaround();
        self.mmio.write(CTRL_ALG_SEL, ALG_SEL_KEYSTORE);
        self.mmio
            .write(CTRL_INT_CLR, INT_DMA_IN_DONE | INT_RESULT_AV);

        if self.mmio.read(KEY_STORE_SIZE) & KEY_STORE_SIZE_MASK != size.bits() {
            self.mmio.write(KEY_STORE_SIZE, size.bits());
        }

        let areas = ((1 << size.areas()) - 1) << area.index();
        // Free the areas, then open them for writing.
        self.mmio.write(KEY_STORE_WRITTEN_AREA, areas);
        self.mmio.write(KEY_STORE_WRITE_AREA, areas);

        let buffer = KeyBuffer::new(key);
        let data = buffer.as_slice();
        self.start_dma(
            DMAC_CH0_CTRL,
            DMAC_CH0_EXTADDR,
            DMAC_CH0_DMALENGTH,
            data.as_ptr(),
            data.len(),
        );

        let stat = loop {
            let stat = self.mmio.read(CTRL_INT_STAT);
            if stat & (INT_RESULT_AV | INT_ERRORS) != 0 {
                break stat;
            }
        };

        if stat & INT_DMA_BUS_ERR != 0 {
            self.mmio.write(CTRL_INT_CLR, INT_DMA_BUS_ERR);
            self.release();
            error!("key load: dma bus error");
            return Err(CryptoError::DmaBus);
        }
        if stat & INT_KEY_ST_WR_ERR != 0 {
            self.mmio.write(CTRL_INT_CLR, INT_KEY_ST_WR_ERR);
            self.release();
            error!("key load: key store write error");
            return Err(CryptoError::KeystoreWrite);
        }

        self.mmio
            .write(CTRL_INT_CLR, INT_DMA_IN_DONE | INT_RESULT_AV);
        self.release();

        if self.mmio.read(KEY_STORE_WRITTEN_AREA) & areas != areas {
            error!("key load: area {} not written", area.index());
            return Err(CryptoError::KeystoreWrite);
        }

        debug!("key loaded in area {}", area.index());
        Ok(())
    }
}
