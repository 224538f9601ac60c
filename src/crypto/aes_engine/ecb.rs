//! Single-block AES in electronic codebook mode.

use crate::interrupt::{InterruptController, Vector};
use crate::mmio::Mmio;

use super::keys::KeyArea;
use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// A running ECB operation.
///
/// Holds the engine and both buffers until the engine is done with them. Dropping a
/// transfer that was never waited on blocks until the hardware finishes.
pub struct EcbTransfer<'a, M: Mmio> {
    engine: &'a mut AesEngine<M>,
    _input: &'a [u8; 16],
    _output: &'a mut [u8; 16],
    irq: Option<&'a mut dyn InterruptController>,
    collected: bool,
}

impl<M: Mmio> AesEngine<M> {
    /// Start encrypting or decrypting one block with the key in `area`.
    ///
    /// With `irq`, the AES interrupt is cleared and enabled for the duration of the
    /// operation.
    ///
    /// # Safety
    ///
    /// The engine's DMA keeps reading `input` and writing `output` until the returned
    /// transfer is waited on or dropped. The transfer must not be leaked (`mem::forget`,
    /// reference cycles), or the buffers can go away while the DMA still targets them.
    pub unsafe fn ecb<'a>(
        &'a mut self,
        input: &'a [u8; 16],
        output: &'a mut [u8; 16],
        area: KeyArea,
        direction: Direction,
        mut irq: Option<&'a mut dyn InterruptController>,
    ) -> Result<EcbTransfer<'a, M>, CryptoError> {
        self.acquire(AesOp::Ecb)?;

        self.workaround();
        self.mmio.write(CTRL_ALG_SEL, ALG_SEL_AES);
        self.mmio
            .write(CTRL_INT_CLR, INT_DMA_IN_DONE | INT_RESULT_AV);

        self.mmio.write(KEY_STORE_READ_AREA, area.index() as u32);
        while self.mmio.read(KEY_STORE_READ_AREA) & READ_AREA_BUSY != 0 {}

        if self.mmio.read(CTRL_INT_STAT) & INT_KEY_ST_RD_ERR != 0 {
            self.mmio.write(CTRL_INT_CLR, INT_KEY_ST_RD_ERR);
            self.release();
            error!("ecb: no key in area {}", area.index());
            return Err(CryptoError::KeystoreRead);
        }

        let key_size = self.mmio.read(KEY_STORE_SIZE) & KEY_STORE_SIZE_MASK;
        let mut ctrl = key_size << AES_CTRL_KEY_SIZE_SHIFT;
        if direction == Direction::Encrypt {
            ctrl |= AES_CTRL_DIRECTION_ENCRYPT;
        }
        self.mmio.write(AES_CTRL, ctrl);
        self.mmio.write(AES_C_LENGTH_0, 16);
        self.mmio.write(AES_C_LENGTH_1, 0);

        self.start_dma(
            DMAC_CH0_CTRL,
            DMAC_CH0_EXTADDR,
            DMAC_CH0_DMALENGTH,
            input.as_ptr(),
            input.len(),
        );
        self.start_dma(
            DMAC_CH1_CTRL,
            DMAC_CH1_EXTADDR,
            DMAC_CH1_DMALENGTH,
            output.as_mut_ptr() as *const u8,
            output.len(),
        );

        if let Some(ctl) = irq.as_deref_mut() {
            ctl.pend_clear(Vector::Aes);
            ctl.enable(Vector::Aes);
        }

        Ok(EcbTransfer {
            engine: self,
            _input: input,
            _output: output,
            irq,
            collected: false,
        })
    }

    /// Run one block through the engine and wait for it.
    pub fn ecb_blocking(
        &mut self,
        input: &[u8; 16],
        output: &mut [u8; 16],
        area: KeyArea,
        direction: Direction,
    ) -> Result<(), CryptoError> {
        // The transfer is consumed right here, so it cannot leak.
        let transfer = unsafe { self.ecb(input, output, area, direction, None) }?;
        transfer.wait()
    }
}

impl<'a, M: Mmio> EcbTransfer<'a, M> {
    /// Whether the result, or an error, is available.
    pub fn is_complete(&self) -> bool {
        self.engine.mmio.read(CTRL_INT_STAT) & (INT_RESULT_AV | INT_ERRORS) != 0
    }

    pub fn current_op(&self) -> AesOp {
        self.engine.current_op()
    }

    /// Block until the engine is done and hand the buffers back.
    pub fn wait(mut self) -> Result<(), CryptoError> {
        while !self.is_complete() {}
        self.collect()
    }

    fn collect(&mut self) -> Result<(), CryptoError> {
        self.collected = true;
        let mmio = &self.engine.mmio;
        let stat = mmio.read(CTRL_INT_STAT);

        let result = if stat & INT_DMA_BUS_ERR != 0 {
            mmio.write(CTRL_INT_CLR, INT_DMA_BUS_ERR);
            Err(CryptoError::DmaBus)
        } else if stat & INT_KEY_ST_WR_ERR != 0 {
            mmio.write(CTRL_INT_CLR, INT_KEY_ST_WR_ERR);
            Err(CryptoError::KeystoreWrite)
        } else if stat & INT_KEY_ST_RD_ERR != 0 {
            mmio.write(CTRL_INT_CLR, INT_KEY_ST_RD_ERR);
            Err(CryptoError::KeystoreRead)
        } else {
            mmio.write(CTRL_INT_CLR, INT_DMA_IN_DONE | INT_RESULT_AV);
            mmio.write(AES_CTRL, 0);
            Ok(())
        };

        if let Some(ctl) = self.irq.as_deref_mut() {
            ctl.disable(Vector::Aes);
        }
        self.engine.release();

        if let Err(e) = result {
            error!("ecb failed: {}", e);
        }
        result
    }
}

impl<'a, M: Mmio> Drop for EcbTransfer<'a, M> {
    fn drop(&mut self) {
        if !self.collected {
            while !self.is_complete() {}
            let _ = self.collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::keys::AesKey;
    use super::super::tests::{ecb_block, setup};
    use super::*;
    use crate::interrupt::tests::{Event, RecordingController};

    const AES128_ZERO: [u8; 16] = [
        0x66, 0xE9, 0x4B, 0xD4, 0xEF, 0x8A, 0x2C, 0x3B, 0x88, 0x4C, 0xFA, 0x59, 0xCA, 0x34,
        0x2B, 0x2E,
    ];

    fn area(index: u8) -> KeyArea {
        KeyArea::new(index).unwrap()
    }

    #[test]
    fn encrypt_zero_block_with_zero_key() {
        let (regs, _) = setup();
        let mut engine = AesEngine::new(&regs);
        engine.load_key(&AesKey::Key128([0; 16]), area(0)).unwrap();

        let input = [0u8; 16];
        let mut output = [0u8; 16];
        engine
            .ecb_blocking(&input, &mut output, area(0), Direction::Encrypt)
            .unwrap();

        assert_eq!(output, AES128_ZERO);
        assert_eq!(regs.writes_to(AES_CTRL), [0xC, 0]);
        assert_eq!(regs.writes_to(AES_C_LENGTH_0), [16]);
        assert_eq!(regs.writes_to(DMAC_CH1_DMALENGTH), [16]);
        assert_eq!(engine.current_op(), AesOp::None);
        assert!(!engine.is_in_use());
    }

    #[test]
    fn aes256_known_answer() {
        let (regs, _) = setup();
        let mut engine = AesEngine::new(&regs);
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = i as u8;
        }
        let plain = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];
        let cipher = [
            0x8E, 0xA2, 0xB7, 0xCA, 0x51, 0x67, 0x45, 0xBF, 0xEA, 0xFC, 0x49, 0x90, 0x4B, 0x49,
            0x60, 0x89,
        ];
        engine.load_key(&AesKey::Key256(key), area(2)).unwrap();

        let mut output = [0u8; 16];
        engine
            .ecb_blocking(&plain, &mut output, area(2), Direction::Encrypt)
            .unwrap();
        assert_eq!(output, cipher);
        assert_eq!(regs.writes_to(AES_CTRL)[0], (0b11 << 3) | 0x4);

        let mut decrypted = [0u8; 16];
        engine
            .ecb_blocking(&output, &mut decrypted, area(2), Direction::Decrypt)
            .unwrap();
        assert_eq!(decrypted, plain);
        assert_eq!(regs.writes_to(AES_CTRL)[2], 0b11 << 3);
    }

    #[test]
    fn aes192_matches_software() {
        let (regs, _) = setup();
        let mut engine = AesEngine::new(&regs);
        let key = [0x5Cu8; 24];
        let input = *b"sixteen byte msg";
        engine.load_key(&AesKey::Key192(key), area(0)).unwrap();

        let mut output = [0u8; 16];
        engine
            .ecb_blocking(&input, &mut output, area(0), Direction::Encrypt)
            .unwrap();
        assert_eq!(output, ecb_block(&key, &input, true));
    }

    #[test]
    fn empty_area_is_a_read_error() {
        let (regs, model) = setup();
        let mut engine = AesEngine::new(&regs);
        engine.load_key(&AesKey::Key128([7; 16]), area(0)).unwrap();
        model.borrow_mut().read_busy_polls = 2;

        let mut output = [0u8; 16];
        let result =
            unsafe { engine.ecb(&[0; 16], &mut output, area(5), Direction::Encrypt, None) }
                .map(|_| ());

        assert_eq!(result, Err(CryptoError::KeystoreRead));
        assert_eq!(regs.read_count(KEY_STORE_READ_AREA), 3);
        assert_eq!(regs.peek(CTRL_INT_STAT) & INT_KEY_ST_RD_ERR, 0);
        assert_eq!(engine.current_op(), AesOp::None);
        assert!(!engine.is_in_use());
        assert!(regs.writes_to(DMAC_CH0_DMALENGTH).len() == 1);
    }

    #[test]
    fn dma_error_during_ecb() {
        let (regs, model) = setup();
        let mut engine = AesEngine::new(&regs);
        engine.load_key(&AesKey::Key128([7; 16]), area(0)).unwrap();
        model.borrow_mut().fail_dma = true;

        let mut output = [0u8; 16];
        assert_eq!(
            engine.ecb_blocking(&[0; 16], &mut output, area(0), Direction::Encrypt),
            Err(CryptoError::DmaBus)
        );
        assert_eq!(engine.current_op(), AesOp::None);
        assert_eq!(regs.peek(CTRL_INT_STAT) & INT_DMA_BUS_ERR, 0);
    }

    #[test]
    fn interrupt_is_enabled_while_running() {
        let (regs, _) = setup();
        let mut engine = AesEngine::new(&regs);
        let mut nvic = RecordingController::default();
        engine.load_key(&AesKey::Key128([0; 16]), area(0)).unwrap();

        let mut output = [0u8; 16];
        let transfer = unsafe {
            engine.ecb(&[0; 16], &mut output, area(0), Direction::Encrypt, Some(&mut nvic))
        }
        .unwrap();
        assert!(transfer.is_complete());
        transfer.wait().unwrap();

        assert_eq!(output, AES128_ZERO);
        assert_eq!(
            nvic.events,
            [
                Event::PendClear(Vector::Aes),
                Event::Enable(Vector::Aes),
                Event::Disable(Vector::Aes),
            ]
        );
    }

    #[test]
    fn one_operation_at_a_time() {
        let (regs, _) = setup();
        let mut engine = AesEngine::new(&regs);
        engine.load_key(&AesKey::Key128([0; 16]), area(0)).unwrap();

        let input = [0u8; 16];
        let mut output = [0u8; 16];
        let transfer =
            unsafe { engine.ecb(&input, &mut output, area(0), Direction::Encrypt, None) }
                .unwrap();
        assert_eq!(transfer.current_op(), AesOp::Ecb);
        transfer.wait().unwrap();
        assert_eq!(engine.current_op(), AesOp::None);

        // An engine reset under a running operation leaves the tag behind.
        engine.op = AesOp::Ecb;
        assert_eq!(
            engine.load_key(&AesKey::Key128([1; 16]), area(1)),
            Err(CryptoError::Busy)
        );
        let mut other = [0u8; 16];
        assert_eq!(
            engine.ecb_blocking(&input, &mut other, area(0), Direction::Encrypt),
            Err(CryptoError::Busy)
        );

        engine.clear_current_op();
        engine
            .ecb_blocking(&input, &mut other, area(0), Direction::Encrypt)
            .unwrap();
        assert_eq!(other, AES128_ZERO);
    }

    #[test]
    fn transfer_runs_until_the_result_is_available() {
        let (regs, model) = setup();
        let mut engine = AesEngine::new(&regs);
        engine.load_key(&AesKey::Key128([0; 16]), area(0)).unwrap();

        let mut output = [0u8; 16];
        let transfer =
            unsafe { engine.ecb(&[0; 16], &mut output, area(0), Direction::Encrypt, None) }
                .unwrap();
        model.borrow_mut().result_delay_polls = 1;
        assert!(!transfer.is_complete());
        assert_eq!(transfer.current_op(), AesOp::Ecb);
        assert!(transfer.is_complete());

        model.borrow_mut().result_delay_polls = 3;
        let before = regs.read_count(CTRL_INT_STAT);
        transfer.wait().unwrap();
        // Three polls that see nothing, the one that sees the result, then the collect.
        assert_eq!(regs.read_count(CTRL_INT_STAT) - before, 5);

        assert_eq!(output, AES128_ZERO);
        assert_eq!(engine.current_op(), AesOp::None);
        assert!(!engine.is_in_use());
    }

    #[test]
    fn dropping_a_transfer_collects_it() {
        let (regs, _) = setup();
        let mut engine = AesEngine::new(&regs);
        engine.load_key(&AesKey::Key128([0; 16]), area(0)).unwrap();

        let mut output = [0u8; 16];
        let transfer =
            unsafe { engine.ecb(&[0; 16], &mut output, area(0), Direction::Encrypt, None) }
                .unwrap();
        drop(transfer);

        assert_eq!(engine.current_op(), AesOp::None);
        assert_eq!(regs.peek(CTRL_ALG_SEL), 0);
        assert_eq!(output, AES128_ZERO);
    }
}
