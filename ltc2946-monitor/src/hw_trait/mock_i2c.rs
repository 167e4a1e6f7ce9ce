//! In-memory I2C bus double used by driver tests.
//!
//! Models a single device with a 256-byte register file that
//! auto-increments across multi-byte transfers. Reads of a register can be
//! scripted ahead of time, either with literal bytes or with a failed
//! acknowledgment, before falling back to the register file. Writes to a
//! register can be scripted to fail the same way.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::i2c::{I2c, I2cError};
use super::Result;

/// One bus operation as observed by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Write { addr: u8, data: Vec<u8> },
    Read { addr: u8, len: usize },
    WriteRead { addr: u8, write: Vec<u8>, len: usize },
    SetFrequency(u32),
}

#[derive(Debug)]
struct MockState {
    registers: [u8; 256],
    scripted: HashMap<u8, VecDeque<Option<Vec<u8>>>>,
    failed_writes: HashMap<u8, usize>,
    failing: bool,
    pointer: u8,
    transactions: Vec<Transaction>,
}

/// Shared-state I2C double; clones observe the same device.
#[derive(Debug, Clone)]
pub struct MockI2c {
    address: u8,
    state: Arc<Mutex<MockState>>,
}

impl MockI2c {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            state: Arc::new(Mutex::new(MockState {
                registers: [0; 256],
                scripted: HashMap::new(),
                failed_writes: HashMap::new(),
                failing: false,
                pointer: 0,
                transactions: Vec::new(),
            })),
        }
    }

    /// Store `bytes` starting at `reg`
    pub fn set_registers(&self, reg: u8, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        for (i, byte) in bytes.iter().enumerate() {
            state.registers[reg.wrapping_add(i as u8) as usize] = *byte;
        }
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.state.lock().unwrap().registers[reg as usize]
    }

    /// Queue responses for reads starting at `reg`. `None` fails the read.
    pub fn script(&self, reg: u8, responses: impl IntoIterator<Item = Option<Vec<u8>>>) {
        let mut state = self.state.lock().unwrap();
        state.scripted.entry(reg).or_default().extend(responses);
    }

    /// Fail the next `count` writes addressed to `reg`, leaving the
    /// register file untouched
    pub fn fail_writes(&self, reg: u8, count: usize) {
        let mut state = self.state.lock().unwrap();
        *state.failed_writes.entry(reg).or_default() += count;
    }

    /// Make every subsequent transaction fail with a NACK
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    /// Number of register reads that started at `reg`
    pub fn reads_of(&self, reg: u8) -> usize {
        self.transactions()
            .iter()
            .filter(|t| matches!(t, Transaction::WriteRead { write, .. } if write.first() == Some(&reg)))
            .count()
    }

    fn check_ack(&self, state: &MockState, addr: u8) -> Result<()> {
        if state.failing || addr != self.address {
            return Err(I2cError::NoAck(addr).into());
        }
        Ok(())
    }

    fn fill_from(state: &mut MockState, addr: u8, reg: u8, buffer: &mut [u8]) -> Result<()> {
        if let Some(response) = state.scripted.get_mut(&reg).and_then(VecDeque::pop_front) {
            let bytes = response.ok_or(I2cError::NoAck(addr))?;
            buffer.fill(0);
            let n = bytes.len().min(buffer.len());
            buffer[..n].copy_from_slice(&bytes[..n]);
            return Ok(());
        }

        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = state.registers[reg.wrapping_add(i as u8) as usize];
        }
        Ok(())
    }
}

#[async_trait]
impl I2c for MockI2c {
    async fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.transactions.push(Transaction::Write {
            addr,
            data: data.to_vec(),
        });
        self.check_ack(&state, addr)?;

        if let Some((&reg, payload)) = data.split_first() {
            if let Some(remaining) = state.failed_writes.get_mut(&reg) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(I2cError::NoAck(addr).into());
                }
            }
            state.pointer = reg;
            for (i, byte) in payload.iter().enumerate() {
                state.registers[reg.wrapping_add(i as u8) as usize] = *byte;
            }
        }
        Ok(())
    }

    async fn read(&mut self, addr: u8, buffer: &mut [u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.transactions.push(Transaction::Read {
            addr,
            len: buffer.len(),
        });
        self.check_ack(&state, addr)?;

        let reg = state.pointer;
        Self::fill_from(&mut state, addr, reg, buffer)
    }

    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.transactions.push(Transaction::WriteRead {
            addr,
            write: write.to_vec(),
            len: read.len(),
        });
        self.check_ack(&state, addr)?;

        let reg = write.first().copied().unwrap_or(state.pointer);
        state.pointer = reg;
        Self::fill_from(&mut state, addr, reg, read)
    }

    async fn set_frequency(&mut self, hz: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.transactions.push(Transaction::SetFrequency(hz));
        if state.failing {
            return Err(I2cError::BusError.into());
        }
        Ok(())
    }
}
