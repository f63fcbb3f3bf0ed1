//! Shared in-memory wear-level device for the integration tests.
//!
//! `RamFlash` keeps the backing memory behind a shared handle so a test
//! can keep inspecting and fault-injecting the flash while a mounted
//! queue owns a clone of the handle. Power loss is modelled as a byte
//! budget: once the budget runs out, mutations stop mid-operation and
//! fail, leaving whatever prefix already landed — exactly what an
//! interrupted erase or program cycle leaves on real flash.

use std::fmt;
use std::sync::{Arc, Mutex};

use flashq::WearLevel;

/// Error surfaced by [`RamFlash`] mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamFlashError {
    /// The mutation budget ran out mid-operation (simulated power loss).
    PowerCut,
    /// Injected driver fault; no bytes were applied.
    Io,
}

impl fmt::Display for RamFlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerCut => write!(f, "simulated power loss"),
            Self::Io => write!(f, "injected I/O fault"),
        }
    }
}

impl std::error::Error for RamFlashError {}

struct Inner {
    mem: Vec<u8>,
    sector_size: u32,
    /// Remaining mutation budget in bytes; `None` means unlimited.
    budget: Option<u64>,
    fail_mutations: bool,
}

impl Inner {
    /// Charges one mutated byte against the budget.
    fn charge(&mut self) -> Result<(), RamFlashError> {
        match &mut self.budget {
            None => Ok(()),
            Some(0) => Err(RamFlashError::PowerCut),
            Some(budget) => {
                *budget -= 1;
                Ok(())
            }
        }
    }
}

/// In-memory flash with power-loss and fault injection.
#[derive(Clone)]
pub struct RamFlash {
    inner: Arc<Mutex<Inner>>,
}

impl RamFlash {
    /// Creates a factory-erased (all `0xFF`) flash region.
    pub fn new(sector_size: u32, sector_count: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                mem: vec![0xFF; (sector_size * sector_count) as usize],
                sector_size,
                budget: None,
                fail_mutations: false,
            })),
        }
    }

    /// Limits further mutations to `bytes` applied bytes; `None` lifts
    /// the limit (power restored).
    pub fn set_budget(&self, bytes: Option<u64>) {
        self.inner.lock().unwrap().budget = bytes;
    }

    /// Makes every subsequent mutation fail without touching the memory.
    #[allow(dead_code)]
    pub fn fail_mutations(&self, on: bool) {
        self.inner.lock().unwrap().fail_mutations = on;
    }

    /// Snapshot of the backing memory.
    #[allow(dead_code)]
    pub fn mem(&self) -> Vec<u8> {
        self.inner.lock().unwrap().mem.clone()
    }

    /// Flips every bit of the byte at `offset` (targeted corruption).
    #[allow(dead_code)]
    pub fn corrupt(&self, offset: usize) {
        self.inner.lock().unwrap().mem[offset] ^= 0xFF;
    }
}

impl WearLevel for RamFlash {
    type Error = RamFlashError;

    fn size(&self) -> u32 {
        self.inner.lock().unwrap().mem.len() as u32
    }

    fn sector_size(&self) -> u32 {
        self.inner.lock().unwrap().sector_size
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let inner = self.inner.lock().unwrap();
        let at = offset as usize;
        assert!(at + buf.len() <= inner.mem.len(), "read out of bounds");
        buf.copy_from_slice(&inner.mem[at..at + buf.len()]);
        Ok(())
    }

    fn erase_range(&mut self, offset: u32, len: u32) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(offset % inner.sector_size, 0, "unaligned erase offset");
        assert_eq!(len % inner.sector_size, 0, "unaligned erase length");
        assert!((offset + len) as usize <= inner.mem.len(), "erase out of bounds");
        if inner.fail_mutations {
            return Err(RamFlashError::Io);
        }
        for i in offset..offset + len {
            inner.charge()?;
            inner.mem[i as usize] = 0xFF;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, buf: &[u8]) -> Result<(), Self::Error> {
        let mut inner = self.inner.lock().unwrap();
        let at = offset as usize;
        assert!(at + buf.len() <= inner.mem.len(), "write out of bounds");
        if inner.fail_mutations {
            return Err(RamFlashError::Io);
        }
        for (i, &byte) in buf.iter().enumerate() {
            inner.charge()?;
            inner.mem[at + i] = byte;
        }
        Ok(())
    }
}
