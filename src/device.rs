//! Wear-level device port and NOR flash adapter.
//!
//! The queue engine talks to storage exclusively through the [`WearLevel`]
//! trait: a byte-addressable view of a wear-levelled flash partition with
//! the five operations the engine needs. [`NorFlashPartition`] adapts any
//! `embedded-storage` NOR flash to that surface, so ESP32 internal flash,
//! external SPI flash, or an in-memory fake all plug in the same way.

use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

/// Sector size assumed by [`NorFlashPartition`] (4 KiB erase unit).
pub const PARTITION_SECTOR_SIZE: usize = 4096;

/// Byte-addressable view of a wear-levelled flash region.
///
/// The wear-levelling driver maps logical offsets to physical sectors and
/// spreads erases; this trait captures only what the queue needs from it.
///
/// # Contract
///
/// - `erase_range` offsets and lengths are multiples of [`sector_size`]
///   (`offset` sector-aligned).
/// - `write` targets bytes that are currently in the erased (`0xFF`)
///   state.
/// - A full-sector write is atomic with respect to power loss: it either
///   lands completely or not at all.
///
/// [`sector_size`]: WearLevel::sector_size
pub trait WearLevel {
    /// Error type of the underlying driver.
    type Error;

    /// Total usable size of the region in bytes.
    fn size(&self) -> u32;

    /// Erase-unit size in bytes.
    fn sector_size(&self) -> u32;

    /// Reads `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Erases `len` bytes starting at `offset`; both sector-aligned.
    fn erase_range(&mut self, offset: u32, len: u32) -> Result<(), Self::Error>;

    /// Writes `buf` at `offset`. The target bytes must be erased.
    fn write(&mut self, offset: u32, buf: &[u8]) -> Result<(), Self::Error>;
}

/// Location of a queue partition within a larger flash device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartitionConfig {
    /// Start offset in flash (must be sector-aligned).
    pub start_offset: u32,
    /// Number of 4 KiB sectors in the partition.
    pub sector_count: u32,
}

impl PartitionConfig {
    /// Creates a partition configuration.
    ///
    /// # Panics
    /// Panics if `start_offset` is not 4 KiB aligned or `sector_count`
    /// is zero.
    pub fn new(start_offset: u32, sector_count: u32) -> Self {
        assert!(
            start_offset % PARTITION_SECTOR_SIZE as u32 == 0,
            "start_offset must be 4KB aligned"
        );
        assert!(sector_count > 0, "sector_count must be non-zero");
        Self {
            start_offset,
            sector_count,
        }
    }

    /// Last 256 KiB of a 4 MiB flash (offset 0x3C0000, 64 sectors).
    pub fn default_4mb() -> Self {
        Self::new(0x3C_0000, 64)
    }

    /// Last 1 MiB of a 16 MiB flash (offset 0xF00000, 256 sectors).
    pub fn default_16mb() -> Self {
        Self::new(0xF0_0000, 256)
    }

    /// Total partition size in bytes.
    #[inline]
    pub fn total_size(&self) -> u32 {
        self.sector_count * PARTITION_SECTOR_SIZE as u32
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::default_4mb()
    }
}

/// Adapter exposing an `embedded-storage` NOR flash region as a
/// [`WearLevel`] device.
///
/// The adapter is a pure passthrough: offsets are shifted by the
/// partition's start offset and driver errors propagate unchanged.
pub struct NorFlashPartition<F> {
    flash: F,
    config: PartitionConfig,
}

impl<F> NorFlashPartition<F> {
    /// Gets the partition configuration.
    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Consumes the adapter and returns the underlying flash.
    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: NorFlash> NorFlashPartition<F> {
    /// Wraps `flash`, restricting access to the region named by `config`.
    ///
    /// # Panics
    /// Panics if the flash's erase unit is not 4 KiB or the partition
    /// extends past the flash's capacity.
    pub fn new(flash: F, config: PartitionConfig) -> Self {
        assert!(
            F::ERASE_SIZE == PARTITION_SECTOR_SIZE,
            "flash erase unit must be 4KB"
        );
        assert!(
            config.start_offset as usize + config.total_size() as usize <= flash.capacity(),
            "partition extends past flash capacity"
        );
        Self { flash, config }
    }
}

impl<F: NorFlash + ReadNorFlash> WearLevel for NorFlashPartition<F> {
    type Error = F::Error;

    fn size(&self) -> u32 {
        self.config.total_size()
    }

    fn sector_size(&self) -> u32 {
        PARTITION_SECTOR_SIZE as u32
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.flash.read(self.config.start_offset + offset, buf)
    }

    fn erase_range(&mut self, offset: u32, len: u32) -> Result<(), Self::Error> {
        debug_assert!(offset % self.sector_size() == 0);
        debug_assert!(len % self.sector_size() == 0);
        let from = self.config.start_offset + offset;
        self.flash.erase(from, from + len)
    }

    fn write(&mut self, offset: u32, buf: &[u8]) -> Result<(), Self::Error> {
        self.flash.write(self.config.start_offset + offset, buf)
    }
}
