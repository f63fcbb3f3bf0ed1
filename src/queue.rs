//! Queue engine: mount, mutation, and crash recovery.
//!
//! The engine owns the wear-level device and the in-RAM mirror of the
//! on-flash state (`front`, `record_num`, `sequence`). Every mutating
//! operation ends with a header commit to one of the two metadata slots,
//! alternating on the sequence number, so an interrupted commit always
//! leaves the other slot holding the previous committed state.
//!
//! Operations are synchronous and non-reentrant; callers sharing a queue
//! between contexts must serialise access themselves.

use crate::device::WearLevel;
use crate::error::Error;
use crate::header::{Header, HEADER_SIZE};
use crate::layout::RingLayout;

/// Read granularity of the mount-time erased-slot probe.
const PROBE_CHUNK: usize = 32;

/// Mount-time options for a [`FlashQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueConfig {
    /// Record size in bytes; every push and pop moves exactly this many.
    pub record_size: u32,
    /// When full, discard the oldest records instead of failing the push.
    pub overwrite: bool,
    /// Permit state reconstruction when only one header copy is valid.
    pub recover: bool,
}

impl QueueConfig {
    /// Configuration with overwrite and recovery disabled.
    pub fn new(record_size: u32) -> Self {
        Self {
            record_size,
            overwrite: false,
            recover: false,
        }
    }

    /// Sets overwrite-oldest mode.
    pub fn overwrite(mut self, enabled: bool) -> Self {
        self.overwrite = enabled;
        self
    }

    /// Sets single-header recovery mode.
    pub fn recover(mut self, enabled: bool) -> Self {
        self.recover = enabled;
        self
    }
}

/// Persistent FIFO queue of fixed-size records on a wear-levelled flash
/// partition.
///
/// The queue instance is the single owner of the partition; dropping it
/// unmounts implicitly. No flushing is needed because every mutating
/// operation commits synchronously.
pub struct FlashQueue<D: WearLevel> {
    device: D,
    layout: RingLayout,
    front: u32,
    record_num: u32,
    sequence: u32,
    overwrite: bool,
}

impl<D: WearLevel> FlashQueue<D> {
    /// Mounts the queue stored on `device`.
    ///
    /// Reads both header copies and adopts the newer valid one. When
    /// neither is valid — or exactly one is and recovery is disabled —
    /// the queue is re-initialised empty. With [`QueueConfig::recover`]
    /// enabled, a single valid copy is adopted and the ring is probed
    /// for a record whose commit was lost to a crash.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSize`] when the record size is zero, exceeds a
    /// sector, or the partition cannot hold the metadata plus one data
    /// sector; [`Error::Storage`] on device failure (including a failed
    /// initial commit).
    pub fn mount(mut device: D, config: QueueConfig) -> Result<Self, Error<D::Error>> {
        let sector_size = device.sector_size();
        let total_sectors = device.size() / sector_size;
        let layout = RingLayout::new(sector_size, total_sectors, config.record_size)
            .ok_or(Error::InvalidSize)?;

        let copy_a = Self::read_header(&mut device, &layout, 0)?;
        let copy_b = Self::read_header(&mut device, &layout, 1)?;

        let mut queue = FlashQueue {
            device,
            layout,
            front: 0,
            record_num: 0,
            sequence: u32::MAX,
            overwrite: config.overwrite,
        };

        match (copy_a, copy_b) {
            (Some(a), Some(b)) => {
                let newest = if a.newer_than(&b) { a } else { b };
                queue.adopt(newest);
            }
            (Some(only), None) | (None, Some(only)) if config.recover => {
                queue.adopt(only);
                queue.recover_lost_record()?;
            }
            _ => {
                #[cfg(feature = "log")]
                log::debug!("no usable queue header, initialising empty");
                queue.write_header()?;
            }
        }

        Ok(queue)
    }

    /// Appends one record to the back of the queue.
    ///
    /// When the first record of a sector is written, that sector is
    /// erased immediately beforehand; sectors are therefore never
    /// partially rewritten without a full erase.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSize`] when `record.len()` differs from the
    /// configured record size; [`Error::Full`] when the ring is full and
    /// overwrite is disabled; [`Error::Storage`] on device failure.
    pub fn push_back(&mut self, record: &[u8]) -> Result<(), Error<D::Error>> {
        if record.len() != self.layout.record_size as usize {
            return Err(Error::InvalidSize);
        }

        let mut back = self.layout.back(self.front, self.record_num);
        if back.full {
            if !self.overwrite {
                return Err(Error::Full);
            }
            // Discard the whole front sector: flash cannot reclaim a
            // single slot without erasing its sector.
            let discarded = self.layout.slots_from(self.front);
            self.front = self.layout.next_sector_start(self.front);
            self.record_num -= discarded;
            back = self.layout.back(self.front, self.record_num);
            debug_assert!(!back.full);
        }

        let offset = self.layout.data_base() + back.offset;
        if back.offset % self.layout.sector_size == 0 {
            self.device
                .erase_range(offset, self.layout.sector_size)
                .map_err(Error::Storage)?;
        }
        self.device.write(offset, record).map_err(Error::Storage)?;

        self.record_num += 1;
        self.write_header()
    }

    /// Copies the oldest record into `buf` without removing it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidSize`] when `buf.len()` differs from the record
    /// size; [`Error::NotFound`] when the queue is empty;
    /// [`Error::Storage`] on device failure.
    pub fn peek_front(&mut self, buf: &mut [u8]) -> Result<(), Error<D::Error>> {
        if buf.len() != self.layout.record_size as usize {
            return Err(Error::InvalidSize);
        }
        if self.record_num == 0 {
            return Err(Error::NotFound);
        }
        self.device
            .read(self.layout.data_base() + self.front, buf)
            .map_err(Error::Storage)
    }

    /// Removes the oldest record without reading it.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the queue is empty; [`Error::Storage`]
    /// on device failure.
    pub fn delete_front(&mut self) -> Result<(), Error<D::Error>> {
        if self.record_num == 0 {
            return Err(Error::NotFound);
        }
        self.front = self.layout.next_front(self.front);
        self.record_num -= 1;
        self.write_header()
    }

    /// Copies the oldest record into `buf` and removes it.
    ///
    /// When the read succeeds but the removal fails, the record has been
    /// delivered yet stays on flash; it reappears on the next mount.
    pub fn pop_front(&mut self, buf: &mut [u8]) -> Result<(), Error<D::Error>> {
        self.peek_front(buf)?;
        self.delete_front()
    }

    /// Number of records currently stored.
    #[inline]
    pub fn len(&self) -> u32 {
        self.record_num
    }

    /// True when no records are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.record_num == 0
    }

    /// Maximum record count the partition can hold.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.layout.capacity()
    }

    /// Configured record size in bytes.
    #[inline]
    pub fn record_size(&self) -> u32 {
        self.layout.record_size
    }

    /// Ring offset of the oldest record (diagnostic).
    #[inline]
    pub fn front_offset(&self) -> u32 {
        self.front
    }

    /// Unmounts the queue and returns the underlying device.
    pub fn into_device(self) -> D {
        self.device
    }

    fn adopt(&mut self, header: Header) {
        self.front = header.front;
        self.record_num = header.record_num;
        self.sequence = header.sequence;
        #[cfg(feature = "log")]
        log::debug!(
            "mounted queue: front={} records={} sequence={}",
            header.front,
            header.record_num,
            header.sequence
        );
    }

    /// Reads header copy `slot`, treating a decode failure or a header
    /// that does not fit this geometry as absent.
    fn read_header(
        device: &mut D,
        layout: &RingLayout,
        slot: u32,
    ) -> Result<Option<Header>, Error<D::Error>> {
        let mut buf = [0u8; HEADER_SIZE];
        device
            .read(layout.header_offset(slot), &mut buf)
            .map_err(Error::Storage)?;
        Ok(Header::from_bytes(&buf).filter(|h| {
            h.record_num <= layout.capacity() && layout.is_slot_aligned(h.front)
        }))
    }

    /// Single-header repair: a record write whose header commit was lost
    /// leaves non-erased bytes in the slot past the logical end of the
    /// queue. The writer only erases when crossing a sector boundary, so
    /// such bytes can only belong to the last write before the crash.
    ///
    /// Slots at a sector start are not probed: a stale, not-yet-erased
    /// sector is indistinguishable from a half-written one there. A full
    /// ring has no free slot to probe.
    fn recover_lost_record(&mut self) -> Result<(), Error<D::Error>> {
        let back = self.layout.back(self.front, self.record_num);
        if back.full || back.offset % self.layout.sector_size == 0 {
            return Ok(());
        }
        if self.slot_erased(back.offset)? {
            return Ok(());
        }
        #[cfg(feature = "log")]
        log::warn!("recovering uncommitted record at ring offset {}", back.offset);
        self.record_num += 1;
        self.write_header()
    }

    /// True when every byte of the record slot at `ring_offset` reads as
    /// erased flash.
    fn slot_erased(&mut self, ring_offset: u32) -> Result<bool, Error<D::Error>> {
        let mut chunk = [0u8; PROBE_CHUNK];
        let mut offset = self.layout.data_base() + ring_offset;
        let mut remaining = self.layout.record_size;
        while remaining > 0 {
            let step = remaining.min(PROBE_CHUNK as u32);
            let buf = &mut chunk[..step as usize];
            self.device.read(offset, buf).map_err(Error::Storage)?;
            if buf.iter().any(|&b| b != 0xFF) {
                return Ok(false);
            }
            offset += step;
            remaining -= step;
        }
        Ok(true)
    }

    /// Commits the current state to the header slot selected by the new
    /// sequence number. The other slot keeps the previous state through
    /// the erase+write window, so a crash here is always recoverable.
    ///
    /// The sequence increment sticks even when the device fails, so a
    /// retry commits under a fresh sequence number.
    fn write_header(&mut self) -> Result<(), Error<D::Error>> {
        self.sequence = self.sequence.wrapping_add(1);
        let header = Header {
            front: self.front,
            record_num: self.record_num,
            sequence: self.sequence,
        };
        let offset = self.layout.header_offset(self.sequence % 2);
        self.device
            .erase_range(offset, self.layout.header_len())
            .map_err(Error::Storage)?;
        self.device
            .write(offset, &header.to_bytes())
            .map_err(Error::Storage)
    }
}
