//! Ring layout arithmetic.
//!
//! Pure functions mapping record slots to byte offsets. Everything here is
//! computed from three numbers fixed at mount time: the sector size, the
//! number of data sectors, and the record size. No I/O happens in this
//! module, which keeps the geometry testable without a device.
//!
//! Offsets produced here are relative to the start of the data ring;
//! callers add [`RingLayout::data_base`] before touching the device.

use crate::header::HEADER_SIZE;

/// Geometry of a mounted queue partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RingLayout {
    /// Erase-unit size in bytes (`SEC`).
    pub sector_size: u32,
    /// Sectors in the data ring (`N`), excluding the two header slots.
    pub data_sectors: u32,
    /// Record size in bytes (`R`).
    pub record_size: u32,
    /// Sectors occupied by one header copy (`H`).
    pub header_sectors: u32,
}

/// Where the next record would land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Back {
    /// Ring offset of the next free slot. Meaningless when `full`.
    pub offset: u32,
    /// The ring has wrapped onto the front sector; no slot is free.
    pub full: bool,
}

impl RingLayout {
    /// Computes the layout for a partition of `total_sectors` sectors.
    ///
    /// Returns `None` when the record size is zero or exceeds a sector,
    /// or when the partition cannot hold both header copies plus at
    /// least one data sector.
    pub(crate) fn new(sector_size: u32, total_sectors: u32, record_size: u32) -> Option<RingLayout> {
        if record_size == 0 || record_size > sector_size {
            return None;
        }
        let header_sectors = (HEADER_SIZE as u32).div_ceil(sector_size);
        let reserved = 2 * header_sectors;
        if total_sectors <= reserved {
            return None;
        }
        Some(RingLayout {
            sector_size,
            data_sectors: total_sectors - reserved,
            record_size,
            header_sectors,
        })
    }

    /// Records per sector (`K`). Tail bytes past `K·R` stay unused.
    #[inline]
    pub(crate) fn records_per_sector(&self) -> u32 {
        self.sector_size / self.record_size
    }

    /// Maximum record count (`N·K`).
    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.data_sectors * self.records_per_sector()
    }

    /// Device offset where the data ring begins (`2·H·SEC`).
    #[inline]
    pub(crate) fn data_base(&self) -> u32 {
        2 * self.header_sectors * self.sector_size
    }

    /// Device offset of header copy `slot` (0 or 1).
    #[inline]
    pub(crate) fn header_offset(&self, slot: u32) -> u32 {
        slot * self.header_sectors * self.sector_size
    }

    /// Bytes to erase when rewriting one header copy.
    #[inline]
    pub(crate) fn header_len(&self) -> u32 {
        self.header_sectors * self.sector_size
    }

    /// Slot index of `offset` within its sector.
    #[inline]
    pub(crate) fn slot_index(&self, offset: u32) -> u32 {
        (offset % self.sector_size) / self.record_size
    }

    /// Slots from `offset` to the end of its sector, inclusive of the
    /// slot at `offset` itself.
    #[inline]
    pub(crate) fn slots_from(&self, offset: u32) -> u32 {
        (self.sector_size - offset % self.sector_size) / self.record_size
    }

    /// True when `offset` names a valid record slot start.
    pub(crate) fn is_slot_aligned(&self, offset: u32) -> bool {
        offset < self.data_sectors * self.sector_size
            && (offset % self.sector_size) % self.record_size == 0
            && self.slot_index(offset) < self.records_per_sector()
    }

    /// Ring offset of the first slot of the sector after `offset`'s,
    /// wrapping at the ring boundary.
    #[inline]
    pub(crate) fn next_sector_start(&self, offset: u32) -> u32 {
        ((offset / self.sector_size + 1) % self.data_sectors) * self.sector_size
    }

    /// Front advancement for a delete: move one slot forward while a slot
    /// remains in the current sector, otherwise jump to the next sector's
    /// first slot (writers leave the tail bytes of a sector unused).
    pub(crate) fn next_front(&self, front: u32) -> u32 {
        if self.slot_index(front) + 1 < self.records_per_sector() {
            front + self.record_size
        } else {
            self.next_sector_start(front)
        }
    }

    /// Locates the slot one past the last live record.
    ///
    /// Walks forward from `front`: the slots remaining in the front
    /// sector first, then whole sectors of `K` records. The partially
    /// filled front sector consumes a full ring position, hence the
    /// `+ 1` when crossing out of it. When the walk lands back on the
    /// front sector the ring is full.
    pub(crate) fn back(&self, front: u32, record_num: u32) -> Back {
        let front_room = self.slots_from(front);
        if front_room > record_num {
            return Back {
                offset: front + record_num * self.record_size,
                full: false,
            };
        }
        let remaining = record_num - front_room;
        let full_sectors = remaining / self.records_per_sector();
        let front_sector = front / self.sector_size;
        let back_sector = (front_sector + full_sectors + 1) % self.data_sectors;
        Back {
            offset: back_sector * self.sector_size
                + (remaining % self.records_per_sector()) * self.record_size,
            full: back_sector == front_sector,
        }
    }
}
