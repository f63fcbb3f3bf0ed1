//! Persistent FIFO record queue for wear-levelled flash.
//!
//! This crate stores a bounded queue of fixed-size records on a flash
//! partition and keeps it consistent across resets and arbitrary power
//! interruption. The only assumption about the underlying storage is the
//! one the wear-levelling layer already contracts: a full-sector write
//! either lands or does not.
//!
//! # Flash layout
//!
//! The partition is treated as `S` sectors of `SEC` bytes. The first two
//! slots hold redundant copies of the queue metadata; the rest form a ring
//! of record sectors:
//!
//! ```text
//! offset 0          ┌──────────────┐
//!                   │ header A     │  H sectors (first 20 bytes used)
//! offset H·SEC      ├──────────────┤
//!                   │ header B     │  H sectors
//! offset 2·H·SEC    ├──────────────┤
//!                   │ data ring    │  N = S − 2·H sectors,
//!                   │  sector 0    │  ⌊SEC/R⌋ records per sector,
//!                   │  sector 1    │  tail bytes stay erased (0xFF)
//!                   │  ...         │
//!                   └──────────────┘
//! ```
//!
//! Records are exactly `R` bytes and never straddle a sector boundary.
//!
//! # Dual-header commit
//!
//! Every mutating operation ends by committing a 20-byte header
//! (`magic`, `front`, `record_num`, `sequence`, CRC-32) to one of the two
//! header slots, alternating on the sequence number. The slot not being
//! written always holds the previous committed state, so a crash at any
//! point inside the erase+write window leaves at least one valid header on
//! flash. On mount the copy with the newer sequence wins; sequence numbers
//! compare with wrap-around, so `0` ranks newer than `0xFFFF_FFFF`.
//!
//! When exactly one copy survives a crash, mounting with recovery enabled
//! additionally probes the slot past the logical end of the queue: a slot
//! that is not in the erased state holds a record whose header commit was
//! lost, and it is folded back into the queue.
//!
//! # Example
//!
//! ```ignore
//! use flashq::{FlashQueue, NorFlashPartition, PartitionConfig, QueueConfig};
//!
//! let flash = esp_storage::FlashStorage::new();
//! let device = NorFlashPartition::new(flash, PartitionConfig::default_4mb());
//!
//! let mut queue = FlashQueue::mount(device, QueueConfig::new(16).recover(true))?;
//! queue.push_back(&[0xAA; 16])?;
//!
//! let mut buf = [0u8; 16];
//! queue.pop_front(&mut buf)?;
//! ```
//!
//! # Features
//!
//! - `defmt`: derive `defmt::Format` on public types
//! - `log`: emit `log` records at mount and recovery decision points

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

mod device;
mod error;
mod header;
mod layout;
mod queue;

pub use device::{
    NorFlashPartition, PartitionConfig, WearLevel, PARTITION_SECTOR_SIZE,
};
pub use error::Error;
pub use queue::{FlashQueue, QueueConfig};
