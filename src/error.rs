//! Queue errors.
//!
//! Infrastructure failures from the flash driver are carried through
//! unchanged in [`Error::Storage`]; the remaining variants are queue-level
//! conditions.

use core::fmt;

/// Errors returned by queue operations.
///
/// Generic over the wear-level device's error type so driver errors
/// propagate to the caller without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error<E> {
    /// The queue is empty; returned by reads and deletes.
    NotFound,

    /// A size constraint was violated: the record size is zero or larger
    /// than a sector, the partition is too small to hold the metadata
    /// plus one data sector, or a caller buffer does not match the
    /// configured record size.
    InvalidSize,

    /// The ring is full and overwrite mode is disabled.
    Full,

    /// Error from the underlying wear-level device.
    Storage(E),
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "queue is empty or has no valid metadata"),
            Self::InvalidSize => write!(f, "record size or partition geometry is invalid"),
            Self::Full => write!(f, "queue is full"),
            Self::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for Error<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_wraps_device_error() {
        let err: Error<&str> = Error::Storage("flash timeout");
        assert_eq!(format!("{}", err), "storage error: flash timeout");
    }

    #[test]
    fn display_queue_conditions() {
        let err: Error<&str> = Error::Full;
        assert!(format!("{}", err).contains("full"));

        let err: Error<&str> = Error::NotFound;
        assert!(format!("{}", err).contains("empty"));
    }
}
