//! Disk image pipeline: snapshotting, block copy, splitting, sidecar
//! metadata, and the BitLocker capture gate.

pub mod bitlocker;
pub mod blockcopy;
pub mod metadata;
pub mod snapshot;
pub mod split;
