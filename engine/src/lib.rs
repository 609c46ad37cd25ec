//! # Zero-Impact Migration Engine
//!
//! A headless migration engine that captures a technician-selected set
//! of applications, registry state, user profiles, and a full-volume
//! clone from a source Windows machine, transfers them to a destination
//! over a pluggable transport, and replays them there.
//!
//! ## Overview
//!
//! The engine is organized around three tiers of capture/restore
//! strategy (`migrators`), a pluggable transport layer for moving
//! captured state between machines (`transport`), a disk-image pipeline
//! for full-volume clones (`image`), and a profile & settings migrator
//! for everything tied to a specific user rather than an application
//! (`profile`). `coordinator` ties these together into the
//! `MigrationJob` lifecycle a technician actually drives.
//!
//! ## Modules
//!
//! - **model**: Core data structures (jobs, items, manifests, mappings)
//! - **error**: Error types and handling
//! - **fs_ops**: Low-level filesystem operations
//! - **progress**: Progress/status callback traits
//! - **checksums**: Checksum computation and verification
//! - **throttle**: Bandwidth-throttled, cancellable stream copy
//! - **compression**: Compress-then-encrypt sealing for captured data
//! - **collaborators**: Narrow host-OS integration traits
//! - **config**: On-disk engine configuration
//! - **transport**: Pluggable carriers (local, network share, direct TCP) and peer discovery
//! - **image**: Disk snapshot, block copy, splitting, and metadata for full-volume clones
//! - **migrators**: The three tier migrators (package, registry+file, full clone)
//! - **profile**: User-account resolution, path remapping, browser/email capture, settings replay
//! - **coordinator**: Owns the `MigrationJob` lifecycle and dispatches to the above
//! - **agent**: The Agent Transfer Protocol (handshake, manifest, ordered file stream) run standalone by the `agent` binary

pub mod model;
pub mod error;
pub mod fs_ops;
pub mod progress;
pub mod checksums;
pub mod throttle;
pub mod compression;
pub mod collaborators;
#[cfg(test)]
pub mod testutil;
pub mod config;
pub mod transport;
pub mod image;
pub mod migrators;
pub mod profile;
pub mod coordinator;
pub mod agent;

pub use error::EngineError;
pub use progress::{ProgressCallback, StatusCallback};
pub use checksums::{ChecksumAlgorithm, ChecksumValue, compute_file_checksum};
pub use coordinator::MigrationCoordinator;
pub use config::MigrationConfig;
