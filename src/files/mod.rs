//! Static file lookup under the served root.

pub mod resolver;

pub use resolver::{DiskLookup, EntryKind, Lookup, ResolvedTarget, resolve};
