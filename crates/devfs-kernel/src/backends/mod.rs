//! Collaborator implementations.

pub mod memory;

pub use memory::{MemoryDeviceTree, MemoryVnodeCache};
