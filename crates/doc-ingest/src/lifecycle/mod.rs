//! Document lifecycle coordination

pub mod coordinator;

pub use coordinator::{Dispatch, DocumentCoordinator};
