//! KEYSTONE Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Everything here is shared by the composition engine and its drivers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;
pub mod kind;
pub mod value;
pub mod version;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::Fingerprint;
pub use id::{HandleId, LogicalName};
pub use kind::{Attribute, ResourceKind};
pub use value::{FieldValue, Reference, ResolvedReference, ResolvedValue};
pub use version::PolicyVersion;
