//! Shared primitives: ids, domain errors, pagination cursors.

pub mod cursor;
pub mod errors;
pub mod id;

pub use cursor::Cursor;
pub use errors::DomainError;
pub use id::EntityId;
