//! tcx-identity
//!
//! Instrument / account identity for a single trading scope.
//!
//! Responsibilities:
//! - Handle types for instruments and accounts, in live or placeholder form
//! - The identity matcher: do two handles from independent event streams
//!   denote the same real-world instrument/account?
//! - Scope resolution + validation (both handles on one connection)
//!
//! Pure logic. No IO. Handle lookups go through [`HandleDirectory`].

mod handles;
mod matcher;
mod scope;

pub use handles::{
    normalize_tradable_id, AccountHandle, ALTERNATE_ID_ATTRIBUTE, CreationDescriptor, HandleState, InstrumentHandle,
    TRADABLE_ID_SEPARATOR,
};
pub use matcher::{same_account, same_instrument};
pub use scope::{resolve_scope, HandleDirectory, ScopeError, ScopeKey};
