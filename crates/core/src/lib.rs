//! # clipflow core
//!
//! Domain types, the role capability, and error definitions shared by every
//! clipflow crate. Nothing in here knows about blueprints, HTTP or the
//! filesystem.
//!
//! ## Design Philosophy
//!
//! Each subsystem depends inward on this crate:
//! - the classifier turns [`RawEntry`] values into [`ContentItem`]s
//! - the blueprint crate names roles by string
//! - the workflow crate resolves those names through a [`RoleRegistry`]
//!   and records [`DispatchError`]s as data instead of raising them

pub mod content;
pub mod error;
pub mod role;

// Re-export key types at crate root for ergonomics
pub use content::{Category, ContentItem, Metadata, RawEntry};
pub use error::{DispatchError, FailureKind, HandlerError, RoleError};
pub use role::{
    FnHandler, Handler, MismatchPolicy, Params, Role, RoleInfo, RoleOutput, RoleRegistry,
    handler_fn,
};
