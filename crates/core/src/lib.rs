//! yakd core types: the closed set of watched kinds, the resource record and
//! the watch event wire format.

#![forbid(unsafe_code)]

mod event;
mod kind;
mod resource;

pub use event::{decode, DecodeError, ErrorPayload, EventType, WatchEvent, REQUEST_RESTART_ERROR};
pub use kind::{Kind, UnknownKind};
pub use resource::Resource;

/// Resource uid as sent in `metadata.uid`.
pub type Uid = String;

pub mod prelude {
    pub use super::{decode, ErrorPayload, EventType, Kind, Resource, Uid, WatchEvent};
}
