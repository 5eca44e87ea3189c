//! Frame-level vocabulary shared with the frame engine.
//!
//! The session never parses or serializes frames itself, the engine does.
//! These types only describe what the engine reports through the callback
//! contract and what the session submits back.

mod head;
mod headers;
mod reason;
mod settings;
mod stream_id;

pub use self::head::{Head, Kind, ACK, END_HEADERS, END_STREAM};
pub use self::headers::{Header, HeadersCategory};
pub use self::reason::Reason;
pub use self::settings::Setting;
pub use self::stream_id::StreamId;

pub type WindowSize = u32;

/// Length of the fixed frame header
pub const HEADER_LEN: usize = 9;
