//! xdc-dbgp: DBGp debugger protocol client.
//!
//! This crate talks to debugger engines (such as Xdebug) over the DBGp
//! protocol. It handles message framing, command encoding, the session
//! lifecycle, variable tree extraction and text rendering.

pub mod breakpoint;
pub mod client;
pub mod command;
pub mod error;
pub mod path;
pub mod property;
pub mod protocol;
pub mod render;
pub mod response;
pub mod session;
pub mod transport;
pub mod xml;

// Re-export key types for convenience.
pub use breakpoint::{BreakpointEntry, BreakpointStore};
pub use client::DbgpClient;
pub use command::Command;
pub use error::DbgpError;
pub use path::{IdentityMapper, MappingTable, PathMapper};
pub use property::{
    extract_properties, find_variable, ExtractOptions, Property, PropertyFetcher, PropertyMap,
};
pub use protocol::{EngineReason, EngineStatus};
pub use render::{render_breakpoint_summary, render_stack, render_tree, render_tree_text};
pub use response::{BreakMessage, InitPacket, StatusInfo};
pub use session::{DbgpSession, ListenHandle, SessionState};
pub use xml::Element;
