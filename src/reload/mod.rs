// src/reload/mod.rs

//! Live reload.
//!
//! - [`notice`] defines the wire message.
//! - [`broadcaster`] is the in-process fan-out tasks publish to.
//! - [`server`] is the dev server: static files plus the WebSocket endpoint
//!   that relays notices to browsers.

pub mod broadcaster;
pub mod notice;
pub mod server;

pub use broadcaster::ReloadBroadcaster;
pub use notice::{ReloadKind, ReloadNotice};
pub use server::{open_browser, DevServer};
