//! jsrt Runtime - message-framed sessions for the debug bridge
//!
//! This crate provides the network plumbing the debug bridge sits on:
//!
//! - **Session**: one WebSocket connection with a queued writer and a read callback
//! - **Listener**: accept loop producing server-side sessions
//! - **Connector**: client-initiated sessions
//!
//! # Architecture
//!
//! ```text
//!        write() ──► FIFO queue ──► writer task ──► socket
//!                                                     │
//!   read callback ◄── reader task ◄───────────────────┘
//! ```
//!
//! Every session runs on the caller's tokio runtime: one reader task and one
//! writer task per connection, plus one accept task per listener.

pub mod connector;
pub mod error;
pub mod listener;
pub mod transport;

pub use connector::connect;
pub use error::{Error, Result};
pub use listener::{SessionListener, listen};
pub use transport::{ReadCallback, Session, SessionRole, SessionState};
