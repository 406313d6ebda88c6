// SPDX-License-Identifier: GPL-3.0-or-later

//! Plain-TCP IRC adapter feeding tracker announces to the listener.
//!
//! The protocol handling in [`session`] is pure; [`client::run`] is the only
//! code touching the socket.

pub mod client;
pub mod message;
pub mod session;

pub use client::{run, IrcError};
pub use message::{strip_formatting, IrcMessage};
pub use session::{Action, AnnounceSession, IrcSettings};
