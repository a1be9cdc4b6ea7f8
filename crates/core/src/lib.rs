// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! tw-core: Shared types for the tidewire realtime client
//!
//! This crate provides the wire protocol, transport envelope, path and query
//! identity types used by the persistent connection in `tw-conn` and by the
//! `tw` command line client.

pub mod clock;
pub mod error;
pub mod frame;
pub mod path;
pub mod protocol;
pub mod query;
pub mod token;

pub use clock::{ClockSource, SystemClock};
pub use error::{Error, Result};
pub use frame::{Control, Envelope, Hello, PROTOCOL_VERSION};
pub use path::Path;
pub use protocol::{Action, Push, Request, RequestId, Response, ServerMessage, Status};
pub use query::{Bound, Index, Query, QueryId, QueryParams, ViewFrom};
