// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
//
// sans-io HTTP/2 codec core: HPACK compression, frame
// reader/writer, connection/stream state, and flow control. The byte
// transport, event loop, and HTTP/1.1 upgrade codec are external
// collaborators and are not part of this crate.

#[macro_use] extern crate bitflags;

pub mod codec;
pub mod config;
pub mod connection;
pub mod decompress;
mod error;
pub mod flow_control;
pub mod frame;
pub mod header;
pub mod hpack;
pub mod listener;
pub mod priority_tree;
mod serialize;
pub mod stream;

pub use codec::Codec;
pub use config::Config;
pub use connection::{Connection, Role};
pub use error::{Http2Error, Reason, WebError, WebResult};
pub use frame::{Frame, StreamIdentifier};
pub use header::{HeaderList, HeaderName, HeaderValue};
pub use listener::{Listener, NoopListener};
pub use serialize::Serialize;
pub use stream::{Stream, StreamState};
