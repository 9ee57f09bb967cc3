// Copyright (C) The Ifrit Authors.
// This file is part of the ifrit library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A decentralized membership and gossip substrate.
//!
//! Every participant maintains a view of all currently-known peers and
//! disseminates application payloads through authenticated point-to-point
//! exchanges with a small set of ring neighbours. [`Client`] is the surface
//! an embedding application uses; the membership protocol underneath runs by
//! itself once started.

#![forbid(unsafe_code)]

#[macro_use]
extern crate tracing;

mod ca;

mod client;
pub use client::*;

mod config;
pub use config::*;

pub use ifrit_identity::{Certificate, Identity, PeerId};
pub use ifrit_node::{GossipHandler, MessageHandler, Node};
pub use ifrit_node_messages as messages;
pub use ifrit_node_tcp::{Inbound, Tcp, Transport};
