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

#![forbid(unsafe_code)]

mod accusation;
pub use accusation::*;

mod challenge;
pub use challenge::*;

mod codec;
pub use codec::*;

mod error;
pub use error::*;

mod note;
pub use note::*;

mod state;
pub use state::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// An authenticated liveness probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping;

/// The answer to a [`Ping`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong;

/// The reason a request was rejected by the remote side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The caller is not one of the receiver's ring neighbours.
    NotYourNeighbour,
    /// The caller's certificate failed validation.
    InvalidCertificate,
    /// The request violated the protocol.
    ProtocolViolation,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotYourNeighbour => write!(f, "caller is not a ring neighbour"),
            Self::InvalidCertificate => write!(f, "invalid certificate"),
            Self::ProtocolViolation => write!(f, "protocol violation"),
        }
    }
}

/// A message on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    ChallengeRequest(ChallengeRequest),
    ChallengeResponse(ChallengeResponse),
    Spread(Box<State>),
    SpreadResponse(Box<StateResponse>),
    Ping(Ping),
    Pong(Pong),
    Application(Vec<u8>),
    ApplicationResponse(Vec<u8>),
    Reject(RejectReason),
}

impl Message {
    /// The version of the message protocol.
    pub const VERSION: u32 = 1;

    /// Returns the message name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChallengeRequest(..) => "ChallengeRequest",
            Self::ChallengeResponse(..) => "ChallengeResponse",
            Self::Spread(..) => "Spread",
            Self::SpreadResponse(..) => "SpreadResponse",
            Self::Ping(..) => "Ping",
            Self::Pong(..) => "Pong",
            Self::Application(..) => "Application",
            Self::ApplicationResponse(..) => "ApplicationResponse",
            Self::Reject(..) => "Reject",
        }
    }
}
