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

use crate::Node;

use ifrit_identity::Certificate;
use ifrit_node_messages::{ProtocolError, RejectReason, State, StateResponse};
use ifrit_node_tcp::Inbound;

use anyhow::{bail, Result};

#[async_trait]
impl Inbound for Node {
    /// Dispatches an authenticated Spread into the membership protocol.
    async fn spread(&self, caller: Certificate, state: State) -> Result<StateResponse, RejectReason> {
        self.handle_spread(&caller, state).map_err(|error| {
            debug!("Rejected a spread from '{}' - {error}", caller.id());
            match error {
                ProtocolError::NotMyNeighbour => RejectReason::NotYourNeighbour,
                ProtocolError::SelfCertificate
                | ProtocolError::NilCertificate
                | ProtocolError::InvalidCertificate
                | ProtocolError::InvalidId
                | ProtocolError::InvalidSignature => RejectReason::InvalidCertificate,
                _ => RejectReason::ProtocolViolation,
            }
        })
    }

    /// Liveness probes carry no state; answering them is the whole point.
    async fn ping(&self) {}

    /// Hands a direct application payload to the registered handler.
    async fn application(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        let handler = self.msg_handler.read();
        match handler.as_ref() {
            Some(handler) => handler(payload),
            None => bail!("no message handler is registered"),
        }
    }
}
