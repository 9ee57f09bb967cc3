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

/// The configuration of a [`Client`](crate::Client).
#[derive(Clone, Debug)]
pub struct Config {
    /// If `true`, obtain the certificate from the certificate authority at
    /// [`ca_addr`](Self::ca_addr); otherwise self-sign.
    pub ca: bool,
    /// The certificate authority endpoint.
    pub ca_addr: String,
    /// Bootstrap peers to contact on startup; empty means the client operates
    /// alone until someone contacts it.
    pub entry_addrs: Vec<String>,
    /// The ring count declared when self-signing. Authority-issued
    /// certificates carry their own ring count in the certificate extension.
    pub num_rings: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { ca: false, ca_addr: String::new(), entry_addrs: Vec::new(), num_rings: 32 }
    }
}
