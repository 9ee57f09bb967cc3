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

use ifrit_identity::Certificate;

use anyhow::{Context, Result};

/// Requests a certificate from the external authority: the local self-signed
/// DER goes out as the request body, the issued certificate DER comes back.
/// The returned material still has to pass the usual certificate validation.
pub(crate) async fn certificate_from_ca(ca_addr: &str, request_der: &[u8]) -> Result<Certificate> {
    let url = format!("http://{ca_addr}/certificateRequest");
    let response = reqwest::Client::new()
        .post(&url)
        .body(request_der.to_vec())
        .send()
        .await
        .with_context(|| format!("unable to reach the certificate authority at '{ca_addr}'"))?;
    let bytes = response
        .error_for_status()
        .context("the certificate authority refused the request")?
        .bytes()
        .await?;
    let certificate =
        Certificate::from_der(&bytes).context("the certificate authority returned unusable material")?;
    Ok(certificate)
}
