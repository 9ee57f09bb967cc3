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

use crate::Message;

use bytes::{Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// The maximum size of a frame on the wire.
pub const MAXIMUM_MESSAGE_SIZE: usize = 8 * 1024 * 1024; // 8 MiB

/// The codec used to encode and decode [`Message`]s on the wire:
/// bincode payloads inside length-delimited frames.
pub struct MessageCodec {
    codec: LengthDelimitedCodec,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self {
            codec: LengthDelimitedCodec::builder().max_frame_length(MAXIMUM_MESSAGE_SIZE).new_codec(),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = io::Error;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = bincode::serialize(&message)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;
        self.codec.encode(Bytes::from(bytes), dst)
    }
}

impl Decoder for MessageCodec {
    type Error = io::Error;
    type Item = Message;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let frame = match self.codec.decode(src)? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        let message = bincode::deserialize(&frame)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
        Ok(Some(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ping, Pong};

    #[test]
    fn frame_round_trip() {
        let mut codec = MessageCodec::default();
        let mut buffer = BytesMut::new();

        codec.encode(Message::Ping(Ping), &mut buffer).unwrap();
        codec.encode(Message::Pong(Pong), &mut buffer).unwrap();

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(Message::Ping(Ping)));
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(Message::Pong(Pong)));
        assert_eq!(codec.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn partial_frame_is_not_decoded() {
        let mut codec = MessageCodec::default();
        let mut buffer = BytesMut::new();
        codec.encode(Message::Ping(Ping), &mut buffer).unwrap();

        let mut partial = buffer.split_to(buffer.len() - 1);
        // The truncated buffer holds an incomplete frame.
        assert_eq!(codec.decode(&mut partial).unwrap(), None);
    }
}
