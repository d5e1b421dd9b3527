//! Length delimited JSON frames exchanged between nodes.
use std::io;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::consensus::message::NodeMessage;

/// Upper bound of a single frame, a block response carries several blocks.
const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub(crate) enum Frame {
    /// Liveness probe, `timestamp` is the sender's clock in milliseconds.
    Ping { timestamp: u64 },
    /// Echoes the timestamp of the ping it answers.
    Pong { timestamp: u64 },
    Node(NodeMessage),
}

pub(crate) struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl FrameCodec {
    pub(crate) fn new() -> Self {
        let inner = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_LENGTH)
            .new_codec();
        Self { inner }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                let frame = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes =
            serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.inner.encode(Bytes::from(bytes), dst)
    }
}
