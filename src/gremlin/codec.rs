//! GraphSON v2 frame codec.
//!
//! A request frame is a single binary WebSocket message laid out as
//! `[mime length][mime bytes][JSON body]`; a response frame is a single
//! text or binary message holding one standalone JSON object. The
//! WebSocket layer already delimits messages, so the decoder consumes the
//! whole buffer at once.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::GremlinError;
use super::message::{Request, Response};

/// Mime type announced in front of every request body.
pub const MIME_TYPE: &str = "application/vnd.gremlin-v2.0+json";

/// Default cap on a single response frame (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Encoder/decoder for mime-prefixed GraphSON v2 frames.
#[derive(Debug)]
pub struct GraphsonCodec {
    max_frame_size: usize,
}

impl GraphsonCodec {
    /// Codec with the default frame size limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Codec with a custom frame size limit.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for GraphsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Request> for GraphsonCodec {
    type Error = GremlinError;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        dst.reserve(1 + MIME_TYPE.len() + body.len());
        dst.put_u8(MIME_TYPE.len() as u8);
        dst.put_slice(MIME_TYPE.as_bytes());
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for GraphsonCodec {
    type Item = Response;
    type Error = GremlinError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        if src.len() > self.max_frame_size {
            return Err(GremlinError::FrameTooLarge {
                size: src.len(),
                max: self.max_frame_size,
            });
        }
        let frame = src.split();
        let response: Response = serde_json::from_slice(&frame)?;
        Ok(Some(response))
    }
}
