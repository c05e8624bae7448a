// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Decoder for `application/vnd.amazon.eventstream` response bodies.
//!
//! Each message is framed as
//!
//! ```text
//! total_len: u32 | headers_len: u32 | prelude_crc: u32 | headers | payload | message_crc: u32
//! ```
//!
//! with big-endian integers and CRC-32 checksums. The prelude checksum covers the two
//! lengths, the message checksum covers everything before it.

use std::mem::size_of;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use log::debug;
use serde::Deserialize;

use crate::dispatch::Body;
use crate::{Error, Result};

const PRELUDE_LEN: usize = 3 * size_of::<u32>();
const MESSAGE_CRC_LEN: usize = size_of::<u32>();
const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + MESSAGE_CRC_LEN;

const TYPE_TRUE: u8 = 0;
const TYPE_FALSE: u8 = 1;
const TYPE_BYTE: u8 = 2;
const TYPE_INT16: u8 = 3;
const TYPE_INT32: u8 = 4;
const TYPE_INT64: u8 = 5;
const TYPE_BYTE_ARRAY: u8 = 6;
const TYPE_STRING: u8 = 7;
const TYPE_TIMESTAMP: u8 = 8;
const TYPE_UUID: u8 = 9;

/// Event stream header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Type 0 and 1.
    Bool(bool),
    /// Type 2.
    Byte(i8),
    /// Type 3.
    Int16(i16),
    /// Type 4.
    Int32(i32),
    /// Type 5.
    Int64(i64),
    /// Type 6.
    ByteArray(Bytes),
    /// Type 7.
    String(String),
    /// Type 8, milliseconds since the epoch.
    Timestamp(i64),
    /// Type 9.
    Uuid(u128),
}

/// Event stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: HeaderValue,
}

impl Header {
    /// Create a header.
    pub fn new(name: impl Into<String>, value: HeaderValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Shorthand for a string header.
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, HeaderValue::String(value.into()))
    }

    /// Header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header value.
    pub fn value(&self) -> &HeaderValue {
        &self.value
    }
}

/// One decoded event stream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    headers: Vec<Header>,
    payload: Bytes,
}

#[derive(Deserialize)]
struct PayloadPart {
    bytes: String,
}

impl Message {
    /// Create a message.
    pub fn new(headers: Vec<Header>, payload: impl Into<Bytes>) -> Self {
        Self {
            headers,
            payload: payload.into(),
        }
    }

    /// All headers in wire order.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Raw payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// First header named `name`.
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| &h.value)
    }

    /// First header named `name` if it is a string.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        match self.header(name) {
            Some(HeaderValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The `:event-type` header.
    pub fn event_type(&self) -> Option<&str> {
        self.header_str(":event-type")
    }

    /// The `:message-type` header: `event`, `exception` or `error`.
    pub fn message_type(&self) -> Option<&str> {
        self.header_str(":message-type")
    }

    /// Decode a `{"bytes": "<base64>"}` payload into the chunk it carries.
    pub fn chunk(&self) -> Result<Bytes> {
        let part: PayloadPart = serde_json::from_slice(&self.payload).map_err(|e| {
            Error::encoding("event payload is not a chunk envelope").with_source(e)
        })?;
        let bs = rescope_core::hash::base64_decode(&part.bytes)
            .map_err(|e| Error::encoding("chunk is not valid base64").with_source(e))?;
        Ok(Bytes::from(bs))
    }

    fn into_event(self) -> Result<Self> {
        let err = match self.message_type() {
            Some("exception") => {
                let kind = self.header_str(":exception-type").unwrap_or("exception");
                Some(format!(
                    "{kind}: {}",
                    String::from_utf8_lossy(&self.payload)
                ))
            }
            Some("error") => {
                let code = self.header_str(":error-code").unwrap_or("error");
                let message = self.header_str(":error-message").unwrap_or_default();
                Some(format!("{code}: {message}"))
            }
            _ => None,
        };

        // The HTTP exchange itself succeeded, the failure is inside the stream.
        match err {
            Some(msg) => Err(Error::upstream(http::StatusCode::OK, msg)),
            None => Ok(self),
        }
    }
}

/// Incremental decoder. Feed bytes with [`push`](Self::push) as they arrive.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    buf: BytesMut,
}

impl MessageDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, bs: &[u8]) {
        self.buf.extend_from_slice(bs);
    }

    /// Decode the next complete message, or `None` if more bytes are needed.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        if self.buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let mut prelude = &self.buf[..PRELUDE_LEN];
        let total_len = prelude.get_u32() as usize;
        let headers_len = prelude.get_u32() as usize;
        let prelude_crc = prelude.get_u32();

        let expected = crc32fast::hash(&self.buf[..PRELUDE_LEN - size_of::<u32>()]);
        if expected != prelude_crc {
            return Err(Error::encoding(format!(
                "prelude checksum mismatch: expected {expected:#010x}, got {prelude_crc:#010x}"
            )));
        }
        if total_len < MIN_MESSAGE_LEN || headers_len > total_len - MIN_MESSAGE_LEN {
            return Err(Error::encoding(format!(
                "invalid frame lengths: total {total_len}, headers {headers_len}"
            )));
        }
        if self.buf.len() < total_len {
            return Ok(None);
        }

        let frame = self.buf.split_to(total_len).freeze();
        let crc_offset = total_len - MESSAGE_CRC_LEN;
        let message_crc = (&frame[crc_offset..]).get_u32();
        let expected = crc32fast::hash(&frame[..crc_offset]);
        if expected != message_crc {
            return Err(Error::encoding(format!(
                "message checksum mismatch: expected {expected:#010x}, got {message_crc:#010x}"
            )));
        }

        let mut headers_buf = frame.slice(PRELUDE_LEN..PRELUDE_LEN + headers_len);
        let mut headers = Vec::new();
        while headers_buf.has_remaining() {
            headers.push(read_header(&mut headers_buf)?);
        }
        let payload = frame.slice(PRELUDE_LEN + headers_len..crc_offset);

        Ok(Some(Message { headers, payload }))
    }

    /// Signal end of input. Leftover bytes mean the last frame was cut short.
    pub fn finish(&self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(Error::encoding(format!(
                "stream ended inside a frame, {} bytes left",
                self.buf.len()
            )))
        }
    }
}

fn need(buf: &Bytes, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(Error::encoding(format!("truncated header {what}")));
    }
    Ok(())
}

fn read_header(buf: &mut Bytes) -> Result<Header> {
    need(buf, 1, "name length")?;
    let name_len = buf.get_u8() as usize;
    need(buf, name_len + 1, "name")?;
    let name = String::from_utf8(buf.split_to(name_len).to_vec())
        .map_err(|e| Error::encoding("header name is not valid utf-8").with_source(e))?;

    let value = match buf.get_u8() {
        TYPE_TRUE => HeaderValue::Bool(true),
        TYPE_FALSE => HeaderValue::Bool(false),
        TYPE_BYTE => {
            need(buf, 1, "value")?;
            HeaderValue::Byte(buf.get_i8())
        }
        TYPE_INT16 => {
            need(buf, 2, "value")?;
            HeaderValue::Int16(buf.get_i16())
        }
        TYPE_INT32 => {
            need(buf, 4, "value")?;
            HeaderValue::Int32(buf.get_i32())
        }
        TYPE_INT64 => {
            need(buf, 8, "value")?;
            HeaderValue::Int64(buf.get_i64())
        }
        t @ (TYPE_BYTE_ARRAY | TYPE_STRING) => {
            need(buf, 2, "value length")?;
            let len = buf.get_u16() as usize;
            need(buf, len, "value")?;
            let bs = buf.split_to(len);
            if t == TYPE_STRING {
                HeaderValue::String(String::from_utf8(bs.to_vec()).map_err(|e| {
                    Error::encoding(format!("header {name} is not valid utf-8")).with_source(e)
                })?)
            } else {
                HeaderValue::ByteArray(bs)
            }
        }
        TYPE_TIMESTAMP => {
            need(buf, 8, "value")?;
            HeaderValue::Timestamp(buf.get_i64())
        }
        TYPE_UUID => {
            need(buf, 16, "value")?;
            HeaderValue::Uuid(buf.get_u128())
        }
        t => {
            return Err(Error::encoding(format!(
                "unknown type {t} of header {name}"
            )))
        }
    };

    Ok(Header { name, value })
}

fn write_header(header: &Header, buf: &mut BytesMut) -> Result<()> {
    let name_len = u8::try_from(header.name.len())
        .map_err(|_| Error::encoding(format!("header name {} is too long", header.name)))?;
    buf.put_u8(name_len);
    buf.put_slice(header.name.as_bytes());

    match &header.value {
        HeaderValue::Bool(true) => buf.put_u8(TYPE_TRUE),
        HeaderValue::Bool(false) => buf.put_u8(TYPE_FALSE),
        HeaderValue::Byte(v) => {
            buf.put_u8(TYPE_BYTE);
            buf.put_i8(*v);
        }
        HeaderValue::Int16(v) => {
            buf.put_u8(TYPE_INT16);
            buf.put_i16(*v);
        }
        HeaderValue::Int32(v) => {
            buf.put_u8(TYPE_INT32);
            buf.put_i32(*v);
        }
        HeaderValue::Int64(v) => {
            buf.put_u8(TYPE_INT64);
            buf.put_i64(*v);
        }
        HeaderValue::ByteArray(bs) => {
            buf.put_u8(TYPE_BYTE_ARRAY);
            put_sized(buf, bs, &header.name)?;
        }
        HeaderValue::String(s) => {
            buf.put_u8(TYPE_STRING);
            put_sized(buf, s.as_bytes(), &header.name)?;
        }
        HeaderValue::Timestamp(v) => {
            buf.put_u8(TYPE_TIMESTAMP);
            buf.put_i64(*v);
        }
        HeaderValue::Uuid(v) => {
            buf.put_u8(TYPE_UUID);
            buf.put_u128(*v);
        }
    }
    Ok(())
}

fn put_sized(buf: &mut BytesMut, bs: &[u8], name: &str) -> Result<()> {
    let len = u16::try_from(bs.len())
        .map_err(|_| Error::encoding(format!("value of header {name} is too long")))?;
    buf.put_u16(len);
    buf.put_slice(bs);
    Ok(())
}

/// Encode one message. Local test servers use this to fake streamed responses.
pub fn encode_message(headers: &[Header], payload: &[u8]) -> Result<Bytes> {
    let mut headers_buf = BytesMut::new();
    for header in headers {
        write_header(header, &mut headers_buf)?;
    }

    let total_len = u32::try_from(MIN_MESSAGE_LEN + headers_buf.len() + payload.len())
        .map_err(|_| Error::encoding("message is too long"))?;
    let headers_len = u32::try_from(headers_buf.len())
        .map_err(|_| Error::encoding("headers are too long"))?;

    let mut buf = BytesMut::with_capacity(total_len as usize);
    buf.put_u32(total_len);
    buf.put_u32(headers_len);
    buf.put_u32(crc32fast::hash(&buf[..]));
    buf.put_slice(&headers_buf);
    buf.put_slice(payload);
    buf.put_u32(crc32fast::hash(&buf[..]));

    Ok(buf.freeze())
}

/// Encode a chunk event the way model invocation streams carry them:
/// a `chunk` event whose payload is `{"bytes": "<base64 of chunk>"}`.
pub fn encode_chunk_event(chunk: &[u8]) -> Result<Bytes> {
    let payload = serde_json::json!({ "bytes": rescope_core::hash::base64_encode(chunk) });
    encode_message(
        &[
            Header::string(":event-type", "chunk"),
            Header::string(":content-type", "application/json"),
            Header::string(":message-type", "event"),
        ],
        payload.to_string().as_bytes(),
    )
}

/// Messages decoded from a response body.
///
/// Exception and error messages end the stream with an
/// [`UpstreamError`](crate::ErrorKind::UpstreamError).
pub struct EventStream {
    inner: BoxStream<'static, Result<Message>>,
}

impl EventStream {
    /// Decode `body` lazily as chunks arrive.
    pub fn new(body: Body) -> Self {
        let state = Some((body.into_stream(), MessageDecoder::new()));
        let inner = stream::unfold(state, |state| async move {
            let (mut body, mut decoder) = state?;
            loop {
                match decoder.next_message() {
                    Ok(Some(msg)) => {
                        debug!("decoded event {:?}", msg.event_type());
                        return match msg.into_event() {
                            Ok(msg) => Some((Ok(msg), Some((body, decoder)))),
                            Err(err) => Some((Err(err), None)),
                        };
                    }
                    Ok(None) => {}
                    Err(err) => return Some((Err(err), None)),
                }

                match body.next().await {
                    Some(Ok(chunk)) => decoder.push(&chunk),
                    Some(Err(err)) => return Some((Err(err), None)),
                    None => {
                        return match decoder.finish() {
                            Ok(()) => None,
                            Err(err) => Some((Err(err), None)),
                        }
                    }
                }
            }
        });

        Self {
            inner: inner.boxed(),
        }
    }
}

impl Stream for EventStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    fn sample() -> Message {
        Message::new(
            vec![
                Header::string(":event-type", "chunk"),
                Header::new("flag", HeaderValue::Bool(true)),
                Header::new("off", HeaderValue::Bool(false)),
                Header::new("byte", HeaderValue::Byte(-3)),
                Header::new("short", HeaderValue::Int16(-300)),
                Header::new("int", HeaderValue::Int32(70_000)),
                Header::new("long", HeaderValue::Int64(-5_000_000_000)),
                Header::new(
                    "raw",
                    HeaderValue::ByteArray(Bytes::from_static(b"\x00\xff")),
                ),
                Header::new("at", HeaderValue::Timestamp(1_714_564_800_000)),
                Header::new("id", HeaderValue::Uuid(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef)),
            ],
            Bytes::from_static(b"{\"hello\":1}"),
        )
    }

    fn encode(msg: &Message) -> Bytes {
        encode_message(msg.headers(), msg.payload()).expect("encode must succeed")
    }

    #[test]
    fn test_decode_all_header_types() -> Result<()> {
        let msg = sample();
        let mut decoder = MessageDecoder::new();
        decoder.push(&encode(&msg));

        assert_eq!(decoder.next_message()?, Some(msg));
        assert_eq!(decoder.next_message()?, None);
        decoder.finish()
    }

    #[test]
    fn test_decode_byte_by_byte() -> Result<()> {
        let bs = encode(&sample());
        let mut decoder = MessageDecoder::new();

        for (i, b) in bs.iter().enumerate() {
            assert_eq!(decoder.next_message()?, None, "message ready after {i} bytes");
            decoder.push(&[*b]);
        }
        assert!(decoder.next_message()?.is_some());
        Ok(())
    }

    #[test]
    fn test_decode_rejects_corruption() {
        let mut bs = encode(&sample()).to_vec();
        let last = bs.len() - 1;
        bs[last] ^= 0xff;
        let mut decoder = MessageDecoder::new();
        decoder.push(&bs);
        let err = decoder.next_message().expect_err("message crc must mismatch");
        assert_eq!(err.kind(), ErrorKind::EncodingError);

        let mut bs = encode(&sample()).to_vec();
        bs[1] ^= 0x01;
        let mut decoder = MessageDecoder::new();
        decoder.push(&bs);
        let err = decoder.next_message().expect_err("prelude crc must mismatch");
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn test_finish_with_partial_frame() {
        let bs = encode(&sample());
        let mut decoder = MessageDecoder::new();
        decoder.push(&bs[..bs.len() / 2]);

        assert!(matches!(decoder.next_message(), Ok(None)));
        let err = decoder.finish().expect_err("partial frame must be reported");
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn test_chunk_payload() -> Result<()> {
        let bs = encode_chunk_event(br#"{"type":"message_stop"}"#)?;
        let mut decoder = MessageDecoder::new();
        decoder.push(&bs);
        let msg = decoder.next_message()?.expect("message must be complete");

        assert_eq!(msg.event_type(), Some("chunk"));
        assert_eq!(msg.message_type(), Some("event"));
        assert_eq!(msg.chunk()?, Bytes::from_static(br#"{"type":"message_stop"}"#));
        Ok(())
    }

    #[tokio::test]
    async fn test_event_stream_across_chunk_boundaries() -> Result<()> {
        let mut all = BytesMut::new();
        all.extend_from_slice(&encode_chunk_event(b"one")?);
        all.extend_from_slice(&encode_chunk_event(b"two")?);
        let all = all.freeze();

        // Split inside the prelude and again inside the headers.
        let parts: Vec<Result<Bytes>> = vec![
            Ok(all.slice(..7)),
            Ok(all.slice(7..60)),
            Ok(all.slice(60..)),
        ];
        let body = Body::Streamed(stream::iter(parts).boxed());

        let chunks = EventStream::new(body)
            .and_then(|msg| async move { msg.chunk() })
            .try_collect::<Vec<_>>()
            .await?;
        assert_eq!(
            chunks,
            vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_event_stream_exception() -> Result<()> {
        let mut all = BytesMut::new();
        all.extend_from_slice(&encode_chunk_event(b"one")?);
        all.extend_from_slice(&encode_message(
            &[
                Header::string(":message-type", "exception"),
                Header::string(":exception-type", "throttlingException"),
            ],
            br#"{"message":"slow down"}"#,
        )?);

        let mut events = EventStream::new(Body::Buffered(all.freeze()));
        assert!(events.next().await.transpose()?.is_some());

        let err = events
            .next()
            .await
            .expect("exception must surface")
            .expect_err("exception must be an error");
        assert_eq!(err.kind(), ErrorKind::UpstreamError);
        assert!(err.message().starts_with("throttlingException"));
        assert!(events.next().await.is_none());
        Ok(())
    }
}
