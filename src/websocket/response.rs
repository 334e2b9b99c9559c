use std::collections::HashMap;

use bytes::Bytes;

use crate::http::response::{ResponseOperation, ResponseStatus, StatusCode};
use crate::websocket::frame::{Opcode, encode_server_frame};

/// A single outbound WebSocket frame, streamed like any other response.
///
/// The frame is encoded up front; the engine then pulls it out in
/// chunks no larger than its content chunk size.
#[derive(Debug)]
pub struct WsResponse {
    frame: Bytes,
    offset: usize,
    headers: HashMap<String, String>,
}

impl WsResponse {
    pub fn new(opcode: Opcode, payload: &[u8]) -> Self {
        Self {
            frame: encode_server_frame(true, opcode, payload),
            offset: 0,
            headers: HashMap::new(),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(Opcode::Text, text.as_bytes())
    }

    pub fn binary(data: &[u8]) -> Self {
        Self::new(Opcode::Binary, data)
    }

    /// Pong carrying the payload of the ping it answers.
    pub fn pong(payload: &[u8]) -> Self {
        Self::new(Opcode::Pong, payload)
    }
}

impl ResponseOperation for WsResponse {
    // Frames are sent raw; headers only exist to satisfy the contract.
    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    fn response_code(&self) -> StatusCode {
        StatusCode::Ok
    }

    fn get_data(&mut self, max_size: usize) -> (ResponseStatus, Bytes) {
        let remaining = self.frame.len() - self.offset;
        if remaining == 0 {
            return (ResponseStatus::EndOfData, Bytes::new());
        }

        let take = remaining.min(max_size);
        let chunk = self.frame.slice(self.offset..self.offset + take);
        self.offset += take;

        if self.offset == self.frame.len() {
            (ResponseStatus::LastData, chunk)
        } else {
            (ResponseStatus::HasMoreData, chunk)
        }
    }

    fn add_header(&mut self, _key: &str, _value: &str) {}

    fn set_header(&mut self, _key: &str, _value: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pong_is_a_single_small_chunk() {
        let mut pong = WsResponse::pong(b"");
        let (status, data) = pong.get_data(512);

        assert_eq!(status, ResponseStatus::LastData);
        assert_eq!(&data[..], &[0x8A, 0x00]);
        assert_eq!(pong.get_data(512).0, ResponseStatus::EndOfData);
    }

    #[test]
    fn large_frame_is_split_across_chunks() {
        let mut resp = WsResponse::binary(&[1u8; 100]);

        let (first, a) = resp.get_data(64);
        let (second, b) = resp.get_data(64);

        assert_eq!(first, ResponseStatus::HasMoreData);
        assert_eq!(second, ResponseStatus::LastData);
        assert_eq!(a.len() + b.len(), 102);
    }
}
