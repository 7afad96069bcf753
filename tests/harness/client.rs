//! Raw TCP client for driving the server byte by byte.

use std::io;
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use handoff::protocol::Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];
pub const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

/// Parsed HTTP response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct TestClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buf: BytesMut::new(),
        })
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await
    }

    /// Read more bytes; `false` on end of stream.
    async fn fill(&mut self) -> io::Result<bool> {
        Ok(self.stream.read_buf(&mut self.buf).await? > 0)
    }

    /// Read one response with a `content-length` (or empty) body.
    pub async fn read_response(&mut self) -> io::Result<Option<RawResponse>> {
        let head_len = loop {
            if let Some(pos) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            if !self.fill().await? {
                return Ok(None);
            }
        };

        let head = self.buf.split_to(head_len);
        let text = String::from_utf8_lossy(&head).into_owned();
        let mut lines = text.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let status = status_line
            .split(' ')
            .nth(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, status_line.to_string()))?;
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();

        let len: usize = headers
            .iter()
            .find(|(n, _)| n == "content-length")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        while self.buf.len() < len {
            if !self.fill().await? {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
        let body = self.buf.split_to(len).to_vec();

        Ok(Some(RawResponse {
            status,
            headers,
            body,
        }))
    }

    pub async fn get(&mut self, path: &str) -> io::Result<Option<RawResponse>> {
        self.send_raw(format!("GET {path} HTTP/1.1\r\nHost: test\r\n\r\n").as_bytes())
            .await?;
        self.read_response().await
    }

    pub fn upgrade_request(key: &str) -> String {
        format!(
            "GET /ws HTTP/1.1\r\nHost: test\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
             Sec-WebSocket-Key: {key}\r\nSec-WebSocket-Version: 13\r\n\r\n"
        )
    }

    /// Perform the opening handshake with the RFC 6455 sample key.
    pub async fn handshake(&mut self) -> io::Result<RawResponse> {
        self.send_raw(Self::upgrade_request(SAMPLE_KEY).as_bytes())
            .await?;
        self.read_response()
            .await?
            .ok_or_else(|| io::ErrorKind::UnexpectedEof.into())
    }

    pub fn masked(frame: &Frame) -> Vec<u8> {
        let mut buf = vec![0u8; frame.wire_size(true)];
        let written = frame.write(&mut buf, Some(MASK)).unwrap();
        buf.truncate(written);
        buf
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.send_raw(&Self::masked(frame)).await
    }

    pub async fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.send_frame(&Frame::text(text.to_string())).await
    }

    /// Read one unmasked server frame as `(first byte, payload)`.
    pub async fn read_frame(&mut self) -> io::Result<Option<(u8, Vec<u8>)>> {
        loop {
            if let Some((byte0, header_len, len)) = self.frame_header() {
                if self.buf.len() >= header_len + len {
                    self.buf.advance(header_len);
                    let payload = self.buf.split_to(len).to_vec();
                    return Ok(Some((byte0, payload)));
                }
            }
            if !self.fill().await? {
                return Ok(None);
            }
        }
    }

    fn frame_header(&self) -> Option<(u8, usize, usize)> {
        let buf = &self.buf[..];
        if buf.len() < 2 {
            return None;
        }
        match buf[1] & 0x7F {
            126 if buf.len() >= 4 => Some((buf[0], 4, usize::from(u16::from_be_bytes([buf[2], buf[3]])))),
            127 if buf.len() >= 10 => {
                let mut len = [0u8; 8];
                len.copy_from_slice(&buf[2..10]);
                Some((buf[0], 10, u64::from_be_bytes(len) as usize))
            }
            126 | 127 => None,
            n => Some((buf[0], 2, usize::from(n))),
        }
    }

    pub async fn recv_text(&mut self) -> io::Result<Option<String>> {
        match self.read_frame().await? {
            Some((0x81, payload)) => Ok(Some(String::from_utf8_lossy(&payload).into_owned())),
            Some((byte0, _)) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected frame {byte0:#x}"),
            )),
            None => Ok(None),
        }
    }

    /// Everything left until the server closes the connection.
    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        while self.fill().await? {}
        Ok(self.buf.split().to_vec())
    }
}
