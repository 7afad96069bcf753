//! Property-based tests for incremental parsing.
//!
//! Bytes may arrive split at any offset; every decoder in the crate must
//! produce the same result however the input is cut up.

use std::io::Cursor;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use handoff::http::ChunkedDecoder;
use handoff::protocol::{Frame, FrameDecoder, OpCode, apply_mask};
use handoff::{Config, Connection, HttpRequest, HttpResponse, Router};

const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

/// Cut `data` at the given offsets (taken modulo its length).
fn split_points(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    if data.is_empty() {
        return vec![];
    }
    let mut cuts: Vec<usize> = cuts.iter().map(|c| c % data.len()).collect();
    cuts.push(0);
    cuts.push(data.len());
    cuts.sort_unstable();
    cuts.dedup();
    cuts.windows(2).map(|w| data[w[0]..w[1]].to_vec()).collect()
}

/// Reads back its input in the given pieces, one piece per `poll_read`.
struct PieceStream {
    pieces: Vec<Cursor<Vec<u8>>>,
    next: usize,
    written: Arc<Mutex<Vec<u8>>>,
}

impl PieceStream {
    fn new(pieces: Vec<Vec<u8>>) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            pieces: pieces.into_iter().map(Cursor::new).collect(),
            next: 0,
            written: Arc::clone(&written),
        };
        (stream, written)
    }
}

impl AsyncRead for PieceStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = &mut *self;
        while let Some(piece) = this.pieces.get_mut(this.next) {
            let pos = piece.position() as usize;
            let data = piece.get_ref();
            if pos >= data.len() {
                this.next += 1;
                continue;
            }
            let n = (data.len() - pos).min(buf.remaining());
            buf.put_slice(&data[pos..pos + n]);
            piece.set_position((pos + n) as u64);
            break;
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for PieceStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Describes each request in its response body.
struct Describe;

impl Router for Describe {
    async fn handle(&self, request: HttpRequest) -> handoff::Result<HttpResponse> {
        let text = format!(
            "{} {} {}",
            request.method(),
            request.path(),
            String::from_utf8_lossy(request.body())
        );
        Ok(HttpResponse::text(200, text).with_header("date", "Thu, 01 Jan 1970 00:00:00 GMT"))
    }
}

const PIPELINE: &[u8] = b"GET /a HTTP/1.1\r\nHost: x\r\n\r\n\
POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello\
POST /chunks HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2;ext=1\r\nde\r\n0\r\nTrailer: x\r\n\r\n\
GET /b HTTP/1.1\r\nConnection: close\r\n\r\n";

fn serve(pieces: Vec<Vec<u8>>) -> Vec<u8> {
    let (stream, written) = PieceStream::new(pieces);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime
        .block_on(Connection::new(stream, Arc::new(Describe), Arc::new(Config::default())).run())
        .unwrap();
    let out = written.lock().unwrap().clone();
    out
}

fn encode_masked(frame: &Frame) -> Vec<u8> {
    let mut buf = vec![0u8; frame.wire_size(true)];
    frame.write(&mut buf, Some(MASK)).unwrap();
    buf
}

fn data_opcode_strategy() -> impl Strategy<Value = OpCode> {
    prop_oneof![
        Just(OpCode::Text),
        Just(OpCode::Binary),
        Just(OpCode::Continuation),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_connection_output_independent_of_read_splits(
        cuts in prop::collection::vec(any::<usize>(), 0..40)
    ) {
        let whole = serve(vec![PIPELINE.to_vec()]);
        let split = serve(split_points(PIPELINE, &cuts));
        prop_assert_eq!(&split, &whole);

        let text = String::from_utf8_lossy(&whole);
        prop_assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 4);
        prop_assert!(text.contains("POST /chunks abcde"));
    }

    #[test]
    fn test_frame_decoder_independent_of_splits(
        fin in any::<bool>(),
        opcode in data_opcode_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..70_000),
        cuts in prop::collection::vec(any::<usize>(), 0..16)
    ) {
        let frame = Frame::new(fin, opcode, payload);
        let wire = encode_masked(&frame);

        let mut decoder = FrameDecoder::default();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in split_points(&wire, &cuts) {
            buf.extend_from_slice(&piece);
            while let Some(frame) = decoder.decode(&mut buf).unwrap() {
                decoded.push(frame);
            }
        }

        prop_assert_eq!(decoded, vec![frame]);
        prop_assert!(buf.is_empty());
        prop_assert!(decoder.is_idle());
    }

    #[test]
    fn test_mask_is_an_involution(
        data in prop::collection::vec(any::<u8>(), 0..512),
        key in any::<[u8; 4]>()
    ) {
        let mut masked = data.clone();
        apply_mask(&mut masked, key);
        apply_mask(&mut masked, key);
        prop_assert_eq!(masked, data);
    }

    #[test]
    fn test_chunked_decoder_independent_of_splits(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..8),
        cuts in prop::collection::vec(any::<usize>(), 0..24)
    ) {
        let mut wire = Vec::new();
        for chunk in &chunks {
            wire.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            wire.extend_from_slice(chunk);
            wire.extend_from_slice(b"\r\n");
        }
        wire.extend_from_slice(b"0\r\n\r\n");
        wire.extend_from_slice(b"NEXT");
        let expected: Vec<u8> = chunks.concat();

        let mut decoder = ChunkedDecoder::new(8192, None);
        let mut buf = BytesMut::new();
        let mut body: Option<Bytes> = None;
        for piece in split_points(&wire, &cuts) {
            buf.extend_from_slice(&piece);
            if body.is_none() {
                body = decoder.decode(&mut buf).unwrap();
            }
        }

        prop_assert_eq!(body.as_deref(), Some(&expected[..]));
        prop_assert_eq!(&buf[..], b"NEXT");
    }
}
