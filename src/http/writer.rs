//! HTTP response serialization.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::http::response::{Body, HttpResponse};

/// Runs the response's release action when dropped, so it fires on
/// success, on a failed write, and when the write future is cancelled.
struct ReleaseGuard(Option<Box<dyn FnOnce() + Send>>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

/// Current time formatted as an IMF-fixdate.
#[must_use]
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Fill in `date` and `connection: keep-alive` when absent.
pub fn apply_defaults(response: &mut HttpResponse) {
    if !response.headers.contains("date") {
        response.headers.insert("date", http_date());
    }
    if !response.headers.contains("connection") {
        response.headers.insert("connection", "keep-alive");
    }
}

/// Serialize the status line and headers.
#[must_use]
pub fn encode_head(response: &HttpResponse) -> BytesMut {
    let mut buf = BytesMut::with_capacity(256);
    buf.put_slice(b"HTTP/1.1 ");
    buf.put_slice(response.status.to_string().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(response.reason().as_bytes());
    buf.put_slice(b"\r\n");
    for (name, value) in response.headers.iter() {
        buf.put_slice(name.as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");
    buf
}

/// Write `response` to `io`: head, then the body to completion.
///
/// The body is taken out of the response; status and headers stay in place
/// (with defaults applied) so the caller can decide whether to keep the
/// connection open. Never closes the stream.
///
/// # Errors
///
/// Propagates I/O errors from the stream or the body reader. The release
/// action runs regardless.
pub async fn write_response<W: AsyncWrite + Unpin>(
    io: &mut W,
    response: &mut HttpResponse,
) -> Result<()> {
    let _release = ReleaseGuard(response.take_release());

    apply_defaults(response);
    let mut head = encode_head(response);

    match std::mem::take(&mut response.body) {
        Body::Empty => io.write_all(&head).await?,
        Body::Full(bytes) => {
            if bytes.len() <= 4096 {
                head.extend_from_slice(&bytes);
                io.write_all(&head).await?;
            } else {
                io.write_all(&head).await?;
                io.write_all(&bytes).await?;
            }
        }
        Body::Reader(mut reader) => {
            io.write_all(&head).await?;
            tokio::io::copy(&mut reader, io).await?;
        }
    }

    io.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    struct FailingWriter;

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_write_full_body() {
        let mut out = Vec::new();
        let mut resp = HttpResponse::new(200)
            .with_header("content-type", "text/plain")
            .with_header("date", "Thu, 01 Jan 1970 00:00:00 GMT")
            .with_body("ping");
        write_response(&mut out, &mut resp).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "HTTP/1.1 200 OK\r\n\
             content-type: text/plain\r\n\
             date: Thu, 01 Jan 1970 00:00:00 GMT\r\n\
             content-length: 4\r\n\
             connection: keep-alive\r\n\
             \r\n\
             ping"
        );
    }

    #[tokio::test]
    async fn test_defaults_not_overriding() {
        let mut out = Vec::new();
        let mut resp = HttpResponse::new(404).with_header("connection", "close");
        write_response(&mut out, &mut resp).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("connection: close\r\n"));
        assert!(!text.contains("keep-alive"));
        assert!(text.contains("date: "));
        assert!(resp.is_close());
    }

    #[tokio::test]
    async fn test_streamed_body() {
        let mut out = Vec::new();
        let data = vec![b'x'; 10_000];
        let mut resp = HttpResponse::new(200)
            .with_header("content-length", "10000")
            .with_reader(std::io::Cursor::new(data));
        write_response(&mut out, &mut resp).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let (_, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(body.len(), 10_000);
    }

    #[tokio::test]
    async fn test_release_runs_on_success_and_failure() {
        let released = Arc::new(AtomicUsize::new(0));

        let counter = released.clone();
        let mut resp = HttpResponse::new(200)
            .with_body("ok")
            .on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        write_response(&mut Vec::new(), &mut resp).await.unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let counter = released.clone();
        let mut resp = HttpResponse::new(200)
            .with_body("ok")
            .on_release(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let result = write_response(&mut FailingWriter, &mut resp).await;
        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_http_date_format() {
        let date = http_date();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), 29);
    }
}
