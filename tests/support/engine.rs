use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bodega::{CacheRequest, CachedResponse, RecordingBody, ResponseCache, ResponseHead};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Fixed wall-clock instant every deterministic test pins its cache to.
pub const NOW_SECS: u64 = 1_700_000_000;

pub fn now() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(NOW_SECS)
}

/// RFC 1123 rendering of `now` shifted by `offset_secs`.
pub fn at(offset_secs: i64) -> String {
    let instant = if offset_secs >= 0 {
        now() + Duration::from_secs(offset_secs as u64)
    } else {
        now() - Duration::from_secs(offset_secs.unsigned_abs())
    };
    bodega::date::format(instant)
}

pub fn get_request(uri: &str) -> CacheRequest {
    CacheRequest::new(Method::GET, uri.parse().expect("test uri"), HeaderMap::new())
}

pub fn request(method: Method, uri: &str, header_pairs: &[(&str, &str)]) -> CacheRequest {
    CacheRequest::new(method, uri.parse().expect("test uri"), header_map(header_pairs))
}

pub fn response(status: u16, header_pairs: &[(&str, &str)]) -> ResponseHead {
    ResponseHead::new(
        StatusCode::from_u16(status).expect("test status"),
        header_map(header_pairs),
    )
}

pub fn header_map(header_pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in header_pairs {
        headers.append(
            HeaderName::from_bytes(name.as_bytes()).expect("test header name"),
            HeaderValue::from_str(value).expect("test header value"),
        );
    }
    headers
}

/// Drive a network exchange the way the engine would: offer the response to
/// the cache, then read the whole body through the recording stream.
/// Returns the bytes the caller saw.
pub async fn exchange(
    cache: &impl ResponseCache,
    request: &CacheRequest,
    response: &ResponseHead,
    body: &[u8],
) -> Vec<u8> {
    let mut consumed = Vec::new();
    match cache.put(request, response) {
        Some(writer) => {
            let mut stream = RecordingBody::new(body, writer);
            stream
                .read_to_end(&mut consumed)
                .await
                .expect("read response body");
        }
        None => consumed.extend_from_slice(body),
    }
    consumed
}

pub async fn read_body(response: &CachedResponse) -> Vec<u8> {
    let mut bytes = Vec::new();
    response
        .body()
        .read_to_end(&mut bytes)
        .await
        .expect("read cached body");
    bytes
}

pub fn warning_values(response: &CachedResponse) -> Vec<String> {
    response
        .headers()
        .get_all(http::header::WARNING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .collect()
}

/// Origin stream that serves a prefix of the payload and then fails, as a
/// connection dropped mid-body does.
pub struct Disconnecting {
    data: Vec<u8>,
    served: usize,
}

impl Disconnecting {
    pub fn after(data: &[u8], served_before_failure: usize) -> Self {
        Self {
            data: data[..served_before_failure].to_vec(),
            served: 0,
        }
    }
}

impl AsyncRead for Disconnecting {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.served >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "origin disconnected",
            )));
        }
        let remaining = &self.data[self.served..];
        let take = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..take]);
        self.served += take;
        Poll::Ready(Ok(()))
    }
}
