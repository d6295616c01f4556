//! Re-readable request body.
//!
//! A hyper body is a stream: once something reads it, it is gone. Logging
//! middleware, interceptors and the handler can all want the bytes, so every
//! request body is wrapped in a [`RequestBodyCache`]. The first read drains
//! the stream into memory; every read after that gets the same bytes.
//!
//! There is no size limit here. Cap body size at the proxy
//! (`client_max_body_size` in nginx).

use std::io::Cursor;
use std::sync::Mutex;

use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;
use tokio::sync::OnceCell;

use crate::error::{BoxError, Error};

type Stream = UnsyncBoxBody<Bytes, BoxError>;

/// Per-request body buffer.
pub struct RequestBodyCache {
    stream: Mutex<Option<Stream>>,
    bytes: OnceCell<Bytes>,
}

impl RequestBodyCache {
    /// Wraps an unread body stream.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self {
            stream: Mutex::new(Some(body.map_err(Into::into).boxed_unsync())),
            bytes: OnceCell::new(),
        }
    }

    /// A cache that is already filled, for bodies that never touched a socket.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            stream: Mutex::new(None),
            bytes: OnceCell::new_with(Some(bytes.into())),
        }
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Returns the full body, buffering it on the first call.
    ///
    /// The returned [`Bytes`] shares the buffer; cloning it is a reference
    /// count bump, not a copy.
    pub async fn bytes(&self) -> Result<Bytes, Error> {
        self.bytes
            .get_or_try_init(|| async {
                // OnceCell runs one initialiser at a time, so the stream is
                // taken at most once per successful fill.
                let stream = self
                    .stream
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .take();
                let stream = stream.ok_or(Error::BodyConsumed)?;
                let collected = stream.collect().await.map_err(Error::Body)?;
                Ok::<_, Error>(collected.to_bytes())
            })
            .await
            .cloned()
    }

    /// An independent reader over the buffered body.
    pub async fn reader(&self) -> Result<Cursor<Bytes>, Error> {
        self.bytes().await.map(Cursor::new)
    }

    /// `true` once the body has been buffered.
    pub fn is_buffered(&self) -> bool {
        self.bytes.initialized()
    }
}

impl Default for RequestBodyCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for RequestBodyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBodyCache")
            .field("buffered", &self.bytes.get().map(Bytes::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use http_body_util::{Full, StreamBody};
    use hyper::body::Frame;

    use super::*;

    #[tokio::test]
    async fn two_reads_see_the_same_bytes() {
        let cache = RequestBodyCache::new(Full::new(Bytes::from_static(b"{\"name\":\"alice\"}")));
        assert!(!cache.is_buffered());

        let first = cache.bytes().await.unwrap();
        let second = cache.bytes().await.unwrap();

        assert!(cache.is_buffered());
        assert_eq!(first, second);
        assert_eq!(&first[..], b"{\"name\":\"alice\"}");
    }

    #[tokio::test]
    async fn readers_have_independent_cursors() {
        let cache = RequestBodyCache::new(Full::new(Bytes::from_static(b"hello world")));

        let mut a = cache.reader().await.unwrap();
        let mut b = cache.reader().await.unwrap();

        let mut head = [0u8; 5];
        a.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"hello");

        let mut all = String::new();
        b.read_to_string(&mut all).unwrap();
        assert_eq!(all, "hello world");
    }

    #[tokio::test]
    async fn multi_frame_stream_is_joined() {
        let frames = futures::stream::iter(vec![
            Ok::<_, std::io::Error>(Frame::data(Bytes::from_static(b"abc"))),
            Ok(Frame::data(Bytes::from_static(b"def"))),
        ]);
        let cache = RequestBodyCache::new(StreamBody::new(frames));
        assert_eq!(&cache.bytes().await.unwrap()[..], b"abcdef");
    }

    #[tokio::test]
    async fn transport_error_surfaces_then_body_is_gone() {
        let frames = futures::stream::iter(vec![
            Ok(Frame::data(Bytes::from_static(b"par"))),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ]);
        let cache = RequestBodyCache::new(StreamBody::new(frames));

        assert!(matches!(cache.bytes().await, Err(Error::Body(_))));
        assert!(matches!(cache.bytes().await, Err(Error::BodyConsumed)));
    }

    #[tokio::test]
    async fn prefilled_cache_needs_no_stream() {
        let cache = RequestBodyCache::from_bytes("ready");
        assert!(cache.is_buffered());
        assert_eq!(&cache.bytes().await.unwrap()[..], b"ready");
        assert!(RequestBodyCache::empty().bytes().await.unwrap().is_empty());
    }
}
