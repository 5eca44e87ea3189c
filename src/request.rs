use std::{fmt, str::FromStr};

use ntex_bytes::{Bytes, BytesMut};
use ntex_http::{uri, Method, Uri};

use crate::frame::{Header, StreamId};

/// Inbound request under assembly.
///
/// Fed by engine callbacks until the peer ends the stream, then sealed into
/// a [`Request`]. Sealing consumes the accumulator, so a request can be
/// handed out only once.
#[derive(Debug)]
pub(crate) struct RequestBuilder {
    id: StreamId,
    headers: Vec<Header>,
    trailers: Vec<Header>,
    body: BytesMut,
    in_trailers: bool,
}

impl RequestBuilder {
    pub(crate) fn new(id: StreamId) -> Self {
        RequestBuilder {
            id,
            headers: Vec::new(),
            trailers: Vec::new(),
            body: BytesMut::new(),
            in_trailers: false,
        }
    }

    /// Following header fields belong to the trailer block
    pub(crate) fn begin_trailers(&mut self) {
        self.in_trailers = true;
    }

    pub(crate) fn push_header(&mut self, name: &[u8], value: &[u8]) {
        let hdr = Header::new(Bytes::copy_from_slice(name), Bytes::copy_from_slice(value));
        if self.in_trailers {
            self.trailers.push(hdr);
        } else {
            self.headers.push(hdr);
        }
    }

    pub(crate) fn extend_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    pub(crate) fn seal(self) -> Request {
        Request {
            id: self.id,
            headers: self.headers,
            trailers: self.trailers,
            body: self.body.freeze(),
        }
    }
}

/// Complete inbound request.
pub struct Request {
    id: StreamId,
    headers: Vec<Header>,
    trailers: Vec<Header>,
    body: Bytes,
}

impl Request {
    /// Stream this request arrived on
    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    /// Header fields in receipt order, pseudo headers included
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Trailer fields, empty if the peer sent none
    pub fn trailers(&self) -> &[Header] {
        &self.trailers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// First value of the header `name`
    pub fn header(&self, name: &[u8]) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|h| &h.name()[..] == name)
            .map(|h| h.value())
    }

    /// All values of the header `name`, in receipt order
    pub fn header_all<'a>(&'a self, name: &'a [u8]) -> impl Iterator<Item = &'a Bytes> + 'a {
        self.headers
            .iter()
            .filter(move |h| &h.name()[..] == name)
            .map(|h| h.value())
    }

    /// Raw `:method` pseudo header
    pub fn method_raw(&self) -> Option<&Bytes> {
        self.header(b":method")
    }

    pub fn scheme(&self) -> Option<&Bytes> {
        self.header(b":scheme")
    }

    pub fn authority(&self) -> Option<&Bytes> {
        self.header(b":authority")
    }

    pub fn path(&self) -> Option<&Bytes> {
        self.header(b":path")
    }

    /// Parsed request method
    pub fn method(&self) -> Option<Method> {
        self.method_raw()
            .and_then(|m| Method::from_bytes(m).ok())
    }

    /// Request uri built from pseudo headers, invalid parts are skipped
    pub fn uri(&self) -> Uri {
        let mut parts = uri::Parts::default();

        // scheme
        if let Some(s) = self.scheme().and_then(|s| std::str::from_utf8(s).ok()) {
            if let Ok(s) = uri::Scheme::from_str(s) {
                parts.scheme = Some(s);
            }
        }

        // authority
        if let Some(s) = self.authority().and_then(|s| std::str::from_utf8(s).ok()) {
            if let Ok(s) = uri::Authority::from_str(s) {
                parts.authority = Some(s);
            }
        }

        // path
        if let Some(s) = self.path().and_then(|s| std::str::from_utf8(s).ok()) {
            if let Ok(s) = uri::PathAndQuery::from_str(s) {
                parts.path_and_query = Some(s);
            }
        }

        Uri::from_parts(parts).unwrap_or_default()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("stream_id", &self.id)
            .field("headers", &self.headers)
            .field("trailers", &self.trailers)
            .field("body", &self.body.len())
            .finish()
    }
}
