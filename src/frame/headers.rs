use std::fmt;

use ntex_bytes::Bytes;

/// Category of a header block, as classified by the engine.
///
/// Servers see `Request` for the block that opens a client stream and
/// `Headers` for any later block on the same stream (trailers).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HeadersCategory {
    Request,
    Response,
    PushResponse,
    Headers,
}

/// A single header field.
///
/// Names and values are raw octets, they are not required to be valid
/// text. Cloning is cheap, both parts are reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct Header {
    name: Bytes,
    value: Bytes,
}

impl Header {
    pub fn new<N, V>(name: N, value: V) -> Header
    where
        Bytes: From<N>,
        Bytes: From<V>,
    {
        Header {
            name: Bytes::from(name),
            value: Bytes::from(value),
        }
    }

    pub fn name(&self) -> &Bytes {
        &self.name
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Header")
            .field(&String::from_utf8_lossy(&self.name))
            .field(&String::from_utf8_lossy(&self.value))
            .finish()
    }
}
