use ntex_bytes::Bytes;
use ntex_http::{Method, StatusCode};

use crate::{error::MessageError, frame::Header};

/// Outbound header block with optional body.
///
/// Used for responses and for synthetic requests of pushed streams. Header
/// storage is allocated once, at construction, and never grows.
#[derive(Debug)]
pub struct Message {
    headers: Vec<Header>,
    capacity: usize,
    body: Option<Bytes>,
}

impl Message {
    /// Create empty message with room for `capacity` header fields
    pub fn with_capacity(capacity: usize) -> Self {
        Message {
            capacity,
            headers: Vec::with_capacity(capacity),
            body: None,
        }
    }

    /// Response with `:status` set, `capacity` counts the status field too
    pub fn response(status: StatusCode, capacity: usize) -> Result<Self, MessageError> {
        let mut msg = Message::with_capacity(capacity);
        msg.add_header(":status", status.as_str().to_owned())?;
        Ok(msg)
    }

    /// Request for a pushed stream with all four request pseudo headers
    pub fn request(
        method: Method,
        scheme: &str,
        authority: &str,
        path: &str,
        capacity: usize,
    ) -> Result<Self, MessageError> {
        let mut msg = Message::with_capacity(capacity);
        msg.add_header(":method", method.as_str().to_owned())?;
        msg.add_header(":scheme", scheme.to_owned())?;
        msg.add_header(":authority", authority.to_owned())?;
        msg.add_header(":path", path.to_owned())?;
        Ok(msg)
    }

    /// Append header field.
    ///
    /// Fails with `HeaderCapacityExceeded` when the header array is full, the
    /// message keeps the fields added so far and stays usable.
    pub fn add_header<N, V>(&mut self, name: N, value: V) -> Result<&mut Self, MessageError>
    where
        Bytes: From<N>,
        Bytes: From<V>,
    {
        if self.headers.len() >= self.capacity {
            return Err(MessageError::HeaderCapacityExceeded(self.capacity));
        }
        self.headers.push(Header::new(name, value));
        Ok(self)
    }

    /// Set message body, the body is sent without copying
    pub fn set_body<T>(&mut self, body: T) -> &mut Self
    where
        Bytes: From<T>,
    {
        self.body = Some(Bytes::from(body));
        self
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn into_parts(self) -> (Vec<Header>, Option<Bytes>) {
        (self.headers, self.body)
    }
}
