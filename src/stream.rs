use std::fmt;

use fxhash::FxHashMap;

use crate::error::StreamError;
use crate::frame::StreamId;
use crate::request::RequestBuilder;
use crate::timer::{TimerId, TimerKind};

/// Main axis of the stream lifecycle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StreamState {
    /// Request headers are being received
    Opening,
    /// Request headers are complete, more input is expected
    Receiving,
    /// Peer ended its side, request is handed to the application
    RequestComplete,
    /// Final response is handed to the engine, its DATA frames may still
    /// wait for flow-control window. The state does not wait for the last
    /// frame to leave: the stream is closed and dropped from the tracker
    /// right after it.
    ResponseSubmitted,
    /// Only seen on the record returned by the tracker on removal
    Closed,
}

bitflags::bitflags! {
    /// Send side flags, orthogonal to `StreamState`
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SendFlags: u8 {
        /// Last send found a flow-control window exhausted
        const SEND_BLOCKED = 0b0000_0001;
        /// Frame with `END_STREAM` is sent
        const LOCAL_END    = 0b0000_0010;
    }
}

/// Per-stream bookkeeping
pub(crate) struct Stream {
    pub(crate) id: StreamId,
    pub(crate) state: StreamState,
    pub(crate) flags: SendFlags,
    /// Inbound request, present until sealed
    pub(crate) request: Option<RequestBuilder>,
}

impl Stream {
    /// Stream opened by a peer request
    pub(crate) fn remote(id: StreamId) -> Self {
        Stream {
            id,
            state: StreamState::Opening,
            flags: SendFlags::empty(),
            request: Some(RequestBuilder::new(id)),
        }
    }

    /// Stream reserved by a push promise, there is no inbound request
    pub(crate) fn pushed(id: StreamId) -> Self {
        Stream {
            id,
            state: StreamState::RequestComplete,
            flags: SendFlags::empty(),
            request: None,
        }
    }

    pub(crate) fn recv_timer(&self) -> TimerId {
        TimerId::new(self.id, TimerKind::Recv)
    }

    pub(crate) fn send_timer(&self) -> TimerId {
        TimerId::new(self.id, TimerKind::Send)
    }

    /// Check if the peer is still expected to send
    pub(crate) fn is_receiving(&self) -> bool {
        matches!(self.state, StreamState::Opening | StreamState::Receiving)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("stream_id", &self.id)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("request", &self.request.is_some())
            .finish()
    }
}

/// Stream tracker, keyed by stream id
#[derive(Debug, Default)]
pub(crate) struct Streams {
    streams: FxHashMap<StreamId, Stream>,
}

impl Streams {
    pub(crate) fn insert(&mut self, stream: Stream) -> Result<&mut Stream, StreamError> {
        let id = stream.id;
        if self.streams.contains_key(&id) {
            return Err(StreamError::Duplicate(id));
        }
        Ok(self.streams.entry(id).or_insert(stream))
    }

    pub(crate) fn get(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    pub(crate) fn contains(&self, id: StreamId) -> bool {
        self.streams.contains_key(&id)
    }

    pub(crate) fn remove(&mut self, id: StreamId) -> Result<Stream, StreamError> {
        self.streams.remove(&id).ok_or(StreamError::Unknown(id)).map(|mut stream| {
            stream.state = StreamState::Closed;
            stream
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.streams.len()
    }

    pub(crate) fn clear(&mut self) {
        self.streams.clear();
    }
}
