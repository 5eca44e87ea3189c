//! Contract between the session and the frame engine.
//!
//! The engine owns HTTP/2 framing, HPACK and flow-control windows. It reports
//! protocol events through [`Callbacks`] and accepts work through [`Submit`].
//! Callbacks run synchronously from inside [`FrameEngine::recv`] and
//! [`FrameEngine::send`]; the engine passes itself to every callback as a
//! `&mut dyn Submit`, so a callback may submit new frames before it returns.
use ntex_bytes::{Bytes, BytesMut};

use crate::error::{CallbackFailure, EngineError};
use crate::frame::{Head, Header, HeadersCategory, Reason, Setting, StreamId};

pub type CallbackResult = Result<(), CallbackFailure>;

/// Frame engine operations that are safe to call from inside a callback.
pub trait Submit {
    /// Queue a SETTINGS frame
    fn submit_settings(&mut self, settings: &[Setting]) -> Result<(), EngineError>;

    /// Queue final response headers and optional body.
    ///
    /// Without body the HEADERS frame carries `END_STREAM`, otherwise the
    /// last DATA frame produced from `body` does.
    fn submit_response(
        &mut self,
        id: StreamId,
        headers: &[Header],
        body: Option<DataSource>,
    ) -> Result<(), EngineError>;

    /// Queue a HEADERS frame without body
    fn submit_headers(
        &mut self,
        id: StreamId,
        headers: &[Header],
        end_stream: bool,
    ) -> Result<(), EngineError>;

    /// Queue a PUSH_PROMISE frame on stream `id`, returns promised stream id
    fn submit_push_promise(
        &mut self,
        id: StreamId,
        headers: &[Header],
    ) -> Result<StreamId, EngineError>;

    /// Queue a RST_STREAM frame
    fn submit_rst_stream(&mut self, id: StreamId, reason: Reason) -> Result<(), EngineError>;

    /// Queue GOAWAY, after it is sent the engine wants neither read nor write
    fn terminate_session(&mut self, reason: Reason) -> Result<(), EngineError>;

    /// Stream level send window advertised by the peer
    fn stream_remote_window_size(&self, id: StreamId) -> i32;

    /// Connection level send window advertised by the peer
    fn remote_window_size(&self) -> i32;

    /// Check if the peer has finished sending on stream `id`
    fn is_stream_remote_closed(&self, id: StreamId) -> bool;
}

/// HTTP/2 frame engine
pub trait FrameEngine: Submit {
    /// Process inbound bytes, returns number of consumed bytes
    fn recv(&mut self, data: &[u8], cb: &mut dyn Callbacks) -> Result<usize, EngineError>;

    /// Serialize pending frames into `dst`, returns number of written bytes.
    ///
    /// Zero means nothing is pending.
    fn send(&mut self, dst: &mut BytesMut, cb: &mut dyn Callbacks) -> Result<usize, EngineError>;

    fn want_read(&self) -> bool;

    fn want_write(&self) -> bool;
}

/// Session side of the callback contract.
///
/// Every callback may fail with [`CallbackFailure`], which the engine turns
/// into a connection error. Default implementations accept the event.
#[allow(unused_variables)]
pub trait Callbacks {
    /// First fragment of a header block arrived
    fn on_begin_headers(
        &mut self,
        eng: &mut dyn Submit,
        head: &Head,
        category: HeadersCategory,
    ) -> CallbackResult {
        Ok(())
    }

    /// A single decoded header field
    fn on_header(
        &mut self,
        eng: &mut dyn Submit,
        head: &Head,
        name: &[u8],
        value: &[u8],
    ) -> CallbackResult {
        Ok(())
    }

    /// Chunk of DATA payload, padding already stripped
    fn on_data_chunk_recv(
        &mut self,
        eng: &mut dyn Submit,
        id: StreamId,
        data: &[u8],
    ) -> CallbackResult {
        Ok(())
    }

    /// Frame is fully received; for HEADERS this follows the last header
    /// field, for DATA the last chunk
    fn on_frame_recv(
        &mut self,
        eng: &mut dyn Submit,
        head: &Head,
        category: Option<HeadersCategory>,
    ) -> CallbackResult {
        Ok(())
    }

    /// Frame is about to be serialized
    fn on_before_frame_send(&mut self, eng: &mut dyn Submit, head: &Head) -> CallbackResult {
        Ok(())
    }

    /// Frame is serialized into the output buffer. Flow-control windows
    /// already account for it.
    fn on_frame_send(&mut self, eng: &mut dyn Submit, head: &Head) -> CallbackResult {
        Ok(())
    }

    /// Queued frame was dropped, e.g. because its stream is already closed
    fn on_frame_not_send(
        &mut self,
        eng: &mut dyn Submit,
        head: &Head,
        err: &EngineError,
    ) -> CallbackResult {
        Ok(())
    }

    /// Stream is closed, for any reason
    fn on_stream_close(
        &mut self,
        eng: &mut dyn Submit,
        id: StreamId,
        reason: Reason,
    ) -> CallbackResult {
        Ok(())
    }
}

/// Zero-copy body source.
///
/// Hands out slices of the body until it is drained; the slice that drains
/// it is flagged as end of stream.
#[derive(Debug, Clone)]
pub struct DataSource {
    data: Bytes,
    eof: bool,
}

impl DataSource {
    pub fn new(data: Bytes) -> Self {
        DataSource { data, eof: false }
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read up to `max` bytes, returns the chunk and end-of-stream flag
    pub fn read(&mut self, max: usize) -> (Bytes, bool) {
        let len = std::cmp::min(max, self.data.len());
        let chunk = self.data.split_to(len);
        self.eof = self.data.is_empty();
        (chunk, self.eof)
    }
}
