#![allow(dead_code)]
//! Scripted frame engine.
//!
//! Implements just enough of an HTTP/2 engine to drive a session: stream
//! open and close tracking, send windows, deferred DATA, resets and GOAWAY.
//! State is shared, tests keep a clone of the engine to inspect it.
use std::{cell::RefCell, collections::HashMap, collections::VecDeque, rc::Rc};

use ntex_bytes::{Bytes, BytesMut};
use ntex_h2_session::frame::{self, Head, Header, HeadersCategory, Kind, Reason, Setting, StreamId};
use ntex_h2_session::{Callbacks, DataSource, EngineError, FrameEngine, Submit};

mod utils;

pub use self::utils::*;

pub const MAX_FRAME_SIZE: i32 = 16_384;
pub const DEFAULT_WINDOW: i32 = 65_535;

/// Engine error code for failed callbacks
pub const ERR_CALLBACK_FAILURE: i32 = -902;
/// Engine error code for submissions on unknown streams
pub const ERR_INVALID_STREAM: i32 = -501;

/// Work accepted through `Submit`
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Settings(Vec<Setting>),
    Response {
        id: StreamId,
        headers: Vec<Header>,
        body: Option<usize>,
    },
    Headers {
        id: StreamId,
        headers: Vec<Header>,
        end_stream: bool,
    },
    PushPromise {
        id: StreamId,
        promised: StreamId,
    },
    Reset(StreamId, Reason),
    GoAway(Reason),
}

enum Out {
    Frame(Head, Bytes),
    Body(StreamId, DataSource),
}

#[derive(Debug)]
struct MockStream {
    window: i32,
    remote_closed: bool,
    local_closed: bool,
}

pub struct State {
    out: VecDeque<Out>,
    rbuf: BytesMut,
    streams: HashMap<StreamId, MockStream>,
    submitted: Vec<Submitted>,
    sent: Vec<Head>,
    not_sent: Vec<Head>,
    closed: Vec<(StreamId, Reason)>,
    initial_window: i32,
    conn_window: i32,
    recv_limit: Option<usize>,
    always_request: bool,
    next_promised: u32,
    goaway_sent: bool,
    peer_goaway: bool,
    refused_resets: Vec<StreamId>,
}

impl State {
    fn queue_frame(&mut self, kind: Kind, flag: u8, id: StreamId, payload: Bytes) {
        self.out.push_back(Out::Frame(Head::new(kind, flag, id), payload));
    }

    fn allowed(&self, id: StreamId) -> i32 {
        let window = self.streams.get(&id).map(|s| s.window).unwrap_or(0);
        window.min(self.conn_window).min(MAX_FRAME_SIZE)
    }

    fn is_sendable(&self, item: &Out) -> bool {
        match item {
            Out::Frame(..) => true,
            Out::Body(id, src) => src.remaining() == 0 || self.allowed(*id) > 0,
        }
    }

    /// Next frame in queue order, DATA blocked by flow control is skipped
    fn next_frame(&mut self) -> Option<(Head, Bytes)> {
        let idx = self.out.iter().position(|item| self.is_sendable(item))?;

        let (id, chunk, eof) = match &mut self.out[idx] {
            Out::Frame(head, payload) => {
                let frm = (*head, payload.clone());
                self.out.remove(idx);
                return Some(frm);
            }
            Out::Body(id, src) => {
                let id = *id;
                let allowed = self
                    .streams
                    .get(&id)
                    .map(|s| s.window)
                    .unwrap_or(0)
                    .min(self.conn_window)
                    .min(MAX_FRAME_SIZE)
                    .max(0) as usize;
                let (chunk, eof) = src.read(allowed);
                (id, chunk, eof)
            }
        };

        if eof {
            self.out.remove(idx);
        }
        let len = chunk.len() as i32;
        self.conn_window -= len;
        if let Some(stream) = self.streams.get_mut(&id) {
            stream.window -= len;
        }

        let flag = if eof { frame::END_STREAM } else { 0 };
        Some((Head::new(Kind::Data, flag, id), chunk))
    }

    fn drop_stream_output(&mut self, id: StreamId) {
        self.out
            .retain(|item| !matches!(item, Out::Body(sid, _) if *sid == id));
    }
}

#[derive(Clone)]
pub struct MockEngine(Rc<RefCell<State>>);

impl Default for MockEngine {
    fn default() -> Self {
        MockEngine::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine::with_windows(DEFAULT_WINDOW, DEFAULT_WINDOW)
    }

    /// Engine with initial stream window and connection window
    pub fn with_windows(initial: i32, conn: i32) -> Self {
        MockEngine(Rc::new(RefCell::new(State {
            out: VecDeque::new(),
            rbuf: BytesMut::new(),
            streams: HashMap::new(),
            submitted: Vec::new(),
            sent: Vec::new(),
            not_sent: Vec::new(),
            closed: Vec::new(),
            initial_window: initial,
            conn_window: conn,
            recv_limit: None,
            always_request: false,
            next_promised: 2,
            goaway_sent: false,
            peer_goaway: false,
            refused_resets: Vec::new(),
        })))
    }

    /// Consume at most `limit` bytes per `recv` call
    pub fn set_recv_limit(&self, limit: Option<usize>) {
        self.0.borrow_mut().recv_limit = limit;
    }

    /// Report every HEADERS frame as a new request
    pub fn set_always_request(&self, val: bool) {
        self.0.borrow_mut().always_request = val;
    }

    /// Reject RST_STREAM submissions for stream `id`
    pub fn refuse_reset(&self, id: u32) {
        self.0.borrow_mut().refused_resets.push(id.into());
    }

    pub fn set_conn_window(&self, window: i32) {
        self.0.borrow_mut().conn_window = window;
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.0.borrow().submitted.clone()
    }

    /// Resets submitted so far
    pub fn resets(&self) -> Vec<(StreamId, Reason)> {
        self.0
            .borrow()
            .submitted
            .iter()
            .filter_map(|s| match s {
                Submitted::Reset(id, reason) => Some((*id, *reason)),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<Head> {
        self.0.borrow().sent.clone()
    }

    /// Frames sent on stream `id`
    pub fn sent_on(&self, id: u32) -> Vec<Head> {
        self.0
            .borrow()
            .sent
            .iter()
            .filter(|h| h.stream_id() == id)
            .copied()
            .collect()
    }

    pub fn not_sent(&self) -> Vec<Head> {
        self.0.borrow().not_sent.clone()
    }

    /// Closed streams with close reasons
    pub fn closed(&self) -> Vec<(StreamId, Reason)> {
        self.0.borrow().closed.clone()
    }

    pub fn is_open(&self, id: StreamId) -> bool {
        self.0.borrow().streams.contains_key(&id)
    }

    fn record(&self, item: Submitted) {
        self.0.borrow_mut().submitted.push(item);
    }

    fn process(&mut self, frm: frames::Frame, cb: &mut dyn Callbacks) -> Result<(), EngineError> {
        let head = frm.head;
        let id = head.stream_id();

        match head.kind() {
            Kind::Settings => {
                if !head.is_ack() {
                    self.0.borrow_mut().queue_frame(
                        Kind::Settings,
                        frame::ACK,
                        StreamId::zero(),
                        Bytes::new(),
                    );
                }
                cb.on_frame_recv(self, &head, None).map_err(failure)?;
            }
            Kind::Headers => {
                let category = {
                    let mut st = self.0.borrow_mut();
                    if st.always_request || !st.streams.contains_key(&id) {
                        let window = st.initial_window;
                        st.streams.entry(id).or_insert(MockStream {
                            window,
                            remote_closed: false,
                            local_closed: false,
                        });
                        HeadersCategory::Request
                    } else {
                        HeadersCategory::Headers
                    }
                };

                cb.on_begin_headers(self, &head, category).map_err(failure)?;
                for (name, value) in frames::decode_header_block(&frm.payload) {
                    cb.on_header(self, &head, &name, &value).map_err(failure)?;
                }
                cb.on_frame_recv(self, &head, Some(category)).map_err(failure)?;
                if head.is_end_stream() {
                    self.remote_end(id, cb)?;
                }
            }
            Kind::Data => {
                if !frm.payload.is_empty() {
                    cb.on_data_chunk_recv(self, id, &frm.payload)
                        .map_err(failure)?;
                }
                cb.on_frame_recv(self, &head, None).map_err(failure)?;
                if head.is_end_stream() {
                    self.remote_end(id, cb)?;
                }
            }
            Kind::Reset => {
                cb.on_frame_recv(self, &head, None).map_err(failure)?;
                self.close_stream(id, frm.reason(), cb)?;
            }
            Kind::WindowUpdate => {
                let incr = frm.u32_at(0) as i32;
                {
                    let mut st = self.0.borrow_mut();
                    if id.is_zero() {
                        st.conn_window += incr;
                    } else if let Some(stream) = st.streams.get_mut(&id) {
                        stream.window += incr;
                    }
                }
                cb.on_frame_recv(self, &head, None).map_err(failure)?;
            }
            Kind::GoAway => {
                self.0.borrow_mut().peer_goaway = true;
                cb.on_frame_recv(self, &head, None).map_err(failure)?;
            }
            _ => cb.on_frame_recv(self, &head, None).map_err(failure)?,
        }
        Ok(())
    }

    fn remote_end(&mut self, id: StreamId, cb: &mut dyn Callbacks) -> Result<(), EngineError> {
        let done = match self.0.borrow_mut().streams.get_mut(&id) {
            Some(stream) => {
                stream.remote_closed = true;
                stream.local_closed
            }
            None => false,
        };
        if done {
            self.close_stream(id, Reason::NO_ERROR, cb)?;
        }
        Ok(())
    }

    fn local_end(&mut self, id: StreamId, cb: &mut dyn Callbacks) -> Result<(), EngineError> {
        let done = match self.0.borrow_mut().streams.get_mut(&id) {
            Some(stream) => {
                stream.local_closed = true;
                stream.remote_closed
            }
            None => false,
        };
        if done {
            self.close_stream(id, Reason::NO_ERROR, cb)?;
        }
        Ok(())
    }

    fn close_stream(
        &mut self,
        id: StreamId,
        reason: Reason,
        cb: &mut dyn Callbacks,
    ) -> Result<(), EngineError> {
        let removed = {
            let mut st = self.0.borrow_mut();
            let removed = st.streams.remove(&id).is_some();
            if removed {
                st.closed.push((id, reason));
                st.drop_stream_output(id);
            }
            removed
        };
        if removed {
            cb.on_stream_close(self, id, reason).map_err(failure)?;
        }
        Ok(())
    }
}

fn failure(_: ntex_h2_session::CallbackFailure) -> EngineError {
    EngineError::fatal(ERR_CALLBACK_FAILURE, "callback failure")
}

fn header_block(headers: &[Header]) -> BytesMut {
    frames::encode_header_block(headers.iter().map(|h| (&h.name()[..], &h.value()[..])))
}

impl Submit for MockEngine {
    fn submit_settings(&mut self, settings: &[Setting]) -> Result<(), EngineError> {
        let mut payload = BytesMut::new();
        for setting in settings {
            payload.extend_from_slice(&setting.id().to_be_bytes());
            payload.extend_from_slice(&setting.value().to_be_bytes());
        }
        let mut st = self.0.borrow_mut();
        st.submitted.push(Submitted::Settings(settings.to_vec()));
        st.queue_frame(Kind::Settings, 0, StreamId::zero(), payload.freeze());
        Ok(())
    }

    fn submit_response(
        &mut self,
        id: StreamId,
        headers: &[Header],
        body: Option<DataSource>,
    ) -> Result<(), EngineError> {
        let mut st = self.0.borrow_mut();
        if !st.streams.contains_key(&id) {
            return Err(EngineError::new(ERR_INVALID_STREAM, "invalid stream id"));
        }
        st.submitted.push(Submitted::Response {
            id,
            headers: headers.to_vec(),
            body: body.as_ref().map(|b| b.remaining()),
        });

        let flag = if body.is_none() {
            frame::END_HEADERS | frame::END_STREAM
        } else {
            frame::END_HEADERS
        };
        st.queue_frame(Kind::Headers, flag, id, header_block(headers).freeze());
        if let Some(body) = body {
            st.out.push_back(Out::Body(id, body));
        }
        Ok(())
    }

    fn submit_headers(
        &mut self,
        id: StreamId,
        headers: &[Header],
        end_stream: bool,
    ) -> Result<(), EngineError> {
        let mut st = self.0.borrow_mut();
        if !st.streams.contains_key(&id) {
            return Err(EngineError::new(ERR_INVALID_STREAM, "invalid stream id"));
        }
        st.submitted.push(Submitted::Headers {
            id,
            headers: headers.to_vec(),
            end_stream,
        });

        let flag = if end_stream {
            frame::END_HEADERS | frame::END_STREAM
        } else {
            frame::END_HEADERS
        };
        st.queue_frame(Kind::Headers, flag, id, header_block(headers).freeze());
        Ok(())
    }

    fn submit_push_promise(
        &mut self,
        id: StreamId,
        headers: &[Header],
    ) -> Result<StreamId, EngineError> {
        let mut st = self.0.borrow_mut();
        if !st.streams.contains_key(&id) {
            return Err(EngineError::new(ERR_INVALID_STREAM, "invalid stream id"));
        }
        let promised = StreamId::from(st.next_promised);
        st.next_promised += 2;

        let window = st.initial_window;
        st.streams.insert(
            promised,
            MockStream {
                window,
                remote_closed: true,
                local_closed: false,
            },
        );
        st.submitted.push(Submitted::PushPromise { id, promised });

        let mut payload = BytesMut::new();
        payload.extend_from_slice(&u32::from(promised).to_be_bytes());
        payload.extend_from_slice(&header_block(headers));
        st.queue_frame(Kind::PushPromise, frame::END_HEADERS, id, payload.freeze());
        Ok(promised)
    }

    fn submit_rst_stream(&mut self, id: StreamId, reason: Reason) -> Result<(), EngineError> {
        let mut st = self.0.borrow_mut();
        if st.refused_resets.contains(&id) {
            return Err(EngineError::new(ERR_INVALID_STREAM, "invalid stream id"));
        }
        st.submitted.push(Submitted::Reset(id, reason));
        st.queue_frame(
            Kind::Reset,
            0,
            id,
            Bytes::copy_from_slice(&u32::from(reason).to_be_bytes()),
        );
        Ok(())
    }

    fn terminate_session(&mut self, reason: Reason) -> Result<(), EngineError> {
        let mut st = self.0.borrow_mut();
        st.submitted.push(Submitted::GoAway(reason));

        let mut payload = [0; 8];
        payload[4..].copy_from_slice(&u32::from(reason).to_be_bytes());
        st.queue_frame(
            Kind::GoAway,
            0,
            StreamId::zero(),
            Bytes::copy_from_slice(&payload),
        );
        Ok(())
    }

    fn stream_remote_window_size(&self, id: StreamId) -> i32 {
        self.0
            .borrow()
            .streams
            .get(&id)
            .map(|s| s.window)
            .unwrap_or(-1)
    }

    fn remote_window_size(&self) -> i32 {
        self.0.borrow().conn_window
    }

    fn is_stream_remote_closed(&self, id: StreamId) -> bool {
        self.0
            .borrow()
            .streams
            .get(&id)
            .map(|s| s.remote_closed)
            .unwrap_or(true)
    }
}

impl FrameEngine for MockEngine {
    fn recv(&mut self, data: &[u8], cb: &mut dyn Callbacks) -> Result<usize, EngineError> {
        let consumed = {
            let mut st = self.0.borrow_mut();
            let consumed = st
                .recv_limit
                .map(|limit| limit.min(data.len()))
                .unwrap_or(data.len());
            st.rbuf.extend_from_slice(&data[..consumed]);
            consumed
        };

        loop {
            let frm = frames::parse_frame(&mut self.0.borrow_mut().rbuf);
            match frm {
                Some(frm) => self.process(frm, cb)?,
                None => break,
            }
        }
        Ok(consumed)
    }

    fn send(&mut self, dst: &mut BytesMut, cb: &mut dyn Callbacks) -> Result<usize, EngineError> {
        let mut written = 0;

        loop {
            let next = self.0.borrow_mut().next_frame();
            let (head, payload) = match next {
                Some(frm) => frm,
                None => break,
            };
            let id = head.stream_id();

            let stream_gone = !id.is_zero()
                && !matches!(head.kind(), Kind::Reset)
                && !self.is_open(id);
            if stream_gone {
                self.0.borrow_mut().not_sent.push(head);
                let err = EngineError::new(ERR_INVALID_STREAM, "stream closed");
                cb.on_frame_not_send(self, &head, &err).map_err(failure)?;
                continue;
            }

            cb.on_before_frame_send(self, &head).map_err(failure)?;
            frames::write_frame(&head, &payload, dst);
            written += frame::HEADER_LEN + payload.len();
            self.0.borrow_mut().sent.push(head);
            cb.on_frame_send(self, &head).map_err(failure)?;

            match head.kind() {
                Kind::Reset => {
                    let reason = frames::Frame { head, payload }.reason();
                    self.close_stream(id, reason, cb)?;
                }
                Kind::GoAway => self.0.borrow_mut().goaway_sent = true,
                Kind::Data | Kind::Headers if head.is_end_stream() => self.local_end(id, cb)?,
                _ => (),
            }
        }
        Ok(written)
    }

    fn want_read(&self) -> bool {
        let st = self.0.borrow();
        !st.goaway_sent && !st.peer_goaway
    }

    fn want_write(&self) -> bool {
        let st = self.0.borrow();
        st.out.iter().any(|item| st.is_sendable(item))
    }
}
