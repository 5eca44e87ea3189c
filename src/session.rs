use std::{collections::VecDeque, fmt, time::Instant};

use ntex_bytes::{Bytes, BytesMut};
use ntex_http::StatusCode;

use crate::engine::{CallbackResult, Callbacks, DataSource, FrameEngine, Submit};
use crate::error::{CallbackFailure, EngineError, SessionError, StreamError};
use crate::frame::{Head, Header, HeadersCategory, Kind, Reason, StreamId};
use crate::stream::{SendFlags, Stream, StreamState, Streams};
use crate::timer::{TimerId, TimerKind, Timers};
use crate::{config::Config, consts, message::Message, request::Request};

/// HTTP/2 server session.
///
/// Binds one frame engine to the stream tracker and the watchdog timers of
/// a single connection. The session never touches the transport: inbound
/// bytes go to [`Session::feed`], outbound bytes accumulate in the write
/// buffer and are taken with [`Session::take_write_buf`].
pub struct Session<E> {
    engine: Option<E>,
    inner: Inner,
    write_buf: BytesMut,
}

/// Callback side of the session
struct Inner {
    cfg: Config,
    timers: Timers,
    streams: Streams,
    ready: VecDeque<Request>,
    /// Cause of the last failed callback
    failure: Option<SessionError>,
}

impl<E: FrameEngine> Session<E> {
    /// Create session and queue the server SETTINGS frame
    pub fn new(mut engine: E, cfg: Config) -> Result<Self, SessionError> {
        let mut timers = Timers::new();
        timers.add(TimerId::settings(), cfg.settings_delay())?;
        engine.submit_settings(&cfg.settings())?;
        log::debug!("init http session: {cfg:?}");

        Ok(Session {
            engine: Some(engine),
            inner: Inner {
                cfg,
                timers,
                streams: Streams::default(),
                ready: VecDeque::new(),
                failure: None,
            },
            write_buf: BytesMut::new(),
        })
    }

    /// Feed inbound bytes to the engine.
    ///
    /// Frames produced while processing input, like SETTINGS ack or resets,
    /// are flushed into the write buffer.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;

        let consumed = match engine.recv(data, &mut self.inner) {
            Ok(consumed) => consumed,
            Err(err) => return Err(self.inner.failure_or(err)),
        };
        log::trace!("recv {consumed} bytes of http data");

        if consumed < data.len() {
            return Err(SessionError::PartialRecv {
                consumed,
                len: data.len(),
            });
        }
        self.flush()?;
        Ok(consumed)
    }

    /// Pull every pending frame out of the engine.
    ///
    /// Returns `false` if the engine wants neither read nor write anymore,
    /// in that case the session is closed.
    pub fn flush(&mut self) -> Result<bool, SessionError> {
        let engine = match self.engine.as_mut() {
            Some(engine) => engine,
            None => return Ok(false),
        };

        loop {
            match engine.send(&mut self.write_buf, &mut self.inner) {
                Ok(0) => break,
                Ok(n) => log::trace!("send {n} bytes of http data"),
                Err(err) => return Err(self.inner.failure_or(err)),
            }
        }

        if !engine.want_read() && !engine.want_write() {
            log::debug!("frame engine is done, closing session");
            self.close();
            Ok(false)
        } else {
            Ok(true)
        }
    }

    /// Take buffered outbound bytes
    pub fn take_write_buf(&mut self) -> Bytes {
        let len = self.write_buf.len();
        self.write_buf.split_to(len).freeze()
    }

    /// Check if there are outbound bytes to write
    pub fn has_pending_write(&self) -> bool {
        !self.write_buf.is_empty()
    }

    /// Next complete request.
    ///
    /// Every request is returned exactly once.
    pub fn next_request(&mut self) -> Option<Request> {
        self.inner.ready.pop_front()
    }

    /// Submit final response for stream `id`
    pub fn submit_response(&mut self, id: StreamId, msg: Message) -> Result<(), SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;
        let stream = self
            .inner
            .streams
            .get_mut(id)
            .ok_or(StreamError::Unknown(id))?;

        let (headers, body) = msg.into_parts();
        log::debug!(
            "submit response on stream {id}, {} headers, body: {:?}",
            headers.len(),
            body.as_ref().map(|b| b.len())
        );
        engine.submit_response(id, &headers, body.map(DataSource::new))?;
        stream.state = StreamState::ResponseSubmitted;

        self.flush()?;
        Ok(())
    }

    /// Submit non-final (1xx) response, a final one may follow
    pub fn submit_interim(&mut self, id: StreamId, status: StatusCode) -> Result<(), SessionError> {
        if !status.is_informational() {
            return Err(StreamError::InvalidInterimStatus(status).into());
        }
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;
        if !self.inner.streams.contains(id) {
            return Err(StreamError::Unknown(id).into());
        }

        log::debug!("submit interim response {status} on stream {id}");
        let headers = [Header::new(":status", status.as_str().to_owned())];
        engine.submit_headers(id, &headers, false)?;

        self.flush()?;
        Ok(())
    }

    /// Promise a pushed stream associated with stream `id`.
    ///
    /// `msg` carries the synthetic request headers, its body is ignored.
    /// The response for the promised stream is submitted with
    /// [`Session::submit_response`].
    pub fn submit_push_promise(
        &mut self,
        id: StreamId,
        msg: Message,
    ) -> Result<StreamId, SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;
        if !self.inner.streams.contains(id) {
            return Err(StreamError::Unknown(id).into());
        }

        let (headers, body) = msg.into_parts();
        if body.is_some() {
            log::debug!("push promise request body is ignored");
        }
        let promised = engine.submit_push_promise(id, &headers)?;
        log::debug!("push promise on stream {id}, promised stream {promised}");
        self.inner.open_pushed(promised)?;

        self.flush()?;
        Ok(promised)
    }

    /// Reset stream `id`
    pub fn reset_stream(&mut self, id: StreamId, reason: Reason) -> Result<(), SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;
        log::debug!("reset stream {id}: {reason:?}");
        engine.submit_rst_stream(id, reason)?;
        self.flush()?;
        Ok(())
    }

    /// Send GOAWAY, the session closes once it is flushed
    pub fn terminate(&mut self, reason: Reason) -> Result<(), SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;
        log::debug!("terminate with error {reason:?}");
        engine.terminate_session(reason)?;
        self.flush()?;
        Ok(())
    }

    /// Earliest deadline of armed timers
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.is_closed() {
            None
        } else {
            self.inner.timers.next_deadline()
        }
    }

    /// Fire every timer expired at `now`.
    ///
    /// Expired timers are already disarmed, so each one fires even if an
    /// earlier one failed. The first fatal error wins, otherwise the first
    /// error is returned.
    pub fn on_timeout(&mut self, now: Instant) -> Result<(), SessionError> {
        let mut result: Result<(), SessionError> = Ok(());
        for id in self.inner.timers.expired(now) {
            if self.is_closed() {
                break;
            }
            if let Err(err) = self.fire(id) {
                log::debug!("cannot handle timer {id:?}: {err}");
                result = match result {
                    Err(prev) if prev.is_fatal() || !err.is_fatal() => Err(prev),
                    _ => Err(err),
                };
            }
        }
        result
    }

    /// Handle fired timer.
    ///
    /// Stream timers reset their own stream only. Timers removed by an
    /// earlier firing are skipped.
    pub fn fire(&mut self, id: TimerId) -> Result<(), SessionError> {
        let engine = self.engine.as_mut().ok_or(SessionError::Closed)?;
        if !self.inner.timers.contains(id) {
            log::trace!("timer {id:?} is already removed");
            return Ok(());
        }
        self.inner.timers.stop(id)?;

        let (stream_id, kind) = id.decompose();
        match kind {
            TimerKind::Settings => {
                log::warn!("settings timeout");
                engine.terminate_session(Reason::SETTINGS_TIMEOUT)?;
            }
            TimerKind::Recv | TimerKind::Send => {
                let name = if kind == TimerKind::Recv { "recv" } else { "send" };
                log::warn!("{name} timeout on stream {stream_id}, resetting");
                engine.submit_rst_stream(stream_id, consts::TIMEOUT_RESET_REASON)?;
            }
        }

        self.flush()?;
        Ok(())
    }

    /// Check if the engine wants to read or write
    pub fn want_io(&self) -> bool {
        self.engine
            .as_ref()
            .map(|eng| eng.want_read() || eng.want_write())
            .unwrap_or(false)
    }

    /// Tear down engine, timers and streams.
    ///
    /// Buffered outbound bytes are kept so the caller can still write them.
    pub fn close(&mut self) {
        if self.engine.take().is_some() {
            log::debug!(
                "delete http session, {} streams, {} timers",
                self.inner.streams.len(),
                self.inner.timers.len()
            );
        }
        self.inner.timers.clear();
        self.inner.streams.clear();
        self.inner.ready.clear();
        self.inner.failure = None;
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }
}

impl<E> Session<E> {
    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    pub fn timers(&self) -> &Timers {
        &self.inner.timers
    }

    /// Lifecycle state of tracked stream
    pub fn stream_state(&self, id: StreamId) -> Option<StreamState> {
        self.inner.streams.get(id).map(|s| s.state)
    }

    /// Send flags of tracked stream
    pub fn send_flags(&self, id: StreamId) -> Option<SendFlags> {
        self.inner.streams.get(id).map(|s| s.flags)
    }

    /// Number of tracked streams
    pub fn active_streams(&self) -> usize {
        self.inner.streams.len()
    }
}

impl<E> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("closed", &self.engine.is_none())
            .field("streams", &self.inner.streams.len())
            .field("timers", &self.inner.timers.len())
            .field("ready", &self.inner.ready.len())
            .field("write_buf", &self.write_buf.len())
            .finish()
    }
}

impl Inner {
    /// Remember callback error, the engine reports its own error afterwards
    fn fail<T: Into<SessionError>>(&mut self, err: T) -> CallbackFailure {
        let err = err.into();
        log::error!("session callback failed: {err}");
        self.failure = Some(err);
        CallbackFailure
    }

    fn failure_or(&mut self, err: EngineError) -> SessionError {
        self.failure.take().unwrap_or(SessionError::Engine(err))
    }

    fn open_stream(&mut self, id: StreamId) -> Result<(), SessionError> {
        let stream = self.streams.insert(Stream::remote(id))?;
        let (recv, send) = (stream.recv_timer(), stream.send_timer());

        self.timers.add(recv, self.cfg.recv_delay())?;
        self.timers.add(send, self.cfg.send_delay())?;
        self.timers.start(recv)?;
        Ok(())
    }

    fn open_pushed(&mut self, id: StreamId) -> Result<(), SessionError> {
        let stream = self.streams.insert(Stream::pushed(id))?;
        let (recv, send) = (stream.recv_timer(), stream.send_timer());

        self.timers.add(recv, self.cfg.recv_delay())?;
        self.timers.add(send, self.cfg.send_delay())?;
        Ok(())
    }

    fn close_stream(&mut self, id: StreamId) -> Result<(), SessionError> {
        let stream = self.streams.remove(id)?;
        for timer in [stream.recv_timer(), stream.send_timer()] {
            self.timers.stop(timer)?;
            self.timers.remove(timer)?;
        }
        if stream.request.is_some() {
            log::debug!("discard incomplete request on stream {id}");
        }
        Ok(())
    }

    /// More request input arrived
    fn extend_recv(&mut self, id: StreamId) -> Result<(), SessionError> {
        if let Some(stream) = self.streams.get_mut(id) {
            if stream.is_receiving() {
                stream.state = StreamState::Receiving;
                self.timers.restart(stream.recv_timer())?;
            }
        }
        Ok(())
    }

    /// Peer ended its side, hand the request over
    fn complete_request(&mut self, id: StreamId) -> Result<(), SessionError> {
        if let Some(stream) = self.streams.get_mut(id) {
            self.timers.stop(stream.recv_timer())?;
            if let Some(req) = stream.request.take() {
                log::debug!("prepare response for stream {id}");
                stream.state = StreamState::RequestComplete;
                self.ready.push_back(req.seal());
            }
        }
        Ok(())
    }

    /// Watchdog policy for DATA and HEADERS frames leaving the engine.
    ///
    /// Only a submitted final response can have DATA queued behind flow
    /// control, interim headers never block.
    fn frame_sent(&mut self, eng: &mut dyn Submit, head: &Head) -> Result<(), SessionError> {
        let id = head.stream_id();
        let stream = match self.streams.get_mut(id) {
            Some(stream) => stream,
            None => return Ok(()),
        };
        let (recv, send) = (stream.recv_timer(), stream.send_timer());

        if head.is_end_stream() {
            stream.flags.remove(SendFlags::SEND_BLOCKED);
            stream.flags.insert(SendFlags::LOCAL_END);
            self.timers.stop(send)?;

            if !eng.is_stream_remote_closed(id) {
                log::debug!("stream {id} is answered before request end, resetting");
                eng.submit_rst_stream(id, Reason::NO_ERROR)?;
            }
        } else if stream.state == StreamState::ResponseSubmitted
            && (eng.stream_remote_window_size(id) <= 0 || eng.remote_window_size() <= 0)
        {
            log::trace!("stream {id} is blocked by flow control");
            stream.flags.insert(SendFlags::SEND_BLOCKED);
            self.timers.restart_if_started(recv)?;
            self.timers.start(send)?;
        } else {
            stream.flags.remove(SendFlags::SEND_BLOCKED);
            self.timers.restart_if_started(recv)?;
            self.timers.stop(send)?;
        }
        Ok(())
    }
}

impl Callbacks for Inner {
    fn on_begin_headers(
        &mut self,
        _: &mut dyn Submit,
        head: &Head,
        category: HeadersCategory,
    ) -> CallbackResult {
        let id = head.stream_id();
        match category {
            HeadersCategory::Request => {
                log::trace!("begin headers on stream {id}");
                self.open_stream(id).map_err(|e| self.fail(e))
            }
            HeadersCategory::Headers => {
                if let Some(req) = self.streams.get_mut(id).and_then(|s| s.request.as_mut()) {
                    log::trace!("begin trailers on stream {id}");
                    req.begin_trailers();
                }
                Ok(())
            }
            _ => {
                log::trace!("ignore {category:?} headers on stream {id}");
                Ok(())
            }
        }
    }

    fn on_header(
        &mut self,
        _: &mut dyn Submit,
        head: &Head,
        name: &[u8],
        value: &[u8],
    ) -> CallbackResult {
        let id = head.stream_id();
        log::trace!(
            "header on stream {id}: {:?}={:?}",
            String::from_utf8_lossy(name),
            String::from_utf8_lossy(value)
        );

        if let Some(req) = self.streams.get_mut(id).and_then(|s| s.request.as_mut()) {
            req.push_header(name, value);
        }
        Ok(())
    }

    fn on_data_chunk_recv(
        &mut self,
        _: &mut dyn Submit,
        id: StreamId,
        data: &[u8],
    ) -> CallbackResult {
        log::trace!("receive data chunk on stream {id}: {}", data.len());

        if let Some(req) = self.streams.get_mut(id).and_then(|s| s.request.as_mut()) {
            req.extend_body(data);
        }
        self.extend_recv(id).map_err(|e| self.fail(e))
    }

    fn on_frame_recv(
        &mut self,
        _: &mut dyn Submit,
        head: &Head,
        _: Option<HeadersCategory>,
    ) -> CallbackResult {
        let id = head.stream_id();
        log::trace!("recv {:?} frame on stream {id}", head.kind());

        let result = match head.kind() {
            Kind::Settings if head.is_ack() => {
                log::debug!("stop settings timer");
                self.timers.stop(TimerId::settings()).map_err(SessionError::from)
            }
            Kind::Headers | Kind::Data => {
                let receiving = self
                    .streams
                    .get(id)
                    .map(|s| s.is_receiving())
                    .unwrap_or(false);

                if !receiving {
                    Ok(())
                } else if head.is_end_stream() {
                    self.complete_request(id)
                } else {
                    self.extend_recv(id)
                }
            }
            _ => Ok(()),
        };
        result.map_err(|e| self.fail(e))
    }

    fn on_before_frame_send(&mut self, _: &mut dyn Submit, head: &Head) -> CallbackResult {
        log::trace!(
            "send {:?} frame on stream {}, flags: {:#x}",
            head.kind(),
            head.stream_id(),
            head.flag()
        );
        Ok(())
    }

    fn on_frame_send(&mut self, eng: &mut dyn Submit, head: &Head) -> CallbackResult {
        let result = match head.kind() {
            Kind::Settings if !head.is_ack() => {
                log::debug!("start settings timer");
                self.timers.start(TimerId::settings()).map_err(SessionError::from)
            }
            Kind::Data | Kind::Headers => self.frame_sent(eng, head),
            Kind::Reset => {
                log::debug!("stream {} is reset", head.stream_id());
                Ok(())
            }
            _ => Ok(()),
        };
        result.map_err(|e| self.fail(e))
    }

    fn on_frame_not_send(
        &mut self,
        _: &mut dyn Submit,
        head: &Head,
        err: &EngineError,
    ) -> CallbackResult {
        log::debug!(
            "{:?} frame on stream {} is not sent: {err}",
            head.kind(),
            head.stream_id()
        );
        Ok(())
    }

    fn on_stream_close(
        &mut self,
        _: &mut dyn Submit,
        id: StreamId,
        reason: Reason,
    ) -> CallbackResult {
        if !self.streams.contains(id) {
            log::trace!("close untracked stream {id}");
            return Ok(());
        }
        log::debug!("close stream {id}: {reason:?}");
        self.close_stream(id).map_err(|e| self.fail(e))
    }
}
