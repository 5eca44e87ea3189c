use std::{fmt, future::pending, io, time::Instant};

use ntex_codec::BytesCodec;
use ntex_io::{Filter, Io};
use ntex_service::{Pipeline, Service};
use ntex_util::channel::mpsc;
use ntex_util::future::{select, Either};
use ntex_util::time::{sleep, Millis};

use crate::frame::{Reason, StreamId};
use crate::{engine::FrameEngine, error::SessionError, message::Message, request::Request};
use crate::session::Session;

use super::ServerError;

type Outcome<E> = (StreamId, Result<Message, E>);

/// Drive session over `io` until the session is closed.
///
/// Inbound bytes, handler results and timer deadlines are multiplexed on
/// the current task; every request runs in its own task.
pub(super) async fn run<F, E, S>(
    io: Io<F>,
    mut session: Session<E>,
    service: Pipeline<S>,
) -> Result<(), ServerError>
where
    F: Filter,
    E: FrameEngine,
    S: Service<Request, Response = Message> + 'static,
    S::Error: fmt::Debug,
{
    let (tx, rx) = mpsc::channel::<Outcome<S::Error>>();

    // server settings
    session.flush()?;
    write(&io, &mut session).await?;

    let result = loop {
        if session.is_closed() {
            break Ok(());
        }

        while let Some(req) = session.next_request() {
            let id = req.stream_id();
            let svc = service.clone();
            let tx = tx.clone();
            log::trace!("dispatch request {req:?}");

            let _ = ntex_rt::spawn(async move {
                let result = svc.call(req).await;
                let _ = tx.send((id, result));
            });
        }

        let deadline = session.next_deadline();
        let timeout = async move {
            match deadline {
                Some(deadline) => sleep(until(deadline)).await,
                None => pending::<()>().await,
            }
        };

        match select(io.recv(&BytesCodec), select(rx.recv(), timeout)).await {
            Either::Left(Ok(Some(buf))) => {
                if let Err(err) = session.feed(&buf) {
                    log::error!("cannot process http/2 input: {err}");
                    if let Err(err) = session.flush() {
                        log::debug!("cannot flush session: {err}");
                    }
                    session.close();
                    let _ = write(&io, &mut session).await;
                    break Err(err.into());
                }
            }
            Either::Left(Ok(None)) => {
                log::debug!("peer is disconnected");
                session.close();
                break Err(ServerError::Disconnected(None));
            }
            Either::Left(Err(Either::Left(err) | Either::Right(err))) => {
                if let Err(err) = transport_error(err, io.is_closed()) {
                    session.close();
                    break Err(err);
                }
            }
            Either::Right(Either::Left(Some((id, result)))) => {
                let result = match result {
                    Ok(msg) => session.submit_response(id, msg),
                    Err(err) => {
                        log::error!("request handler failed on stream {id}: {err:?}");
                        session.reset_stream(id, Reason::INTERNAL_ERROR)
                    }
                };
                if let Err(err) = check(&mut session, result) {
                    break Err(err.into());
                }
            }
            Either::Right(Either::Left(None)) => {
                log::trace!("response channel is closed");
            }
            Either::Right(Either::Right(())) => {
                let result = session.on_timeout(Instant::now());
                if let Err(err) = check(&mut session, result) {
                    break Err(err.into());
                }
            }
        }

        if let Err(err) = write(&io, &mut session).await {
            session.close();
            break Err(err);
        }
    };

    io.close();
    result
}

/// Stream level failures only affect their stream
fn check<E: FrameEngine>(
    session: &mut Session<E>,
    result: Result<(), SessionError>,
) -> Result<(), SessionError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) if err.is_fatal() => {
            log::error!("http/2 session failed: {err}");
            session.close();
            Err(err)
        }
        Err(err) => {
            log::debug!("ignore session error: {err}");
            Ok(())
        }
    }
}

async fn write<F: Filter, E>(io: &Io<F>, session: &mut Session<E>) -> Result<(), ServerError>
where
    E: FrameEngine,
{
    if session.has_pending_write() {
        let buf = session.take_write_buf();
        log::trace!("write {} bytes", buf.len());
        if let Err(Either::Left(err) | Either::Right(err)) = io.send(buf, &BytesCodec).await {
            transport_error(err, io.is_closed())?;
        }
    }
    Ok(())
}

/// Only disconnects end the connection, other transport errors are transient
fn transport_error(err: io::Error, closed: bool) -> Result<(), ServerError> {
    if closed || ServerError::is_disconnect(&err) {
        log::debug!("transport is closed: {err}");
        Err(ServerError::Disconnected(Some(err)))
    } else {
        log::warn!("transient transport error: {err}");
        Ok(())
    }
}

/// Sleep duration until `deadline`, rounded up to whole milliseconds
fn until(deadline: Instant) -> Millis {
    let dur = deadline.saturating_duration_since(Instant::now());
    let millis = (dur.as_micros() + 999) / 1000;
    Millis(u32::try_from(millis).unwrap_or(u32::MAX))
}
