use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use futures::sink::SinkExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::debug;

use crate::auth::CredentialStore;
use crate::engine::Engine;
use crate::wire::events::ConnectionEvent;
use crate::wire::protocol::{parse_command, tokenize, Command, ErrKind, Response};
use crate::wire::{self, Codec};

/// Drives one connection's state machine (spec §4.4) against the shared
/// engine. Lives on the reactor thread as a `spawn_local` task — see
/// `crate::bin::mxqd`'s accept loop.
pub async fn drive<S>(stream: S, engine: Rc<RefCell<Engine>>, creds: Rc<Option<CredentialStore>>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = wire::framed(stream);
    let mut authenticated = creds.is_none();

    let result = loop {
        let Some(event) = framed.next().await else {
            debug!("connection closed by peer");
            break Ok(());
        };

        let event = match event {
            Ok(e) => e,
            Err(e) => break Err(e.into()),
        };

        let ConnectionEvent::Line(line) = event else {
            // A body chunk/end with no in-flight enqueue is a driver bug, not
            // a client error: begin_body is only called right before reading
            // one, so every BodyChunk/BodyEnd here belongs to that enqueue.
            unreachable!("body event outside of an enqueue");
        };

        // Gate on the raw verb token, before parsing/arity-checking the rest
        // of the line (matching `main.c`'s `auth_enable && !c->reliable`
        // check, which runs ahead of command lookup). Checking this after
        // `parse_command` would leak command-validity information (unknown
        // verb, bad arity, bad field) to an unauthenticated client.
        if !authenticated {
            let verb: &[u8] = tokenize(&line).first().copied().unwrap_or_default();
            let gated = !matches!(verb, b"ping" | b"auth");
            if gated {
                framed.send(Response::Err(ErrKind::UnreliableConnection)).await?;
                continue;
            }
        }

        let command = match parse_command(&line) {
            Ok(c) => c,
            Err(kind) => {
                framed.send(Response::Err(kind)).await?;
                continue;
            },
        };

        let response = match command {
            Command::Ping => {
                engine.borrow().ping();
                Response::Ok
            },
            Command::Auth { user, pass } => {
                // No credential store configured means there is nothing to
                // match against, so `auth` can never succeed (spec §4.5:
                // "iff credential matches"; the original looks this up in a
                // null `auth_table`, which never hits).
                let ok = creds.as_ref().as_ref().map(|c| c.verify(&user, &pass)).unwrap_or(false);
                if ok {
                    authenticated = true;
                    Response::Ok
                } else {
                    Response::Err(ErrKind::AccessDenied)
                }
            },
            Command::Enqueue { queue, priority, delay, length } => {
                let body = match read_body(&mut framed, length).await {
                    Ok(b) => b,
                    Err(e) => break Err(e),
                };
                match engine.borrow_mut().enqueue(queue.to_vec(), priority, delay, length, body) {
                    Ok(()) => Response::Ok,
                    Err(kind) => Response::Err(kind),
                }
            },
            Command::Dequeue { queue } => {
                // Bound so the RefCell borrow is dropped before the await
                // below — other connections' tasks may run while this one is
                // suspended sending the header.
                let outcome = engine.borrow_mut().dequeue(&queue);
                match outcome {
                    Ok((length, body)) => {
                        framed.send(Response::OkDequeueHeader(length)).await?;
                        Response::JobBody(body)
                    },
                    Err(kind) => Response::Err(kind),
                }
            },
            Command::Touch { queue } => {
                let outcome = engine.borrow_mut().touch(&queue);
                match outcome {
                    Ok((token, length, body)) => {
                        framed.send(Response::OkTouchHeader(token, length)).await?;
                        Response::JobBody(body)
                    },
                    Err(kind) => Response::Err(kind),
                }
            },
            Command::Recycle { token, priority, delay } => {
                match engine.borrow_mut().recycle(token, priority, delay) {
                    Ok(()) => Response::Ok,
                    Err(kind) => Response::Err(kind),
                }
            },
            Command::Remove { queue } => match engine.borrow_mut().remove(&queue) {
                Ok(()) => Response::Ok,
                Err(kind) => Response::Err(kind),
            },
            Command::Size { queue } => match engine.borrow().size(&queue) {
                Ok(n) => Response::OkSize(n),
                Err(kind) => Response::Err(kind),
            },
        };

        framed.send(response).await?;
    };

    framed.into_inner().shutdown().await.context("during shutdown")?;
    result
}

/// Reads `length + 2` bytes of job body via the codec's `ReadingBody` mode
/// (spec §4.4), validating nothing here — CRLF validation is the engine's
/// job (`Engine::enqueue`), since an invalid body must still be disposed
/// through the ordinary dirty-counter-free error path rather than the
/// connection layer reimplementing that check.
async fn read_body<S>(
    framed: &mut tokio_util::codec::Framed<S, Codec>,
    length: u32,
) -> Result<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed.codec_mut().begin_body(length as usize + 2);

    let mut buf = BytesMut::with_capacity(length as usize + 2);
    loop {
        match framed.next().await {
            Some(Ok(ConnectionEvent::BodyChunk(chunk))) => buf.extend_from_slice(&chunk),
            Some(Ok(ConnectionEvent::BodyEnd)) => return Ok(buf.freeze()),
            Some(Ok(ConnectionEvent::Line(_))) => {
                unreachable!("decoder is in ReadingBody mode, cannot emit Line")
            },
            Some(Err(e)) => return Err(e.into()),
            None => return Err(anyhow::anyhow!("connection closed mid-body")),
        }
    }
}
