use std::{error, fmt};

use bytes::Buf;
use tokio_util::codec;

use super::events::ConnectionEvent;

/// Size of the fixed receive buffer (spec §4.4): a single unterminated
/// command line that fills this without a line terminator closes the
/// connection with no reply.
pub const RECV_BUFFER_SIZE: usize = 2048;

/// Frames raw connection bytes into [`ConnectionEvent`]s.
///
/// Unlike the command parsing in [`super::protocol`], this layer knows
/// nothing about verbs or arity — it only recognises line boundaries and, once
/// told to via [`Decoder::begin_body`], a fixed-length body. The connection
/// driver (`crate::connection`) calls `begin_body` after successfully parsing
/// an `enqueue` command, matching spec §4.4's `ReadingCommand` ->
/// `ReadingBody` transition.
#[derive(Debug, Default)]
pub enum Decoder {
    #[default]
    ReadingCommand,
    ReadingBody {
        remaining: usize,
    },
}

impl Decoder {
    /// Switches the decoder into `ReadingBody`, expecting exactly
    /// `remaining` more bytes (the job payload plus its CRLF sentinel)
    /// before the next command line.
    pub fn begin_body(&mut self, remaining: usize) {
        *self = Decoder::ReadingBody { remaining };
    }
}

impl codec::Decoder for Decoder {
    type Item = ConnectionEvent;
    type Error = Error;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match *self {
            Decoder::ReadingCommand => match src.iter().position(|&b| b == b'\n') {
                Some(idx) => {
                    // Panic safety: idx < src.len() by construction of position().
                    let mut line = src.split_to(idx);
                    src.advance(1); // discard the LF itself
                    if line.last() == Some(&b'\r') {
                        line.truncate(line.len() - 1);
                    }
                    Ok(Some(ConnectionEvent::Line(line.freeze())))
                },
                None => {
                    if src.len() >= RECV_BUFFER_SIZE {
                        Err(Error::LineTooLong)
                    } else {
                        Ok(None)
                    }
                },
            },
            Decoder::ReadingBody { remaining: 0 } => {
                *self = Decoder::ReadingCommand;
                Ok(Some(ConnectionEvent::BodyEnd))
            },
            Decoder::ReadingBody { remaining } => {
                if src.is_empty() {
                    // Ensures a chunk always carries at least one byte, and
                    // causes an end-of-stream error if the stream closes
                    // mid-body (remaining > 0).
                    return Ok(None);
                }

                let take = remaining.min(src.len());
                *self = Decoder::ReadingBody {
                    remaining: remaining - take,
                };

                Ok(Some(ConnectionEvent::BodyChunk(src.split_to(take).freeze())))
            },
        }
    }
}

/// Transport-level decode failures. Both variants are unrecoverable: the
/// connection is closed without a reply (spec §4.4's buffer-overflow
/// semantics; §4.4's connection-lifecycle EOF-during-body semantics).
#[derive(Debug)]
pub enum Error {
    /// A command line exceeded [`RECV_BUFFER_SIZE`] without a terminator.
    LineTooLong,
    Io(std::io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LineTooLong => write!(f, "command line too long"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use tokio_util::codec::FramedRead;

    #[tokio::test]
    async fn splits_lines_and_strips_crlf() {
        let stream: &[u8] = b"ping\r\nsize q\n";
        let mut framed = FramedRead::new(stream, Decoder::default());

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ConnectionEvent::Line("ping".into())
        );
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ConnectionEvent::Line("size q".into())
        );
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn streams_body_then_emits_end() {
        let stream: &[u8] = b"enqueue q 1 0 5\r\nhello\r\n";
        let mut framed = FramedRead::new(stream, Decoder::default());

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ConnectionEvent::Line("enqueue q 1 0 5".into())
        );
        framed.decoder_mut().begin_body(7); // "hello" + CRLF

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ConnectionEvent::BodyChunk("hello\r\n".into())
        );
        assert_eq!(framed.next().await.unwrap().unwrap(), ConnectionEvent::BodyEnd);
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn pipelined_commands_after_body() {
        let stream: &[u8] = b"enqueue q 1 0 2\r\nhi\r\nping\r\n";
        let mut framed = FramedRead::new(stream, Decoder::default());

        framed.next().await.unwrap().unwrap(); // the enqueue line
        framed.decoder_mut().begin_body(4); // "hi" + CRLF

        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ConnectionEvent::BodyChunk("hi\r\n".into())
        );
        assert_eq!(framed.next().await.unwrap().unwrap(), ConnectionEvent::BodyEnd);
        assert_eq!(
            framed.next().await.unwrap().unwrap(),
            ConnectionEvent::Line("ping".into())
        );
    }

    #[tokio::test]
    async fn overlong_line_without_terminator_errors() {
        let data = vec![b'x'; RECV_BUFFER_SIZE];
        let mut framed = FramedRead::new(data.as_slice(), Decoder::default());
        assert!(matches!(
            framed.next().await.unwrap().unwrap_err(),
            Error::LineTooLong
        ));
    }
}
