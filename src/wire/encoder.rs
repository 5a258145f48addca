use std::{error, fmt};

use bytes::BufMut;
use tokio_util::codec;

use super::protocol::Response;

/// Upper bound on a single header reply (spec §7's "output string too long":
/// an oversized reply is replaced with a fixed error line rather than sent
/// as-is). Job bodies are exempt — they are streamed, not buffered whole.
const SEND_BUFFER_SIZE: usize = 2048;

/// An encoder for [`Response`] values.
#[derive(Debug, Default)]
pub struct Encoder {}

impl codec::Encoder<Response> for Encoder {
    type Error = Error;

    fn encode(&mut self, item: Response, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
        use Response::*;

        let mut line = Vec::new();
        match item {
            Ok => line.extend_from_slice(b"+OK\r\n"),
            OkSize(n) => line.extend_from_slice(format!("+OK {n}\r\n").as_bytes()),
            OkDequeueHeader(len) => line.extend_from_slice(format!("+OK {len}\r\n").as_bytes()),
            OkTouchHeader(token, len) => {
                line.extend_from_slice(format!("+OK {token} {len}\r\n").as_bytes())
            },
            Err(kind) => line.extend_from_slice(format!("-ERR {}\r\n", kind.message()).as_bytes()),
            JobBody(data) => {
                // Streamed verbatim: already `length + 2` bytes including
                // the CRLF sentinel, and may exceed SEND_BUFFER_SIZE.
                dst.reserve(data.len());
                dst.extend_from_slice(&data);
                return Ok(());
            },
        }

        if line.len() > SEND_BUFFER_SIZE {
            line.clear();
            line.extend_from_slice(b"-ERR output string too long\r\n");
        }

        dst.reserve(line.len());
        dst.put_slice(&line);
        Ok(())
    }
}

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
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
    use crate::wire::protocol::ErrKind;
    use bytes::{Bytes, BytesMut};

    fn encode(r: Response) -> Vec<u8> {
        let mut enc = Encoder::default();
        let mut buf = BytesMut::new();
        codec::Encoder::encode(&mut enc, r, &mut buf).unwrap();
        buf.to_vec()
    }

    #[test]
    fn encodes_ok_variants() {
        assert_eq!(encode(Response::Ok), b"+OK\r\n");
        assert_eq!(encode(Response::OkSize(3)), b"+OK 3\r\n");
        assert_eq!(encode(Response::OkDequeueHeader(5)), b"+OK 5\r\n");
        assert_eq!(encode(Response::OkTouchHeader(7, 3)), b"+OK 7 3\r\n");
    }

    #[test]
    fn encodes_error() {
        assert_eq!(
            encode(Response::Err(ErrKind::NotFoundQueue)),
            b"-ERR not found the queue\r\n"
        );
    }

    #[test]
    fn streams_job_body_verbatim() {
        assert_eq!(
            encode(Response::JobBody(Bytes::from_static(b"hello\r\n"))),
            b"hello\r\n"
        );
    }
}
