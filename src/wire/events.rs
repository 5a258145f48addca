use bytes::Bytes;

/// An event produced by the [`super::decoder::Decoder`] as bytes arrive on a
/// connection.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConnectionEvent {
    /// A complete, LF-terminated (CRLF tolerated) command line, CR/LF
    /// already stripped.
    Line(Bytes),
    /// A chunk of an in-flight job body (see `begin_body`).
    BodyChunk(Bytes),
    /// The job body has been fully received (`length + 2` bytes consumed).
    BodyEnd,
}
