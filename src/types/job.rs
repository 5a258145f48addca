use bytes::Bytes;

/// Opaque handle into [`crate::engine::Engine`]'s job arena.
///
/// Never surfaced on the wire — the only externally visible job identifier
/// is the recycle token handed out by `touch` (spec §1 Non-goals: "no
/// per-job identifiers surfaced beyond the recycle token").
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn from_raw(n: u64) -> Self {
        Self(n)
    }
}

/// A job body plus the metadata needed to place it back into a ready index
/// or the delay wheel (spec §3).
///
/// `body` always holds exactly `length + 2` bytes: the payload followed by
/// the CRLF sentinel (invariant 5), so the wire writer can stream it
/// directly without re-appending anything.
#[derive(Debug, Clone)]
pub struct Job {
    pub queue: Vec<u8>,
    pub priority: i32,
    /// Absolute unix-epoch seconds; `0` means "ready".
    pub due_time: i64,
    pub length: u32,
    pub body: Bytes,
}

impl Job {
    pub fn new(queue: Vec<u8>, priority: i32, due_time: i64, length: u32, body: Bytes) -> Self {
        debug_assert_eq!(body.len() as u64, length as u64 + 2);
        Self {
            queue,
            priority,
            due_time,
            length,
            body,
        }
    }

    /// Body payload without the trailing CRLF sentinel (what gets persisted
    /// to a snapshot record, per §4.6's "no trailing CRLF on disk").
    pub fn payload(&self) -> &[u8] {
        &self.body[..self.length as usize]
    }
}
