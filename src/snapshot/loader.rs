use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::{error, fmt};

use bytes::Bytes;

use super::format::{self, HEADER};
use crate::engine::Engine;
use crate::types::job::Job;

/// Loads a snapshot into `engine` at startup (spec §4.6's "Loader"). A
/// missing file is not an error — the server simply starts empty.
pub fn load(path: &Path, engine: &mut Engine) -> Result<(), Error> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::Io(e)),
    };
    let mut r = BufReader::new(file);

    let mut header = [0u8; 12];
    r.read_exact(&mut header)?;
    if &header != HEADER {
        return Err(Error::BadHeader);
    }

    let now = Engine::now();

    while let Some(rh) = format::read_record_header(&mut r)? {
        let mut qname = vec![0u8; rh.qlen as usize];
        r.read_exact(&mut qname)?;

        let mut payload = vec![0u8; rh.jlen as usize];
        r.read_exact(&mut payload)?;
        payload.extend_from_slice(b"\r\n");

        let due_time = rh.due_time as i64;
        let due_time = if due_time > 0 && due_time > now { due_time } else { 0 };

        let job = Job::new(qname, rh.priority, due_time, rh.jlen as u32, Bytes::from(payload));
        engine.restore_job(job);
    }

    Ok(())
}

#[derive(Debug)]
pub enum Error {
    /// Header identifier mismatch (spec §4.6 step 2's "invalid database file").
    BadHeader,
    Io(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadHeader => write!(f, "invalid database file"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::snapshot::format::{write_record, write_sentinel, RecordHeader};

    #[test]
    fn loads_ready_and_delayed_jobs() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(HEADER).unwrap();
        write_record(
            &mut f,
            RecordHeader { priority: 5, due_time: 0, qlen: 1, jlen: 3 },
            b"q",
            b"foo",
        )
        .unwrap();
        write_record(
            &mut f,
            RecordHeader { priority: 1, due_time: (Engine::now() + 3600) as i32, qlen: 1, jlen: 2 },
            b"q",
            b"ok",
        )
        .unwrap();
        write_sentinel(&mut f).unwrap();
        f.flush().unwrap();

        let mut engine = Engine::new(60);
        load(f.path(), &mut engine).unwrap();

        assert_eq!(engine.size(b"q"), Ok(1));
        assert_eq!(engine.dequeue(b"q").unwrap().1.as_ref(), b"foo\r\n");
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let mut engine = Engine::new(60);
        load(Path::new("/nonexistent/path/to/mx-queued.db"), &mut engine).unwrap();
        assert_eq!(engine.size(b"q"), Err(crate::wire::protocol::ErrKind::NotFoundQueue));
    }

    #[test]
    fn bad_header_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"NOT-A-HEADER").unwrap();
        f.flush().unwrap();

        let mut engine = Engine::new(60);
        assert!(matches!(load(f.path(), &mut engine), Err(Error::BadHeader)));
    }
}
