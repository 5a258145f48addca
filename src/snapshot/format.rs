use std::io::{self, Read, Write};

/// Fixed 12-byte identifier with no terminator (spec §4.6/§6). Chosen to be
/// little-endian-only rather than native-endian, per open question 3 in
/// `SPEC_FULL.md`.
pub const HEADER: &[u8; 12] = b"MXQUEUED/0.7";

/// On-disk record header: `{priority, due_time, qlen, jlen}`, four
/// little-endian `i32`s (16 bytes total). A record with `qlen == 0 ||
/// jlen == 0` is the stream-terminating sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub priority: i32,
    pub due_time: i32,
    pub qlen: i32,
    pub jlen: i32,
}

impl RecordHeader {
    pub const SENTINEL: RecordHeader = RecordHeader {
        priority: 0,
        due_time: 0,
        qlen: 0,
        jlen: 0,
    };

    pub fn is_sentinel(&self) -> bool {
        self.qlen == 0 || self.jlen == 0
    }

    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&self.priority.to_le_bytes());
        out[4..8].copy_from_slice(&self.due_time.to_le_bytes());
        out[8..12].copy_from_slice(&self.qlen.to_le_bytes());
        out[12..16].copy_from_slice(&self.jlen.to_le_bytes());
        out
    }

    pub fn from_bytes(buf: [u8; 16]) -> Self {
        Self {
            priority: i32::from_le_bytes(buf[0..4].try_into().unwrap()),
            due_time: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
            qlen: i32::from_le_bytes(buf[8..12].try_into().unwrap()),
            jlen: i32::from_le_bytes(buf[12..16].try_into().unwrap()),
        }
    }
}

/// Writes one `{header}{queue name}{job body, no CRLF}` record.
pub fn write_record<W: Write>(w: &mut W, header: RecordHeader, qname: &[u8], jbody: &[u8]) -> io::Result<()> {
    w.write_all(&header.to_bytes())?;
    w.write_all(qname)?;
    w.write_all(jbody)?;
    Ok(())
}

pub fn write_sentinel<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(&RecordHeader::SENTINEL.to_bytes())
}

/// Reads one record header. Returns `None` once a sentinel is seen.
pub fn read_record_header<R: Read>(r: &mut R) -> io::Result<Option<RecordHeader>> {
    let mut buf = [0u8; 16];
    r.read_exact(&mut buf)?;
    let header = RecordHeader::from_bytes(buf);
    if header.is_sentinel() {
        Ok(None)
    } else {
        Ok(Some(header))
    }
}
