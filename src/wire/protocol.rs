use bytes::Bytes;

/// A command sent by a client, once tokenized and arity/field-checked
/// (spec §4.4's dispatch steps 2-4; step 1, "no complete line", lives in the
/// decoder).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// `ping` — always `+OK`.
    Ping,
    /// `auth <user> <pass>`.
    Auth { user: Bytes, pass: Bytes },
    /// `enqueue <name> <priority> <delay> <length>`, followed by a body of
    /// `length + 2` bytes (payload + CRLF).
    Enqueue {
        queue: Bytes,
        priority: i32,
        delay: i32,
        length: u32,
    },
    /// `dequeue <name>`.
    Dequeue { queue: Bytes },
    /// `touch <name>`.
    Touch { queue: Bytes },
    /// `recycle <token> <priority> <delay>`.
    Recycle {
        token: u64,
        priority: i32,
        delay: i32,
    },
    /// `remove <name>`.
    Remove { queue: Bytes },
    /// `size <name>`.
    Size { queue: Bytes },
}

/// A fixed error reply, each corresponding to one `-ERR <message>` line in
/// spec §7's error taxonomy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrKind {
    NotFoundCommand,
    ParamAmountInvalid,
    InvalidPriority,
    InvalidDelay,
    InvalidLength,
    InvalidToken,
    NotFoundQueue,
    QueueWasEmpty,
    NotFoundRecycleJob,
    NotEnoughMemory,
    JobInvalid,
    UnreliableConnection,
    AccessDenied,
    OutputTooLong,
}

impl ErrKind {
    pub fn message(self) -> &'static str {
        use ErrKind::*;
        match self {
            NotFoundCommand => "not found command",
            ParamAmountInvalid => "parameter amount invalid",
            InvalidPriority => "invalid priority",
            InvalidDelay => "invalid delay",
            InvalidLength => "invalid length",
            InvalidToken => "invalid token",
            NotFoundQueue => "not found the queue",
            QueueWasEmpty => "the queue was empty",
            NotFoundRecycleJob => "not found this recycle job",
            NotEnoughMemory => "not enough memory",
            JobInvalid => "job invalid",
            UnreliableConnection => "unreliable connection",
            AccessDenied => "access denied",
            OutputTooLong => "output string too long",
        }
    }
}

/// A reply to a client. Job bodies are a separate variant so the connection
/// can stream them (spec §4.4's `WritingJob` two-phase state) instead of
/// buffering the whole response at once.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Response {
    Ok,
    OkSize(u64),
    /// `dequeue`'s `+OK <length>` header, body streamed separately.
    OkDequeueHeader(u32),
    /// `touch`'s `+OK <token> <length>` header, body streamed separately.
    OkTouchHeader(u64, u32),
    JobBody(Bytes),
    Err(ErrKind),
}

const MAX_TOKENS: usize = 100;

/// Splits a command line on single ASCII space bytes, skipping empty tokens
/// (spec §4.4), capped at [`MAX_TOKENS`].
pub fn tokenize(line: &[u8]) -> Vec<&[u8]> {
    line.split(|&b| b == b' ')
        .filter(|t| !t.is_empty())
        .take(MAX_TOKENS)
        .collect()
}

/// Parses a decimal integer with an optional leading sign; any non-digit
/// after the sign is rejected (spec §4.5).
fn parse_int(tok: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(tok).ok()?;
    s.parse::<i64>().ok()
}

fn parse_u32(tok: &[u8], err: ErrKind) -> Result<u32, ErrKind> {
    parse_int(tok)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or(err)
}

fn parse_i32(tok: &[u8], err: ErrKind) -> Result<i32, ErrKind> {
    parse_int(tok)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or(err)
}

fn parse_u64(tok: &[u8], err: ErrKind) -> Result<u64, ErrKind> {
    parse_int(tok)
        .and_then(|v| u64::try_from(v).ok())
        .ok_or(err)
}

/// Tokenizes and parses a raw command line into a [`Command`], performing
/// spec §4.4's dispatch checks 2 (unknown verb) and 3 (arity mismatch), plus
/// each command's own per-field numeric parsing (§4.5).
pub fn parse_command(line: &[u8]) -> Result<Command, ErrKind> {
    let tokens = tokenize(line);
    let Some(&verb) = tokens.first() else {
        return Err(ErrKind::NotFoundCommand);
    };

    macro_rules! require_argc {
        ($n:expr) => {
            if tokens.len() != $n + 1 {
                return Err(ErrKind::ParamAmountInvalid);
            }
        };
    }

    Ok(match verb {
        b"ping" => {
            require_argc!(0);
            Command::Ping
        },
        b"auth" => {
            require_argc!(2);
            Command::Auth {
                user: Bytes::copy_from_slice(tokens[1]),
                pass: Bytes::copy_from_slice(tokens[2]),
            }
        },
        b"enqueue" => {
            require_argc!(4);
            Command::Enqueue {
                queue: Bytes::copy_from_slice(tokens[1]),
                priority: parse_i32(tokens[2], ErrKind::InvalidPriority)?,
                delay: parse_i32(tokens[3], ErrKind::InvalidDelay)?,
                length: parse_u32(tokens[4], ErrKind::InvalidLength)?,
            }
        },
        b"dequeue" => {
            require_argc!(1);
            Command::Dequeue {
                queue: Bytes::copy_from_slice(tokens[1]),
            }
        },
        b"touch" => {
            require_argc!(1);
            Command::Touch {
                queue: Bytes::copy_from_slice(tokens[1]),
            }
        },
        b"recycle" => {
            require_argc!(3);
            Command::Recycle {
                token: parse_u64(tokens[1], ErrKind::InvalidToken)?,
                priority: parse_i32(tokens[2], ErrKind::InvalidPriority)?,
                delay: parse_i32(tokens[3], ErrKind::InvalidDelay)?,
            }
        },
        b"remove" => {
            require_argc!(1);
            Command::Remove {
                queue: Bytes::copy_from_slice(tokens[1]),
            }
        },
        b"size" => {
            require_argc!(1);
            Command::Size {
                queue: Bytes::copy_from_slice(tokens[1]),
            }
        },
        _ => return Err(ErrKind::NotFoundCommand),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_skips_empty_runs() {
        assert_eq!(
            tokenize(b"enqueue  q 1  0 5"),
            vec![b"enqueue" as &[u8], b"q", b"1", b"0", b"5"]
        );
    }

    #[test]
    fn unknown_verb_is_not_found_command() {
        assert_eq!(parse_command(b"frobnicate"), Err(ErrKind::NotFoundCommand));
    }

    #[test]
    fn empty_line_is_not_found_command() {
        assert_eq!(parse_command(b""), Err(ErrKind::NotFoundCommand));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        assert_eq!(parse_command(b"size"), Err(ErrKind::ParamAmountInvalid));
        assert_eq!(
            parse_command(b"size a b"),
            Err(ErrKind::ParamAmountInvalid)
        );
    }

    #[test]
    fn enqueue_parses_fields() {
        assert_eq!(
            parse_command(b"enqueue q 10 0 5"),
            Ok(Command::Enqueue {
                queue: Bytes::from_static(b"q"),
                priority: 10,
                delay: 0,
                length: 5,
            })
        );
    }

    #[test]
    fn non_numeric_priority_is_rejected() {
        assert_eq!(
            parse_command(b"enqueue q abc 0 5"),
            Err(ErrKind::InvalidPriority)
        );
    }
}
