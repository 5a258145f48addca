use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::{error, fmt, io};

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{error, info, warn};

use super::format::{self, RecordHeader, HEADER};
use crate::engine::Engine;

/// Fork-based background writer (spec §4.6). `spawn` forks immediately
/// (synchronously, from the scheduler tick) and the child performs only
/// synchronous `std::fs` I/O before calling `std::process::exit` — it must
/// never return into the tokio reactor (spec §5's fork-safety requirement).
pub struct SnapshotWriter {
    final_path: PathBuf,
    child: Option<(Pid, PathBuf)>,
}

pub enum TriggerOutcome {
    /// No writer was running and none was started this tick.
    Idle,
    /// A new writer child was forked.
    Started,
    /// An existing writer was reaped; success resets `last_success`.
    Reaped { success: bool },
}

impl SnapshotWriter {
    pub fn new(final_path: PathBuf) -> Self {
        Self { final_path, child: None }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Forks a child that serializes `engine` to `<final_path>.<pid>`, then
    /// renames it over `final_path` on success. The parent returns
    /// immediately; the engine's dirty counter is reset here, at fork time,
    /// not at reap (spec §4.6's last paragraph).
    pub fn spawn(&mut self, engine: &mut Engine) -> Result<(), Error> {
        if self.child.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let pid_for_name = std::process::id();
        let temp_path = {
            let mut s = self.final_path.clone().into_os_string();
            s.push(format!(".{pid_for_name}"));
            PathBuf::from(s)
        };

        // Safety: the child only touches `temp_path` via std::fs and exits
        // without returning to the tokio reactor, honoring spec §5's
        // fork-safety requirement (no callback into any handler).
        match unsafe { fork() }.map_err(Error::Fork)? {
            ForkResult::Child => {
                let code = match write_snapshot(&temp_path, &self.final_path, engine) {
                    Ok(()) => 0,
                    Err(_) => 1,
                };
                std::process::exit(code);
            },
            ForkResult::Parent { child } => {
                engine.reset_dirty();
                self.child = Some((child, temp_path));
                Ok(())
            },
        }
    }

    /// Non-blockingly reaps a running writer, if any (spec §4.6's trigger
    /// step: "if a background writer child already exists, non-blockingly
    /// reap it"). Cleans up the stray temp file on signal termination.
    pub fn reap(&mut self) -> Option<bool> {
        let (pid, temp_path) = self.child.as_ref()?.clone();

        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => None,
            Ok(WaitStatus::Exited(_, 0)) => {
                self.child = None;
                info!("snapshot writer finished");
                Some(true)
            },
            Ok(WaitStatus::Exited(_, code)) => {
                self.child = None;
                warn!(code, "snapshot writer exited with failure");
                let _ = std::fs::remove_file(&temp_path);
                Some(false)
            },
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                self.child = None;
                warn!(?signal, "snapshot writer was killed");
                let _ = std::fs::remove_file(&temp_path);
                Some(false)
            },
            Ok(_) => None,
            Err(e) => {
                error!(%e, "waitpid on snapshot writer failed");
                self.child = None;
                None
            },
        }
    }
}

fn write_snapshot(temp_path: &Path, final_path: &Path, engine: &Engine) -> io::Result<()> {
    let file = File::create(temp_path)?;
    let mut w = BufWriter::new(file);

    w.write_all(HEADER)?;

    for (name, q) in engine.queues() {
        for &id in q.ready.iter_in_order() {
            let job = engine.jobs().get(&id).expect("ready index referenced missing job");
            let header = RecordHeader {
                priority: job.priority,
                due_time: 0,
                qlen: name.len() as i32,
                jlen: job.length as i32,
            };
            format::write_record(&mut w, header, name, job.payload())?;
        }
    }

    for &id in engine.delay_wheel().iter_in_order() {
        let job = engine.jobs().get(&id).expect("delay wheel referenced missing job");
        let header = RecordHeader {
            priority: job.priority,
            due_time: job.due_time as i32,
            qlen: job.queue.len() as i32,
            jlen: job.length as i32,
        };
        format::write_record(&mut w, header, &job.queue, job.payload())?;
    }

    // Recycled-but-unacked jobs are persisted as ready (due_time rewritten
    // to 0, spec §4.6 step 5).
    for &id in engine.recycle_pool().iter_in_order() {
        let job = engine.jobs().get(&id).expect("recycle pool referenced missing job");
        let header = RecordHeader {
            priority: job.priority,
            due_time: 0,
            qlen: job.queue.len() as i32,
            jlen: job.length as i32,
        };
        format::write_record(&mut w, header, &job.queue, job.payload())?;
    }

    format::write_sentinel(&mut w)?;
    w.flush()?;
    w.get_ref().sync_all()?;
    drop(w);

    std::fs::rename(temp_path, final_path)?;
    Ok(())
}

#[derive(Debug)]
pub enum Error {
    AlreadyRunning,
    Fork(Errno),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AlreadyRunning => write!(f, "a snapshot writer is already running"),
            Error::Fork(e) => write!(f, "fork failed: {e}"),
        }
    }
}
