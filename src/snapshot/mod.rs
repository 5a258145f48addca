use std::path::PathBuf;

use crate::engine::Engine;

pub mod format;
pub mod loader;
pub mod writer;

/// Snapshot trigger configuration (spec §4.6 + the CLI surface in §6).
pub struct SnapshotConfig {
    pub enabled: bool,
    pub path: PathBuf,
    pub interval_secs: i64,
    pub changes_threshold: u64,
}

/// Ties [`writer::SnapshotWriter`] to the trigger decision spec §4.6
/// describes, so the scheduler tick only needs to call [`Self::tick`].
pub struct SnapshotEngine {
    config: SnapshotConfig,
    writer: writer::SnapshotWriter,
    last_success: i64,
}

impl SnapshotEngine {
    pub fn new(config: SnapshotConfig) -> Self {
        let writer = writer::SnapshotWriter::new(config.path.clone());
        Self { config, writer, last_success: Engine::now() }
    }

    /// Spec §4.6's "Triggering (at each tick)" decision: reap a running
    /// writer if any, else consider starting one.
    pub fn tick(&mut self, engine: &mut Engine) {
        if self.writer.is_running() {
            if let Some(success) = self.writer.reap() {
                if success {
                    self.last_success = Engine::now();
                }
            }
            return;
        }

        if !self.config.enabled {
            return;
        }

        let now = Engine::now();
        let interval_elapsed = now - self.last_success > self.config.interval_secs;
        let dirty = engine.dirty();
        let should_start =
            (interval_elapsed && dirty > 0) || dirty >= self.config.changes_threshold;

        if should_start {
            if let Err(e) = self.writer.spawn(engine) {
                tracing::warn!(error = %e, "failed to start snapshot writer");
            }
        }
    }
}
