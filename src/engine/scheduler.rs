use super::Engine;

/// One scheduler tick (spec §4.3): promote due delayed jobs, expire recycle
/// holds. Snapshot triggering is a separate concern driven by
/// `crate::snapshot::writer::SnapshotWriter`, which the caller ticks
/// alongside this.
impl Engine {
    pub fn tick(&mut self) {
        let now = Self::now();
        self.promote_delayed(now);
        self.expire_recycled(now);
    }

    fn promote_delayed(&mut self, now: i64) {
        while matches!(self.delay_wheel.peek_top_key(), Some(due) if due <= now) {
            let id = self.delay_wheel.pop_top().expect("peeked key implies an entry");
            let job = self.jobs.get_mut(&id).expect("delay wheel referenced missing job");
            job.due_time = 0;
            self.place(id);
        }
    }

    fn expire_recycled(&mut self, now: i64) {
        loop {
            let Some(&id) = self.recycle_pool.peek_top() else {
                break;
            };
            let due_time = self.jobs.get(&id).expect("recycle pool referenced missing job").due_time;
            if due_time > now {
                break;
            }
            self.recycle_pool.pop_top();
            self.dispose(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn body(payload: &[u8]) -> Bytes {
        let mut v = payload.to_vec();
        v.extend_from_slice(b"\r\n");
        Bytes::from(v)
    }

    #[test]
    fn tick_promotes_due_delayed_jobs() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 1, 2, body(b"ok")).unwrap();

        // Force the due_time into the past without sleeping the test.
        let id = *e.delay_wheel.peek_top().unwrap();
        e.jobs.get_mut(&id).unwrap().due_time = Engine::now() - 1;
        // Re-key the wheel entry to match, mirroring what a real clock would do.
        e.delay_wheel.pop_top();
        e.delay_wheel.insert(Engine::now() - 1, id);

        e.tick();
        assert_eq!(e.size(b"q"), Ok(1));
        assert_eq!(e.dequeue(b"q").unwrap().1, body(b"ok"));
    }

    #[test]
    fn tick_leaves_not_yet_due_jobs_delayed() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 3600, 2, body(b"ok")).unwrap();
        e.tick();
        assert_eq!(e.dequeue(b"q"), Err(crate::wire::protocol::ErrKind::NotFoundQueue));
    }

    #[test]
    fn tick_expires_recycle_holds_and_discards_jobs() {
        let mut e = Engine::new(0); // recycle_timeout 0: expires on the next tick
        e.enqueue(b"q".to_vec(), 1, 0, 3, body(b"job")).unwrap();
        let (token, _, _) = e.touch(b"q").unwrap();

        e.tick();

        assert_eq!(
            e.recycle(token, 1, 0),
            Err(crate::wire::protocol::ErrKind::NotFoundRecycleJob)
        );
        assert_eq!(e.dequeue(b"q"), Err(crate::wire::protocol::ErrKind::QueueWasEmpty));
    }
}
