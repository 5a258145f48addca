use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::types::index::{Order, OrderedIndex};
use crate::types::job::{Job, JobId};
use crate::types::queue::QueueRecord;
use crate::wire::protocol::ErrKind;

pub mod scheduler;

/// The in-memory store (spec §4.2) plus the bookkeeping the scheduler and
/// snapshot engine need: the dirty counter, the recycle-token allocator, and
/// the job-id allocator backing the `jobs` arena.
///
/// Lives behind a single `Rc<RefCell<Engine>>` shared by every connection
/// task on the reactor thread — see `crate::connection`.
pub struct Engine {
    queues: HashMap<Vec<u8>, QueueRecord>,
    jobs: HashMap<JobId, Job>,
    delay_wheel: OrderedIndex<JobId>,
    recycle_pool: OrderedIndex<JobId>,
    next_job_id: u64,
    next_recycle_token: u64,
    dirty: u64,
    recycle_timeout: i64,
}

impl Engine {
    pub fn new(recycle_timeout: i64) -> Self {
        Self {
            queues: HashMap::new(),
            jobs: HashMap::new(),
            delay_wheel: OrderedIndex::new(Order::Ascending),
            recycle_pool: OrderedIndex::new(Order::Ascending),
            next_job_id: 0,
            next_recycle_token: 0,
            dirty: 0,
            recycle_timeout,
        }
    }

    pub fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_secs() as i64
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn reset_dirty(&mut self) {
        self.dirty = 0;
    }

    /// `queue_get_or_create` (spec §4.2).
    pub fn queue_get_or_create(&mut self, name: &[u8]) -> &mut QueueRecord {
        self.queues.entry(name.to_vec()).or_default()
    }

    fn alloc_job_id(&mut self) -> JobId {
        let id = JobId::from_raw(self.next_job_id);
        self.next_job_id += 1;
        id
    }

    fn dispose(&mut self, id: JobId) -> Option<Job> {
        self.dirty += 1;
        self.jobs.remove(&id)
    }

    /// Places a ready or not-yet-due job into its home container, used by
    /// `enqueue`, `recycle`, and the delay-wheel promotion path in
    /// [`scheduler`] — all three share the same "where does this job belong
    /// given its due_time" rule (spec §4.5's `enqueue` semantics, reused
    /// verbatim by `recycle`).
    fn place(&mut self, id: JobId) {
        let job = self.jobs.get(&id).expect("placing an id with no job");
        if job.due_time > 0 {
            self.delay_wheel.insert(job.due_time, id);
        } else {
            let priority = job.priority as i64;
            let queue = job.queue.clone();
            self.queue_get_or_create(&queue).ready.insert(priority, id);
        }
    }

    // --- Command Set (spec §4.5) -------------------------------------

    pub fn ping(&self) -> bool {
        true
    }

    /// `enqueue`. Called once the full `length + 2` body has arrived; the
    /// connection driver is responsible for the ReadingBody accumulation
    /// (spec §4.4), this only validates the CRLF sentinel and commits.
    pub fn enqueue(
        &mut self,
        queue: Vec<u8>,
        priority: i32,
        delay: i32,
        length: u32,
        body: Bytes,
    ) -> Result<(), ErrKind> {
        if body.len() as u64 != length as u64 + 2 || &body[body.len() - 2..] != b"\r\n" {
            return Err(ErrKind::JobInvalid);
        }

        let due_time = if delay > 0 { Self::now() + delay as i64 } else { 0 };
        let id = self.alloc_job_id();
        self.jobs.insert(id, Job::new(queue, priority, due_time, length, body));
        self.place(id);
        self.dirty += 1;
        Ok(())
    }

    /// `dequeue`. The job is removed from the ready index and the arena in
    /// the same step — see `DESIGN.md` for why this implementation commits
    /// disposal/recycle placement up front rather than deferring it to send
    /// completion.
    pub fn dequeue(&mut self, queue: &[u8]) -> Result<(u32, Bytes), ErrKind> {
        let q = self.queues.get_mut(queue).ok_or(ErrKind::NotFoundQueue)?;
        let id = q.ready.pop_top().ok_or(ErrKind::QueueWasEmpty)?;
        let job = self.dispose(id).expect("ready index referenced missing job");
        Ok((job.length, job.body))
    }

    /// `touch`. Like `dequeue`, but the job survives in the recycle pool
    /// under a freshly allocated token instead of being disposed.
    pub fn touch(&mut self, queue: &[u8]) -> Result<(u64, u32, Bytes), ErrKind> {
        let q = self.queues.get_mut(queue).ok_or(ErrKind::NotFoundQueue)?;
        let id = q.ready.pop_top().ok_or(ErrKind::QueueWasEmpty)?;

        let token = self.next_recycle_token;
        self.next_recycle_token += 1;

        let job = self.jobs.get_mut(&id).expect("ready index referenced missing job");
        job.due_time = Self::now() + self.recycle_timeout;
        let length = job.length;
        let body = job.body.clone();

        self.recycle_pool.insert(token as i64, id);
        Ok((token, length, body))
    }

    /// `recycle`.
    pub fn recycle(&mut self, token: u64, priority: i32, delay: i32) -> Result<(), ErrKind> {
        let id = self
            .recycle_pool
            .delete(token as i64)
            .ok_or(ErrKind::NotFoundRecycleJob)?;

        let job = self.jobs.get_mut(&id).expect("recycle pool referenced missing job");
        job.priority = priority;
        job.due_time = if delay > 0 { Self::now() + delay as i64 } else { 0 };

        self.place(id);
        self.dirty += 1;
        Ok(())
    }

    /// `remove`. Cascades only into the queue's own ready index (open
    /// question 1 in `SPEC_FULL.md`); delayed/recycled jobs naming this
    /// queue are left alone and recreate it lazily when later promoted.
    pub fn remove(&mut self, queue: &[u8]) -> Result<(), ErrKind> {
        let q = self.queues.remove(queue).ok_or(ErrKind::NotFoundQueue)?;
        let ids: Vec<JobId> = q.ready.iter_in_order().copied().collect();
        for id in ids {
            self.dispose(id);
        }
        Ok(())
    }

    /// `size`.
    pub fn size(&self, queue: &[u8]) -> Result<u64, ErrKind> {
        self.queues
            .get(queue)
            .map(|q| q.ready.len() as u64)
            .ok_or(ErrKind::NotFoundQueue)
    }

    // --- accessors for the snapshot engine ----------------------------

    pub(crate) fn queues(&self) -> &HashMap<Vec<u8>, QueueRecord> {
        &self.queues
    }

    pub(crate) fn jobs(&self) -> &HashMap<JobId, Job> {
        &self.jobs
    }

    pub(crate) fn delay_wheel(&self) -> &OrderedIndex<JobId> {
        &self.delay_wheel
    }

    pub(crate) fn recycle_pool(&self) -> &OrderedIndex<JobId> {
        &self.recycle_pool
    }

    /// Used by the snapshot loader to repopulate the store at startup,
    /// bypassing the dirty counter (a freshly loaded snapshot is clean).
    pub(crate) fn restore_job(&mut self, job: Job) {
        let id = self.alloc_job_id();
        self.jobs.insert(id, job);
        self.place(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(payload: &[u8]) -> Bytes {
        let mut v = payload.to_vec();
        v.extend_from_slice(b"\r\n");
        Bytes::from(v)
    }

    #[test]
    fn enqueue_and_dequeue_round_trip() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 0, 5, body(b"hello")).unwrap();
        let (len, b) = e.dequeue(b"q").unwrap();
        assert_eq!(len, 5);
        assert_eq!(&b[..], b"hello\r\n");
        assert_eq!(e.dequeue(b"q"), Err(ErrKind::QueueWasEmpty));
    }

    #[test]
    fn dequeue_orders_by_priority_then_fifo() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 0, 5, body(b"hello")).unwrap();
        e.enqueue(b"q".to_vec(), 10, 0, 5, body(b"world")).unwrap();
        e.enqueue(b"q".to_vec(), 5, 0, 3, body(b"mid")).unwrap();

        assert_eq!(e.size(b"q"), Ok(3));
        assert_eq!(e.dequeue(b"q").unwrap().1, body(b"world"));
        assert_eq!(e.dequeue(b"q").unwrap().1, body(b"mid"));
        assert_eq!(e.dequeue(b"q").unwrap().1, body(b"hello"));
    }

    #[test]
    fn missing_queue_is_not_found() {
        let mut e = Engine::new(60);
        assert_eq!(e.dequeue(b"nope"), Err(ErrKind::NotFoundQueue));
        assert_eq!(e.size(b"nope"), Err(ErrKind::NotFoundQueue));
    }

    #[test]
    fn job_without_crlf_sentinel_is_rejected() {
        let mut e = Engine::new(60);
        let bad = Bytes::from_static(b"helloXX");
        assert_eq!(
            e.enqueue(b"q".to_vec(), 1, 0, 5, bad),
            Err(ErrKind::JobInvalid)
        );
        assert_eq!(e.size(b"q"), Err(ErrKind::NotFoundQueue));
    }

    #[test]
    fn delayed_enqueue_goes_to_delay_wheel_not_ready() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 3600, 2, body(b"ok")).unwrap();
        assert_eq!(e.dequeue(b"q"), Err(ErrKind::NotFoundQueue));
        assert_eq!(e.delay_wheel.len(), 1);
    }

    #[test]
    fn touch_then_recycle_changes_priority() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 0, 3, body(b"job")).unwrap();
        let (token, len, b) = e.touch(b"q").unwrap();
        assert_eq!(token, 0);
        assert_eq!(len, 3);
        assert_eq!(&b[..], b"job\r\n");
        assert_eq!(e.dequeue(b"q"), Err(ErrKind::QueueWasEmpty));

        e.recycle(token, 9, 0).unwrap();
        let (_, b) = e.dequeue(b"q").unwrap();
        assert_eq!(&b[..], b"job\r\n");
    }

    #[test]
    fn recycle_unknown_token_is_not_found() {
        let mut e = Engine::new(60);
        assert_eq!(e.recycle(42, 1, 0), Err(ErrKind::NotFoundRecycleJob));
    }

    #[test]
    fn remove_destroys_only_ready_jobs() {
        let mut e = Engine::new(60);
        e.enqueue(b"q".to_vec(), 1, 0, 1, body(b"x")).unwrap();
        e.remove(b"q").unwrap();
        assert_eq!(e.dequeue(b"q"), Err(ErrKind::NotFoundQueue));
        assert_eq!(e.remove(b"q"), Err(ErrKind::NotFoundQueue));
    }

    #[test]
    fn dirty_counter_tracks_mutations() {
        let mut e = Engine::new(60);
        assert_eq!(e.dirty(), 0);
        e.enqueue(b"q".to_vec(), 1, 0, 1, body(b"x")).unwrap();
        assert_eq!(e.dirty(), 1);
        e.dequeue(b"q").unwrap();
        assert_eq!(e.dirty(), 2);
        e.reset_dirty();
        assert_eq!(e.dirty(), 0);
    }
}
