use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use crossbeam::channel::unbounded;
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};

/// Fixed-size worker pool for per-segment work
pub struct SegmentPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl SegmentPool {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("corpusx-segment-{}", i))
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("cannot start segment pool: {}", e)))?;
        debug!(threads, "segment pool started");
        Ok(SegmentPool { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `task` on every item. Items are dealt round-robin to the threads,
    /// each thread working through its share in order, and come back in
    /// their original order. After the first failure the remaining items are
    /// skipped; that failure is returned, later ones are dropped.
    pub fn run<T, F>(&self, items: Vec<T>, task: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&mut T) -> Result<()> + Sync,
    {
        let n = items.len();
        let mut shares: Vec<Vec<(usize, T)>> = (0..self.threads).map(|_| Vec::new()).collect();
        for (i, item) in items.into_iter().enumerate() {
            shares[i % self.threads].push((i, item));
        }

        let (sender, receiver) = unbounded::<(usize, T, Result<()>)>();
        let failed = AtomicBool::new(false);
        let task = &task;
        let failed_ref = &failed;
        self.pool.scope(|scope| {
            for share in shares.into_iter().filter(|s| !s.is_empty()) {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    for (i, mut item) in share {
                        let result = if failed_ref.load(Ordering::Acquire) {
                            Ok(())
                        } else {
                            panic::catch_unwind(AssertUnwindSafe(|| task(&mut item))).unwrap_or_else(|_| {
                                Err(Error::new(ErrorKind::Internal, format!("worker for item {} panicked", i)))
                            })
                        };
                        if result.is_err() {
                            failed_ref.store(true, Ordering::Release);
                        }
                        if sender.send((i, item, result)).is_err() {
                            return;
                        }
                    }
                });
            }
        });
        drop(sender);

        let mut slots: Vec<Option<T>> = (0..n).map(|_| None).collect();
        let mut first_error = None;
        for (i, item, result) in receiver.iter() {
            if let Err(e) = result {
                if first_error.is_none() {
                    warn!(item = i, error = %e, "segment worker failed");
                    first_error = Some(e);
                }
            }
            slots[i] = Some(item);
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use super::*;

    #[test]
    fn runs_every_item_in_order() {
        let pool = SegmentPool::new(3).unwrap();
        let items: Vec<i32> = (0..10).collect();
        let out = pool.run(items, |x| {
            *x *= 2;
            Ok(())
        })
        .unwrap();
        assert_eq!(out, (0..10).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn first_error_wins() {
        let pool = SegmentPool::new(1).unwrap();
        let calls = AtomicUsize::new(0);
        let err = pool
            .run((0..5).collect::<Vec<i32>>(), |x| {
                calls.fetch_add(1, Ordering::SeqCst);
                if *x >= 2 {
                    return Err(Error::invalid_index(format!("bad segment {}", x)));
                }
                Ok(())
            })
            .unwrap_err();
        assert!(err.is(ErrorKind::InvalidIndex));
        assert!(err.to_string().contains("bad segment 2"));
        // One thread: nothing runs after the failure
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panics_become_errors() {
        let pool = SegmentPool::new(2).unwrap();
        let err = pool
            .run(vec![1, 2], |x| {
                if *x == 2 {
                    panic!("boom");
                }
                Ok(())
            })
            .unwrap_err();
        assert!(err.is(ErrorKind::Internal));
    }
}
