use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

/// A unit of work tagged with its position in the input.
struct WorkItem<T> {
    index: usize,
    payload: T,
}

/// Fan-out/fan-in worker pool over MPSC channels.
///
/// Tasks go out on one channel and `(index, result)` messages come back on
/// another; nothing is shared between workers except the task queue. Results
/// are returned in input order, so the output is identical for any worker
/// count.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentExecutor {
    workers: usize,
}

impl AssessmentExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Apply `f` to every task and return the results in task order.
    pub fn execute<T, R, F>(&self, tasks: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let total = tasks.len();
        if self.workers == 1 || total <= 1 {
            return tasks.into_iter().map(f).collect();
        }

        let (task_tx, task_rx): (Sender<WorkItem<T>>, Receiver<WorkItem<T>>) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel::<WorkItem<R>>();
        for (index, payload) in tasks.into_iter().enumerate() {
            // The receiver is alive until the scope below ends.
            let _ = task_tx.send(WorkItem { index, payload });
        }
        drop(task_tx);

        let task_rx = Mutex::new(task_rx);
        let f = &f;
        let task_rx = &task_rx;

        std::thread::scope(|scope| {
            for _ in 0..self.workers.min(total) {
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    loop {
                        let item = {
                            let Ok(rx) = task_rx.lock() else { break };
                            match rx.recv() {
                                Ok(item) => item,
                                Err(_) => break,
                            }
                        };
                        let result = WorkItem {
                            index: item.index,
                            payload: f(item.payload),
                        };
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for item in result_rx.iter() {
            slots[item.index] = Some(item.payload);
        }
        slots.into_iter().flatten().collect()
    }
}

impl Default for AssessmentExecutor {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order_across_worker_counts() {
        let tasks: Vec<u64> = (0..200).collect();
        let sequential = AssessmentExecutor::new(1).execute(tasks.clone(), |x| x * x);
        let parallel = AssessmentExecutor::new(4).execute(tasks, |x| x * x);
        assert_eq!(sequential, parallel);
        assert_eq!(parallel[13], 169);
    }

    #[test]
    fn empty_input() {
        let out: Vec<u8> = AssessmentExecutor::new(8).execute(Vec::<u8>::new(), |x| x);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_workers_means_one() {
        assert_eq!(AssessmentExecutor::new(0).workers(), 1);
    }
}
