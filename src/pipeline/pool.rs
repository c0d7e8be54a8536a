use crossbeam_channel::unbounded;
use std::thread;

/// Fixed-size worker pool over independent items.
pub struct Pool;

impl Pool {
    /// Runs `work` on every item using at most `workers` threads and returns
    /// the results in input order. Items never wait on each other.
    pub fn execute<T, R, F>(items: Vec<T>, workers: usize, work: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = workers.clamp(1, total);

        let (item_sender, item_receiver) = unbounded();
        let (result_sender, result_receiver) = unbounded();
        for item in items.into_iter().enumerate() {
            let _ = item_sender.send(item);
        }
        drop(item_sender);

        thread::scope(|scope| {
            for _ in 0..workers {
                let item_receiver = item_receiver.clone();
                let result_sender = result_sender.clone();
                let work = &work;
                scope.spawn(move || {
                    for (index, item) in item_receiver.iter() {
                        if result_sender.send((index, work(item))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_sender);

        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for (index, result) in result_receiver.try_iter() {
            results[index] = Some(result);
        }
        results.into_iter().flatten().collect()
    }
}
