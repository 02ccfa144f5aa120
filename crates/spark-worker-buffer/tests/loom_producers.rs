//! 并行生产者的 Loom 并发模型。
//!
//! ## 教案级导览
//!
//! - **核心目标 (Why)**：验证两个线程经由 `enqueue_shared` 向不同逻辑索引追加时，
//!   槽位之间不存在数据竞争，且 join 之后单一消费者排空得到按索引升序拼接的完整结果。
//! - **设计手法 (How)**：池内部槽位在 `--cfg loom` 下由 Loom 的 `UnsafeCell` 承载，
//!   模型检查器据此追踪每个槽位的读写交错；线程间以 `Arc` 共享池。
//! - **契约 (What)**：每个线程独占一个逻辑索引；排空在全部生产者 join 之后进行。
//!
//! 运行方式：`RUSTFLAGS="--cfg loom" cargo test -p spark-worker-buffer --test loom_producers --release`。
#![cfg(any(loom, spark_loom))]

use loom::{model, sync::Arc, thread};
use spark_worker_buffer::{DEFAULT_WORKER_INDEX, WorkerBufferPool, decode_records};

#[test]
fn distinct_producers_never_race_and_drain_in_index_order() {
    model(|| {
        let pool = Arc::new(WorkerBufferPool::with_max_workers(2).expect("构造池失败"));

        let handles: Vec<_> = (0..2i32)
            .map(|worker| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for seq in 0..2u16 {
                        // SAFETY: 每个线程独占逻辑索引 `worker`，排空在 join 之后进行。
                        unsafe { pool.enqueue_shared(worker, &(worker as u16 * 100 + seq)) };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("生产者线程 panic");
        }

        assert!(pool.slot(DEFAULT_WORKER_INDEX).is_empty());
        let mut page = [0u8; 16];
        let mut reader = pool.reader();
        let written = reader.copy_into(&mut page);
        let values: Vec<u16> = decode_records(&page[..written]).collect();
        assert_eq!(values, vec![0, 1, 100, 101]);
    });
}

#[test]
fn default_slot_writer_runs_beside_worker_writer() {
    model(|| {
        let pool = Arc::new(WorkerBufferPool::with_max_workers(1).expect("构造池失败"));

        let worker = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                // SAFETY: 逻辑索引 0 仅由该线程写入。
                unsafe { pool.enqueue_shared(0, &7u8) };
            })
        };
        // SAFETY: 默认槽位仅由当前线程写入。
        unsafe { pool.enqueue_shared(DEFAULT_WORKER_INDEX, &3u8) };
        worker.join().expect("生产者线程 panic");

        assert_eq!(pool.size(), 2);
        let mut page = [0u8; 2];
        assert_eq!(pool.reader().copy_into(&mut page), 2);
        assert_eq!(page, [3, 7]);
    });
}
