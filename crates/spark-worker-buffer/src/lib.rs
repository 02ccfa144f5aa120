//! `spark-worker-buffer` 提供面向并行生产者的 per-worker 追加缓冲池。
//!
//! # 模块定位（Why）
//! - 并行阶段中每个工作线程独占一个追加槽位（slot），写入序列化记录时无需任何锁或原子操作；
//! - 生产结束后由单一消费者通过 [`DrainReader`] 按固定顺序排空所有槽位，
//!   写入外部提供的定长页面或任意 `bytes::BufMut`。
//!
//! # 设计概要（How）
//! - `slot` 模块实现 [`AppendSlot`]：基于 `bytes::BytesMut` 的只追加字节缓冲，重置时保留容量；
//! - `pool` 模块实现 [`WorkerBufferPool`]：一次性分配 `max_workers + 1` 个槽位，
//!   逻辑索引 `-1` 为默认槽位，物理索引 = 逻辑索引 + 1；
//! - `reader` 模块实现 [`DrainReader`]：可复制的游标，跨多次调用、跨槽位边界续读；
//! - `config` 与 `error` 模块分别承载配置加载与稳定错误码。
//!
//! # 并发契约（What）
//! - 安全 API 通过借用规则保证“一个槽位同一时刻只有一个写者”：
//!   [`WorkerBufferPool::producers`] 拆分出互不重叠的 [`SlotProducer`]；
//! - 只能共享 `&WorkerBufferPool` 的调度器可使用 `unsafe` 的
//!   [`WorkerBufferPool::enqueue_shared`]，由调用方承担单写者前置条件；
//! - 排空严格单消费者：两个读取器并发排空同一个池会重复读取同一份实时数据。

mod sync;

pub mod config;
pub mod error;
pub mod pool;
pub mod reader;
pub mod record;
pub mod slot;

pub use config::{MAX_WORKER_LIMIT, WorkerBufferConfig};
pub use error::{Result, WorkerBufferError};
pub use pool::{DEFAULT_WORKER_INDEX, SlotProducer, WorkerBufferPool, WorkerBufferStats};
pub use reader::DrainReader;
pub use record::{Record, decode_records};
pub use slot::{AppendSlot, DEFAULT_SLOT_CAPACITY};
