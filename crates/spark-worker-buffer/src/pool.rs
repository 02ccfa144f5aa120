use core::fmt;

use tracing::debug;

use crate::{
    config::WorkerBufferConfig,
    error::{Result, WorkerBufferError},
    reader::DrainReader,
    record::Record,
    slot::AppendSlot,
    sync::SlotCell,
};

/// 默认（未分配 worker）槽位的逻辑索引，对应物理索引 0。
pub const DEFAULT_WORKER_INDEX: i32 = -1;

/// `WorkerBufferPool` 为每个可能的并发 worker 持有一个只追加槽位，外加一个默认槽位。
///
/// # 模块角色（Why）
/// - 并行生产阶段，每个 worker 只触碰自己的槽位，追加路径上没有锁、没有原子操作；
/// - 生产结束后由单个 [`DrainReader`] 以确定顺序（默认槽位在前、逻辑索引升序）排空全部数据。
///
/// # 核心机制（How）
/// - 构造时一次性分配 `max_workers + 1` 个槽位头部组成的连续数组，释放时整体归还；
/// - 逻辑索引范围 `[-1, max_workers - 1]`，物理索引 = 逻辑索引 + 1；
/// - 所有按索引访问的操作都经由同一个越界校验入口，越界属于调度器缺陷，直接 panic，绝不截断到合法范围。
///
/// # 契约说明（What）
/// - **写入**：安全 API 要求 `&mut self`（[`enqueue`](Self::enqueue)）或先拆分出互不重叠的
///   [`SlotProducer`]（[`producers`](Self::producers)）；仅能共享 `&self` 的调度器使用
///   `unsafe` 的 [`enqueue_shared`](Self::enqueue_shared)；
/// - **排空**：[`reader`](Self::reader) 借用 `&self`，因此在读取器存活期间无法经由安全 API 重置或释放池；
/// - **生命周期**：[`reset`](Self::reset) 截断全部槽位并保留容量；[`dispose`](Self::dispose)
///   消耗 `self`，释放后不可能再被使用。
///
/// # 设计权衡（Trade-offs）
/// - 槽位无容量上限，增长只受进程可用内存约束；
/// - 不提供随机访问或单条删除。
pub struct WorkerBufferPool {
    slots: Box<[SlotCell<AppendSlot>]>,
    max_workers: usize,
}

// SAFETY: 槽位只在以下两种情况下被修改：
// 1. 经由 `&mut self`，借用规则保证独占；
// 2. 经由 `unsafe fn enqueue_shared`，调用方承诺同一逻辑索引同一时刻至多一个访问者。
// 其余 `&self` 路径只读取槽位内容，因此跨线程共享 `&WorkerBufferPool` 不会引入额外的数据竞争。
unsafe impl Sync for WorkerBufferPool {}
// SAFETY: 池独占全部槽位，`AppendSlot` 本身可跨线程移动。
unsafe impl Send for WorkerBufferPool {}

impl WorkerBufferPool {
    /// 按配置构造池，所有槽位以 `initial_slot_capacity` 预分配。
    pub fn new(config: &WorkerBufferConfig) -> Result<Self> {
        config.validate()?;
        let slots: Box<[SlotCell<AppendSlot>]> = (0..config.slot_count())
            .map(|_| SlotCell::new(AppendSlot::with_capacity(config.initial_slot_capacity)))
            .collect();
        debug!(
            max_workers = config.max_workers,
            slot_count = slots.len(),
            initial_slot_capacity = config.initial_slot_capacity,
            "worker buffer pool constructed"
        );
        Ok(Self {
            slots,
            max_workers: config.max_workers,
        })
    }

    /// 以默认槽位容量构造容纳 `max_workers` 个 worker 的池。
    pub fn with_max_workers(max_workers: usize) -> Result<Self> {
        Self::new(&WorkerBufferConfig::new(max_workers))
    }

    /// 可并发写入的 worker 上限。
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 槽位总数，等于 `max_workers + 1`。
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// 逻辑索引是否落在 `[-1, max_workers - 1]` 内。
    pub fn contains_index(&self, logical_index: i32) -> bool {
        self.physical_index(logical_index).is_ok()
    }

    /// 将逻辑索引映射为物理索引，越界时返回 [`WorkerBufferError::InvalidIndex`]。
    fn physical_index(&self, logical_index: i32) -> Result<usize> {
        let physical = i64::from(logical_index) + 1;
        if physical < 0 || physical as u64 >= self.slots.len() as u64 {
            return Err(WorkerBufferError::InvalidIndex {
                index: logical_index,
                max_workers: self.max_workers,
            });
        }
        Ok(physical as usize)
    }

    /// 越界即 panic 的索引解析，所有按索引访问的入口共用。
    #[inline]
    #[track_caller]
    fn resolve(&self, logical_index: i32) -> usize {
        self.physical_index(logical_index)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// 返回逻辑索引对应槽位的独占借用。
    ///
    /// 借用期间池无法被重置或释放，借用也无法逃逸到下一次池变更之后。
    ///
    /// # Panics
    /// 逻辑索引越界时 panic。
    #[track_caller]
    pub fn slot_mut(&mut self, logical_index: i32) -> &mut AppendSlot {
        let physical = self.resolve(logical_index);
        self.slots[physical].get_mut()
    }

    /// 返回逻辑索引对应槽位的只读视图。
    ///
    /// # Panics
    /// 逻辑索引越界时 panic。
    #[track_caller]
    pub fn slot(&self, logical_index: i32) -> &AppendSlot {
        let physical = self.resolve(logical_index);
        self.slot_at(physical)
    }

    #[inline]
    fn slot_at(&self, physical: usize) -> &AppendSlot {
        // SAFETY: 只读访问；并发写入同一槽位被 `enqueue_shared` 的前置条件排除。
        self.slots[physical].with(|ptr| unsafe { &*ptr })
    }

    /// 向逻辑索引对应的槽位追加一条记录。
    ///
    /// # Panics
    /// 逻辑索引越界时 panic。
    #[inline]
    #[track_caller]
    pub fn enqueue<R: Record>(&mut self, logical_index: i32, record: &R) {
        self.slot_mut(logical_index).append_record(record);
    }

    /// 向逻辑索引对应的槽位追加一段已序列化的字节。
    ///
    /// # Panics
    /// 逻辑索引越界时 panic。
    #[inline]
    #[track_caller]
    pub fn append_bytes(&mut self, logical_index: i32, bytes: &[u8]) {
        self.slot_mut(logical_index).append(bytes);
    }

    /// 通过共享引用追加记录，供只能分发 `&WorkerBufferPool` 的外部调度器使用。
    ///
    /// # Safety
    /// - 调用期间，不得有其它线程以任何方式访问同一逻辑索引的槽位：
    ///   包括另一路 `enqueue_shared`、[`slot`](Self::slot)、[`size`](Self::size)、
    ///   [`stats`](Self::stats) 以及正在排空的 [`DrainReader`]；
    /// - 跨越本次调用，任何线程（包括调用方自身）都不得持有由该槽位派生的存活引用，
    ///   例如先前经 [`slot`](Self::slot) 取得的 `&AppendSlot`、经
    ///   [`AppendSlot::as_bytes`] 取得的 `&[u8]` 或 [`AppendSlot::as_ptr`] 返回的裸指针：
    ///   追加可能扩容并搬迁底层内存，此类引用会悬垂；
    /// - [`DrainReader`] 只能在两次调用之间使用，不得与调用重叠；
    /// - 不同逻辑索引之间可以任意并发。
    ///
    /// 同一索引上的并发写入是未定义行为，这是调用契约而非待修复的竞态。
    ///
    /// # Panics
    /// 逻辑索引越界时 panic。
    #[inline]
    #[track_caller]
    pub unsafe fn enqueue_shared<R: Record>(&self, logical_index: i32, record: &R) {
        let physical = self.resolve(logical_index);
        // SAFETY: 调用方保证该槽位此刻只有当前线程访问，且不存在跨越本次调用的存活引用。
        self.slots[physical].with_mut(|ptr| unsafe { (*ptr).append_record(record) });
    }

    /// 将槽位拆分为互不重叠的生产者句柄，按逻辑索引升序排列（默认槽位在首位）。
    ///
    /// 每个句柄都是 `Send`，可分发给 `std::thread::scope` 中的不同线程并行追加。
    pub fn producers(&mut self) -> Vec<SlotProducer<'_>> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(physical, cell)| SlotProducer {
                logical_index: physical as i32 - 1,
                slot: cell.get_mut(),
            })
            .collect()
    }

    /// 全部槽位当前持有的字节总数，O(max_workers)。
    pub fn size(&self) -> usize {
        (0..self.slots.len())
            .map(|physical| self.slot_at(physical).len())
            .sum()
    }

    /// 是否所有槽位均为空。
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// 创建从默认槽位开始排空的读取器。
    pub fn reader(&self) -> DrainReader<'_> {
        DrainReader::from_pool(self)
    }

    /// 将所有槽位截断为空并保留容量，O(max_workers)。返回被丢弃的字节数。
    pub fn reset(&mut self) -> usize {
        let released: usize = self
            .slots
            .iter_mut()
            .map(|cell| cell.get_mut().reset())
            .sum();
        debug!(released_bytes = released, "worker buffer pool reset");
        released
    }

    /// 释放每个槽位的底层内存，随后释放槽位数组本身。返回释放的槽位容量总和。
    pub fn dispose(mut self) -> usize {
        let freed: usize = self
            .slots
            .iter_mut()
            .map(|cell| cell.get_mut().dispose())
            .sum();
        debug!(
            slot_count = self.slots.len(),
            freed_capacity = freed,
            "worker buffer pool disposed"
        );
        freed
    }

    /// 统计快照。
    pub fn stats(&self) -> WorkerBufferStats {
        let mut stats = WorkerBufferStats {
            slot_count: self.slots.len(),
            ..WorkerBufferStats::default()
        };
        for physical in 0..self.slots.len() {
            let slot = self.slot_at(physical);
            stats.used_bytes += slot.len();
            stats.reserved_bytes += slot.capacity();
            if !slot.is_empty() {
                stats.non_empty_slots += 1;
            }
        }
        stats
    }
}

impl fmt::Debug for WorkerBufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerBufferPool")
            .field("max_workers", &self.max_workers)
            .field("slot_count", &self.slots.len())
            .field("size", &self.size())
            .finish()
    }
}

/// 池的统计快照。
///
/// - `slot_count`：槽位总数（含默认槽位）；
/// - `used_bytes`：已写入字节总数，等于 [`WorkerBufferPool::size`]；
/// - `reserved_bytes`：全部槽位的底层容量之和；
/// - `non_empty_slots`：至少持有一个字节的槽位数量。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerBufferStats {
    pub slot_count: usize,
    pub used_bytes: usize,
    pub reserved_bytes: usize,
    pub non_empty_slots: usize,
}

/// 单个槽位的独占生产者句柄，由 [`WorkerBufferPool::producers`] 拆分得到。
#[derive(Debug)]
pub struct SlotProducer<'a> {
    logical_index: i32,
    slot: &'a mut AppendSlot,
}

impl SlotProducer<'_> {
    /// 句柄对应的逻辑索引。
    pub fn logical_index(&self) -> i32 {
        self.logical_index
    }

    /// 追加一条记录。
    #[inline]
    pub fn enqueue<R: Record>(&mut self, record: &R) {
        self.slot.append_record(record);
    }

    /// 追加一段原始字节。
    #[inline]
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.slot.append(bytes);
    }

    /// 槽位当前长度。
    pub fn len(&self) -> usize {
        self.slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }
}

#[cfg(all(test, not(any(loom, spark_loom))))]
mod tests {
    use super::*;
    use crate::slot::DEFAULT_SLOT_CAPACITY;
    use tracing_test::traced_test;

    #[test]
    fn slot_count_includes_default_slot() {
        let pool = WorkerBufferPool::with_max_workers(4).expect("构造池失败");
        assert_eq!(pool.max_workers(), 4);
        assert_eq!(pool.slot_count(), 5);
        assert!(pool.is_empty());
        let stats = pool.stats();
        assert_eq!(stats.slot_count, 5);
        assert!(stats.reserved_bytes >= 5 * DEFAULT_SLOT_CAPACITY);
    }

    #[test]
    fn physical_index_is_logical_plus_one() {
        let pool = WorkerBufferPool::with_max_workers(3).expect("构造池失败");
        assert_eq!(pool.physical_index(DEFAULT_WORKER_INDEX), Ok(0));
        assert_eq!(pool.physical_index(0), Ok(1));
        assert_eq!(pool.physical_index(2), Ok(3));
        assert!(pool.physical_index(3).is_err());
        assert!(pool.physical_index(-2).is_err());
        assert!(pool.physical_index(i32::MIN).is_err());
        assert!(pool.physical_index(i32::MAX).is_err());
    }

    #[test]
    fn enqueue_routes_to_matching_slot() {
        let mut pool = WorkerBufferPool::with_max_workers(2).expect("构造池失败");
        pool.enqueue(DEFAULT_WORKER_INDEX, &1u8);
        pool.enqueue(1, &0x0203u16);
        assert_eq!(pool.slot(DEFAULT_WORKER_INDEX).as_bytes(), &[1]);
        assert!(pool.slot(0).is_empty());
        assert_eq!(pool.slot(1).as_bytes(), &0x0203u16.to_ne_bytes());
        assert_eq!(pool.size(), 3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn enqueue_past_last_worker_panics() {
        let mut pool = WorkerBufferPool::with_max_workers(2).expect("构造池失败");
        pool.enqueue(2, &0u32);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn slot_mut_below_default_panics() {
        let mut pool = WorkerBufferPool::with_max_workers(2).expect("构造池失败");
        pool.slot_mut(-2);
    }

    #[test]
    fn producers_cover_every_logical_index() {
        let mut pool = WorkerBufferPool::with_max_workers(3).expect("构造池失败");
        let indices: Vec<i32> = pool.producers().iter().map(SlotProducer::logical_index).collect();
        assert_eq!(indices, vec![-1, 0, 1, 2]);
    }

    #[test]
    fn stats_count_non_empty_slots() {
        let mut pool = WorkerBufferPool::with_max_workers(3).expect("构造池失败");
        pool.append_bytes(0, &[1, 2, 3]);
        pool.append_bytes(2, &[4]);
        let stats = pool.stats();
        assert_eq!(stats.used_bytes, 4);
        assert_eq!(stats.non_empty_slots, 2);
    }

    /// 共享追加触发扩容后，必须重新取得视图；重新取得的视图包含扩容前后的全部字节。
    #[test]
    fn shared_append_growth_is_observed_through_fresh_views() {
        let pool = WorkerBufferPool::with_max_workers(1).expect("构造池失败");
        // SAFETY: 单线程；每次调用前后均无由槽位 0 派生的存活引用。
        unsafe { pool.enqueue_shared(0, &1u8) };
        let before = pool.slot(0).capacity();
        assert_eq!(pool.slot(0).as_bytes(), &[1]);

        for seq in 0..200u8 {
            // SAFETY: 同上，上一条断言取得的视图已在语句结束时失效。
            unsafe { pool.enqueue_shared(0, &seq) };
        }

        let slot = pool.slot(0);
        assert!(slot.capacity() > before, "追加应触发扩容");
        assert_eq!(slot.len(), 201);
        assert_eq!(slot.as_bytes()[0], 1);
        let tail: Vec<u8> = (0..200u8).collect();
        assert_eq!(&slot.as_bytes()[1..], tail.as_slice());
    }

    #[test]
    #[traced_test]
    fn reset_and_dispose_are_logged() {
        let mut pool = WorkerBufferPool::with_max_workers(2).expect("构造池失败");
        pool.append_bytes(1, &[9; 10]);
        assert_eq!(pool.reset(), 10);
        assert!(logs_contain("worker buffer pool reset"));
        assert!(logs_contain("released_bytes=10"));
        let freed = pool.dispose();
        assert!(freed >= 3 * DEFAULT_SLOT_CAPACITY);
        assert!(logs_contain("worker buffer pool disposed"));
    }
}
