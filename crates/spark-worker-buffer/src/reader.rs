use core::ptr;

use bytes::BufMut;
use tracing::trace;

use crate::{
    error::{Result, WorkerBufferError},
    pool::{DEFAULT_WORKER_INDEX, WorkerBufferPool},
};

/// `DrainReader` 是排空 [`WorkerBufferPool`] 的可续读游标。
///
/// # 设计动机（Why）
/// - 外部消费者通常以定长页面承接数据，总数据量却是可变的；
///   游标必须能在任意位置（包括槽位中间）停下，并在下一次调用时从下一个字节继续，
///   不跳过、不重复。
///
/// # 结构设计（How）
/// - 持有池的共享借用（不拥有任何内存，也不负责释放）以及三项位置状态：
///   生命周期内累计写出的字节数、当前槽位内已消费的偏移、当前槽位的逻辑索引；
/// - 每次读取都访问槽位的实时长度：尚未到达的槽位、以及正在排空的槽位上的后续追加都可见，
///   已经完整越过的槽位不会被再次访问。
///
/// # 契约说明（What）
/// - 类型可复制；复制出的游标与原游标各自独立推进，
///   两个游标排空同一个池会重复产出同一份数据，排空必须保持单消费者；
/// - 借用关系保证读取器存活期间池无法经由安全 API 被重置或释放。
#[derive(Clone, Copy, Debug)]
pub struct DrainReader<'a> {
    pool: &'a WorkerBufferPool,
    bytes_written: usize,
    slot_offset: usize,
    current_index: i32,
}

impl<'a> DrainReader<'a> {
    /// 创建位于默认槽位起点的游标，O(1)，不复制任何槽位内容。
    pub fn from_pool(pool: &'a WorkerBufferPool) -> Self {
        Self {
            pool,
            bytes_written: 0,
            slot_offset: 0,
            current_index: DEFAULT_WORKER_INDEX,
        }
    }

    /// 游标生命周期内累计写出的字节数。
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// 当前所在槽位的逻辑索引；全部排空后等于 `max_workers`。
    pub fn current_index(&self) -> i32 {
        self.current_index
    }

    /// 当前槽位内已消费的字节偏移。
    pub fn slot_offset(&self) -> usize {
        self.slot_offset
    }

    /// 从游标位置起尚未排空的字节数。
    pub fn remaining(&self) -> usize {
        let mut remaining = 0usize;
        let mut index = self.current_index;
        while index < self.end_index() {
            remaining += self.pool.slot(index).len();
            index += 1;
        }
        remaining.saturating_sub(self.slot_offset)
    }

    /// 从游标位置起是否已无可读数据。
    pub fn is_drained(&self) -> bool {
        self.remaining() == 0
    }

    /// 将至多 `max_bytes` 字节拷贝到裸指针 `dst`，返回本次写出的字节数。
    ///
    /// 返回 0 表示从当前位置起池已排空。
    ///
    /// # Errors
    /// `dst` 为空指针时返回 [`WorkerBufferError::NullDestination`]，且不推进游标。
    ///
    /// # Safety
    /// - `dst` 必须指向至少 `max_bytes` 字节的可写内存；
    /// - 该内存区域不得与池中任何槽位重叠。
    pub unsafe fn copy_to(&mut self, dst: *mut u8, max_bytes: usize) -> Result<usize> {
        if dst.is_null() {
            return Err(WorkerBufferError::NullDestination);
        }
        let mut cursor = dst;
        let written = self.drain_with(max_bytes, |chunk| {
            // SAFETY: `drain_with` 保证累计长度不超过 `max_bytes`，调用方保证目标区域足够大且不重叠。
            unsafe {
                ptr::copy_nonoverlapping(chunk.as_ptr(), cursor, chunk.len());
                cursor = cursor.add(chunk.len());
            }
        });
        Ok(written)
    }

    /// 填充 `dst`，返回写出的字节数；`dst.len()` 即本次上限。
    pub fn copy_into(&mut self, dst: &mut [u8]) -> usize {
        let mut filled = 0usize;
        self.drain_with(dst.len(), |chunk| {
            dst[filled..filled + chunk.len()].copy_from_slice(chunk);
            filled += chunk.len();
        })
    }

    /// 向任意 [`BufMut`] 写入至多 `max_bytes` 字节（同时受 `remaining_mut` 约束）。
    pub fn copy_into_buf<B>(&mut self, dst: &mut B, max_bytes: usize) -> usize
    where
        B: BufMut + ?Sized,
    {
        let budget = max_bytes.min(dst.remaining_mut());
        self.drain_with(budget, |chunk| dst.put_slice(chunk))
    }

    /// 逻辑索引的开区间上界。
    fn end_index(&self) -> i32 {
        // `max_workers` 已由配置校验约束在 `i32::MAX` 以内。
        self.pool.max_workers() as i32
    }

    /// 排空核心：按逻辑索引升序把槽位字节交给 `sink`，累计不超过 `max_bytes`。
    ///
    /// 1. 空槽位直接跳过，不改动槽位内偏移；
    /// 2. 每个非空槽位写出 `min(剩余额度, 槽位剩余字节)`，跨槽位时继续写入同一次调用；
    /// 3. 槽位被完整消费后偏移归零并前进到下一个索引；
    /// 4. 额度在槽位中途耗尽时立即返回，偏移停在槽位中间供下一次调用续读。
    fn drain_with<F>(&mut self, max_bytes: usize, mut sink: F) -> usize
    where
        F: FnMut(&[u8]),
    {
        let pool = self.pool;
        let end = self.end_index();
        let mut written = 0usize;
        while self.current_index < end {
            let slot = pool.slot(self.current_index);
            let slot_len = slot.len();
            if slot_len == 0 {
                self.current_index += 1;
                continue;
            }
            if written == max_bytes {
                break;
            }

            let pending = &slot.as_bytes()[self.slot_offset..];
            let amount = pending.len().min(max_bytes - written);
            sink(&pending[..amount]);
            written += amount;
            self.bytes_written += amount;
            if written > max_bytes {
                let err = WorkerBufferError::InternalConsistency { written, max_bytes };
                panic!("{err}");
            }

            self.slot_offset += amount;
            if self.slot_offset >= slot_len {
                self.slot_offset = 0;
                self.current_index += 1;
            } else {
                break;
            }
        }
        trace!(
            written,
            max_bytes,
            total_written = self.bytes_written,
            current_index = self.current_index,
            slot_offset = self.slot_offset,
            "drain reader copy"
        );
        written
    }
}
