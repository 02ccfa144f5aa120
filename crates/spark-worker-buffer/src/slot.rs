use bytes::{BufMut, BytesMut};

use crate::record::{Record, record_bytes};

/// 槽位初始容量（字节）。
pub const DEFAULT_SLOT_CAPACITY: usize = 64;

/// `AppendSlot` 是单个 worker 独占的只追加字节缓冲。
///
/// # 设计动机（Why）
/// - 并行阶段每个 worker 只向自己的槽位追加记录，槽位本身无需任何同步；
/// - 复用 `BytesMut` 的扩容与 `clear` 语义：重置只截断长度、保留容量，下一轮生产无需重新分配。
///
/// # 契约说明（What）
/// - `len() <= capacity()` 恒成立；扩容会搬迁底层内存但保留已写入内容；
/// - [`as_ptr`](Self::as_ptr)/[`as_mut_ptr`](Self::as_mut_ptr) 返回的裸指针在下一次扩容、
///   [`reset`](Self::reset) 或 [`dispose`](Self::dispose) 之后失效；
/// - 槽位按字节对齐存储，记录之间没有填充；
/// - 扩容时的分配失败由全局分配器终止进程，不存在可恢复路径。
#[derive(Debug, Default)]
pub struct AppendSlot {
    buf: BytesMut,
}

impl AppendSlot {
    /// 以默认初始容量创建空槽位。
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SLOT_CAPACITY)
    }

    /// 以指定初始容量创建空槽位。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// 追加原始字节，容量不足时扩容。
    #[inline]
    pub fn append(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.buf.put_slice(bytes);
    }

    /// 追加一条定长记录。
    #[inline]
    pub fn append_record<R: Record>(&mut self, record: &R) {
        self.append(record_bytes(record));
    }

    /// 当前已写入的字节数。
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// 当前底层容量。
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// 已写入内容的只读视图。
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// 已写入内容的可变视图，长度不变。
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// 底层内存起始地址，仅在下一次扩容/重置/释放前有效。
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    /// 底层内存的可写起始地址，仅在下一次扩容/重置/释放前有效。
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.buf.as_mut_ptr()
    }

    /// 截断为空，保留容量。返回被丢弃的字节数。
    pub fn reset(&mut self) -> usize {
        let released = self.buf.len();
        self.buf.clear();
        released
    }

    /// 释放底层内存，槽位变为零容量的空缓冲。返回释放前的容量。
    pub fn dispose(&mut self) -> usize {
        let capacity = self.buf.capacity();
        self.buf = BytesMut::new();
        capacity
    }
}
