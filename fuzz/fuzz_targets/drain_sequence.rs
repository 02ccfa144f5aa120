#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spark_worker_buffer::WorkerBufferPool;

/// Fuzz 输入：池规模与一串交错的追加、排空、重置操作。
///
/// - **Why**：续读游标在“页面恰好停在槽位末尾”“空槽位相邻”“重置后复用”等组合下最容易出错，
///   由 Fuzzer 穷举操作序列比手写用例覆盖更广。
/// - **How**：每个用例维护一份影子模型（每个物理槽位的期望字节），每步操作后与真实池比对。
/// - **What**：任一读取器的输出必须逐字节等于影子模型按索引升序拼接后的对应区间。
#[derive(Debug, Arbitrary)]
struct DrainCase {
    max_workers: u8,
    ops: Vec<PoolOp>,
}

#[derive(Debug, Arbitrary)]
enum PoolOp {
    /// 向 `index` 对应槽位追加 `len` 个字节（内容由序号派生）。
    Append { index: u8, len: u8 },
    /// 新建读取器，按 `pages` 循环给出页面尺寸反复排空，直到返回 0。
    Drain { pages: Vec<u8> },
    /// 重置池。
    Reset,
}

fuzz_target!(|case: DrainCase| {
    let max_workers = usize::from(case.max_workers % 16) + 1;
    let Ok(mut pool) = WorkerBufferPool::with_max_workers(max_workers) else {
        return;
    };
    let mut shadow: Vec<Vec<u8>> = vec![Vec::new(); max_workers + 1];
    let mut stamp = 0u8;

    for op in case.ops {
        match op {
            PoolOp::Append { index, len } => {
                let logical = i32::from(index) % (max_workers as i32 + 1) - 1;
                let bytes: Vec<u8> = (0..len)
                    .map(|_| {
                        stamp = stamp.wrapping_add(1);
                        stamp
                    })
                    .collect();
                pool.append_bytes(logical, &bytes);
                shadow[(logical + 1) as usize].extend_from_slice(&bytes);
            }
            PoolOp::Drain { pages } => {
                let expected = shadow.concat();
                let mut reader = pool.reader();
                let mut drained = Vec::with_capacity(expected.len());
                // 页面尺寸 0 不推进游标，过滤掉以保证循环终止。
                let pages: Vec<usize> = pages
                    .into_iter()
                    .filter(|page| *page > 0)
                    .map(usize::from)
                    .collect();
                if pages.is_empty() {
                    continue;
                }
                for page_size in pages.iter().cycle() {
                    let mut page = vec![0u8; *page_size];
                    let written = reader.copy_into(&mut page);
                    let outstanding = expected.len() - drained.len();
                    assert_eq!(written, (*page_size).min(outstanding), "额度内必须写满");
                    if written == 0 {
                        break;
                    }
                    drained.extend_from_slice(&page[..written]);
                }
                assert_eq!(drained, expected);
                assert_eq!(reader.bytes_written(), expected.len());
                assert!(reader.is_drained());
            }
            PoolOp::Reset => {
                pool.reset();
                shadow.iter_mut().for_each(Vec::clear);
                assert_eq!(pool.size(), 0);
            }
        }
        assert_eq!(pool.size(), shadow.iter().map(Vec::len).sum::<usize>());
    }
});
