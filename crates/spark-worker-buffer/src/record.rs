use bytemuck::Pod;

/// 可追加到槽位中的定长记录。
///
/// # 契约说明（What）
/// - 记录按原始字节拷贝，因此必须具备编译期已知的固定布局，且不含指针、引用或填充字节；
/// - 该约束由 [`bytemuck::Pod`] 表达，任何 `Pod` 类型都自动实现本 trait；
/// - 槽位以字节对齐存储记录，读取方应使用 [`decode_records`] 这类非对齐读取路径。
pub trait Record: Pod {}

impl<T: Pod> Record for T {}

/// 返回记录的原始字节视图。
#[inline]
pub fn record_bytes<R: Record>(record: &R) -> &[u8] {
    bytemuck::bytes_of(record)
}

/// 将排空得到的字节流按 `R` 的尺寸切分并逐条解码。
///
/// 末尾不足一条记录的残余字节会被忽略，调用方若按页排空，
/// 应在拼接相邻页之后再解码，以免截断跨页记录。零尺寸类型没有可切分的字节，传入时会 panic。
pub fn decode_records<R: Record>(bytes: &[u8]) -> impl Iterator<Item = R> + '_ {
    bytes
        .chunks_exact(size_of::<R>())
        .map(bytemuck::pod_read_unaligned::<R>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Sample {
        id: u32,
        weight: u16,
        flags: u16,
    }

    #[test]
    fn decode_records_reads_unaligned_sequence() {
        let records = [
            Sample {
                id: 7,
                weight: 3,
                flags: 1,
            },
            Sample {
                id: 11,
                weight: 5,
                flags: 0,
            },
        ];
        let mut raw = vec![0xAAu8];
        for record in &records {
            raw.extend_from_slice(record_bytes(record));
        }
        let decoded: Vec<Sample> = decode_records(&raw[1..]).collect();
        assert_eq!(decoded, records);
    }

    #[test]
    fn trailing_partial_record_is_ignored() {
        let raw = [1u8, 0, 0, 0, 9, 9];
        let decoded: Vec<u32> = decode_records(&raw).collect();
        assert_eq!(decoded, vec![1]);
    }
}
