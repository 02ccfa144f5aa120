//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为缓冲池对外暴露的失败语义提供集中定义，并为每类失败分配稳定的点分错误码；
//! - 区分“可返回”的错误（空目标指针、配置非法）与“致命”的前置条件违例（越界索引、排空算法自检失败）。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 [`thiserror::Error`]，与 `std::error::Error` 生态兼容；
//! - 致命类错误不会以 `Err` 返回，而是以其 `Display` 文本作为 panic 负载立即终止当前调用；
//! - 内存分配失败交由全局分配器的 OOM 处理，不在本 crate 中建模。

use std::borrow::Cow;

use thiserror::Error;

/// 缓冲池错误码集合，命名沿用 `<领域>.<原因>` 的点分风格。
pub mod codes {
    /// 调用参数非法，例如 `copy_to` 收到空目标指针。
    pub const INVALID_ARGUMENT: &str = "buffer.invalid_argument";
    /// 逻辑 worker 索引越界。
    pub const INVALID_INDEX: &str = "buffer.invalid_index";
    /// 单次排空写入量超过调用方上限，属于算法内部缺陷。
    pub const INTERNAL_CONSISTENCY: &str = "buffer.internal_consistency";
    /// 配置值未通过校验。
    pub const INVALID_CONFIG: &str = "buffer.invalid_config";
    /// 配置文本无法解析。
    pub const CONFIG_DECODE: &str = "buffer.config_decode";
}

/// `spark-worker-buffer` 的统一结果别名。
pub type Result<T, E = WorkerBufferError> = core::result::Result<T, E>;

/// 缓冲池错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把调度器缺陷、调用方误用与配置错误归入同一枚举，
///   便于日志与告警按 [`code`](WorkerBufferError::code) 聚合。
/// - **契约 (What)**：
///   - `InvalidIndex` 与 `InternalConsistency` 只作为 panic 文本出现，不会经由 `Result` 返回；
///   - 其余变体通过 `Result` 返回，调用方可据此修正输入。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum WorkerBufferError {
    /// 逻辑索引不在 `[-1, max_workers - 1]` 区间内。
    #[error(
        "logical worker index {index} is out of range for a pool of {max_workers} workers (valid: -1..{max_workers})"
    )]
    InvalidIndex { index: i32, max_workers: usize },

    /// `copy_to` 的目标指针为空。
    #[error("copy_to destination pointer must not be null")]
    NullDestination,

    /// 单次 `copy_to` 写入量超过 `max_bytes`。
    #[error("copy_to wrote {written} bytes while the call allowed at most {max_bytes}")]
    InternalConsistency { written: usize, max_bytes: usize },

    /// 配置值非法。
    #[error("invalid worker buffer configuration: {reason}")]
    InvalidConfig { reason: Cow<'static, str> },

    /// 配置文本解析失败。
    #[error("failed to decode worker buffer configuration: {reason}")]
    ConfigDecode { reason: String },
}

impl WorkerBufferError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            WorkerBufferError::InvalidIndex { .. } => codes::INVALID_INDEX,
            WorkerBufferError::NullDestination => codes::INVALID_ARGUMENT,
            WorkerBufferError::InternalConsistency { .. } => codes::INTERNAL_CONSISTENCY,
            WorkerBufferError::InvalidConfig { .. } => codes::INVALID_CONFIG,
            WorkerBufferError::ConfigDecode { .. } => codes::CONFIG_DECODE,
        }
    }

    /// 是否属于必须立即终止的致命类别。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerBufferError::InvalidIndex { .. } | WorkerBufferError::InternalConsistency { .. }
        )
    }

    pub(crate) fn invalid_config(reason: impl Into<Cow<'static, str>>) -> Self {
        WorkerBufferError::InvalidConfig {
            reason: reason.into(),
        }
    }
}
