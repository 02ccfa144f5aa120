//! 缓冲池配置。
//!
//! # 设计背景（Why）
//! - `max_workers` 代表宿主环境可能同时呈现的最大 worker 数量，池构造后即不可变；
//! - 若该值只能在运行时获知（例如取决于 CPU 数），应在构造前调用一次
//!   [`WorkerBufferConfig::detect`]，此后视为常量。
//!
//! # 契约说明（What）
//! - 支持以 TOML 文本描述配置，缺省字段使用默认值，未知字段视为解析错误；
//! - 所有构造路径最终都经过 [`WorkerBufferConfig::validate`]。

use std::{num::NonZeroUsize, thread};

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::{Result, WorkerBufferError},
    slot::DEFAULT_SLOT_CAPACITY,
};

/// 逻辑索引以 `i32` 表达，`max_workers` 不得超过其正向取值范围。
pub const MAX_WORKER_LIMIT: usize = i32::MAX as usize;

/// 缓冲池构造参数。
///
/// # 字段说明
/// - `max_workers`：可同时写入的 worker 上限，逻辑索引范围为 `[-1, max_workers - 1]`；
/// - `initial_slot_capacity`：每个槽位的初始容量，默认 [`DEFAULT_SLOT_CAPACITY`]。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerBufferConfig {
    pub max_workers: usize,
    #[serde(default = "default_slot_capacity")]
    pub initial_slot_capacity: usize,
}

fn default_slot_capacity() -> usize {
    DEFAULT_SLOT_CAPACITY
}

impl WorkerBufferConfig {
    /// 以给定 worker 上限与默认槽位容量构造配置。
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            initial_slot_capacity: DEFAULT_SLOT_CAPACITY,
        }
    }

    /// 覆盖槽位初始容量。
    pub fn with_initial_slot_capacity(mut self, capacity: usize) -> Self {
        self.initial_slot_capacity = capacity;
        self
    }

    /// 查询宿主的可用并行度并据此生成配置。
    ///
    /// 查询失败时退化为单 worker；结果应在池构造前获取一次并保持不变。
    pub fn detect() -> Self {
        let max_workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        debug!(max_workers, "detected host parallelism for worker buffer pool");
        Self::new(max_workers)
    }

    /// 从 TOML 文本解析并校验配置。
    ///
    /// ```toml
    /// max_workers = 16
    /// initial_slot_capacity = 256
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|err| WorkerBufferError::ConfigDecode {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验 worker 上限。
    ///
    /// `max_workers == 0` 合法：池只含默认槽位，逻辑索引范围退化为 `[-1, -1]`。
    pub fn validate(&self) -> Result<()> {
        if self.max_workers > MAX_WORKER_LIMIT {
            return Err(WorkerBufferError::invalid_config(format!(
                "max_workers {} exceeds the logical index limit {MAX_WORKER_LIMIT}",
                self.max_workers
            )));
        }
        Ok(())
    }

    /// 槽位总数（含默认槽位）。
    pub fn slot_count(&self) -> usize {
        self.max_workers + 1
    }
}
