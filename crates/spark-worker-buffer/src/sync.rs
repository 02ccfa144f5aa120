//! 槽位内部可变性的统一外壳。
//!
//! 常规构建使用 `core::cell::UnsafeCell`；在 `--cfg loom` 下切换为 Loom 的实现，
//! 让模型检查能够追踪每个槽位的读写交错。两种实现对外暴露同一组 `with`/`with_mut` 接口。

#[cfg(not(any(loom, spark_loom)))]
#[derive(Debug)]
pub(crate) struct SlotCell<T>(core::cell::UnsafeCell<T>);

#[cfg(not(any(loom, spark_loom)))]
impl<T> SlotCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(core::cell::UnsafeCell::new(value))
    }

    #[inline(always)]
    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        f(self.0.get())
    }

    #[inline(always)]
    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        f(self.0.get())
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }
}

#[cfg(any(loom, spark_loom))]
pub(crate) struct SlotCell<T>(loom::cell::UnsafeCell<T>);

#[cfg(any(loom, spark_loom))]
impl<T> SlotCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(loom::cell::UnsafeCell::new(value))
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(*const T) -> R) -> R {
        self.0.with(f)
    }

    pub(crate) fn with_mut<R>(&self, f: impl FnOnce(*mut T) -> R) -> R {
        self.0.with_mut(f)
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        // SAFETY: `&mut self` 保证独占访问。
        self.0.with_mut(|ptr| unsafe { &mut *ptr })
    }
}
