//! 睡眠延迟
//!
//! 对应 Linux 的 msleep() (kernel/time/timer.c)：以
//! TASK_UNINTERRUPTIBLE 状态睡眠指定的毫秒数，信号不会提前结束睡眠。
//!
//! 驱动中的“硬件读取延迟”通过 [`HardwareDelay`] 注入，测试可以替换为
//! 零延迟或带检测逻辑的实现，而不需要改动驱动本身。

use std::time::Duration;

use crate::process::{Task, TaskState};

/// 以不可中断状态睡眠 `msecs` 毫秒
///
/// 睡眠期间被 wake_up() 提前唤醒时会继续睡完剩余时间
pub fn msleep(task: &Task, msecs: u64) {
    let mut timeout = Duration::from_millis(msecs);
    while !timeout.is_zero() {
        task.set_state(TaskState::Uninterruptible);
        timeout = task.schedule_timeout(timeout);
    }
}

/// 模拟硬件操作耗时的策略
pub trait HardwareDelay: Send + Sync {
    /// 在临界区内调用，阻塞调用者直到“硬件”完成
    fn delay(&self, task: &Task);
}

/// 固定时长的 msleep 延迟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msleep {
    msecs: u64,
}

impl Msleep {
    pub const fn new(msecs: u64) -> Self {
        Self { msecs }
    }

    pub const fn msecs(&self) -> u64 {
        self.msecs
    }
}

impl HardwareDelay for Msleep {
    fn delay(&self, task: &Task) {
        msleep(task, self.msecs);
    }
}

/// 不延迟
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl HardwareDelay for NoDelay {
    fn delay(&self, _task: &Task) {}
}

impl<D: HardwareDelay + ?Sized> HardwareDelay for std::sync::Arc<D> {
    fn delay(&self, task: &Task) {
        (**self).delay(task);
    }
}

impl<D: HardwareDelay + ?Sized> HardwareDelay for Box<D> {
    fn delay(&self, task: &Task) {
        (**self).delay(task);
    }
}
