//! 信号处理机制
//!
//! 遵循 Linux 内核的信号设计 (kernel/signal.c, include/linux/signal.h)
//!
//! 驱动只关心一件事：等待中的任务是否有待处理信号。
//! 因此这里只保留信号编号和待处理信号位图，信号的投递和唤醒
//! 由 [`crate::process::Task::send_signal`] 完成。

use core::sync::atomic::{AtomicU64, Ordering};

/// 信号编号类型
pub type SigType = i32;

/// 标准信号定义
///
/// 对应 Linux 的 signal 定义 (include/uapi/asm-generic/signal.h)
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    /// SIGHUP - 挂起
    SIGHUP = 1,
    /// SIGINT - 中断 (Ctrl+C)
    SIGINT = 2,
    /// SIGQUIT - 退出
    SIGQUIT = 3,
    /// SIGKILL - 强制杀死 (不可捕获/忽略)
    SIGKILL = 9,
    /// SIGUSR1 - 用户定义信号1
    SIGUSR1 = 10,
    /// SIGUSR2 - 用户定义信号2
    SIGUSR2 = 12,
    /// SIGALRM - 定时器
    SIGALRM = 14,
    /// SIGTERM - 终止
    SIGTERM = 15,
}

impl Signal {
    #[inline]
    pub const fn as_i32(self) -> SigType {
        self as SigType
    }
}

/// 最大信号编号，与 SigPending 的位宽一致
pub const SIGRTMAX: SigType = 64;

/// 待处理信号集合
///
/// 对应 Linux 的 struct sigpending (include/linux/signal.h)
#[derive(Debug, Default)]
pub struct SigPending {
    /// 待处理信号位图 (64位，支持信号1-64)
    signal: AtomicU64,
}

impl SigPending {
    /// 创建新的待处理信号集合
    pub const fn new() -> Self {
        Self {
            signal: AtomicU64::new(0),
        }
    }

    #[inline]
    fn mask(sig: SigType) -> Option<u64> {
        if !(1..=SIGRTMAX).contains(&sig) {
            return None;
        }
        Some(1u64 << (sig - 1))
    }

    /// 添加信号，编号越界时忽略
    pub fn add(&self, sig: SigType) {
        if let Some(mask) = Self::mask(sig) {
            self.signal.fetch_or(mask, Ordering::AcqRel);
        }
    }

    /// 删除信号
    pub fn remove(&self, sig: SigType) {
        if let Some(mask) = Self::mask(sig) {
            self.signal.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    /// 检查某个信号是否待处理
    pub fn has(&self, sig: SigType) -> bool {
        match Self::mask(sig) {
            Some(mask) => (self.signal.load(Ordering::Acquire) & mask) != 0,
            None => false,
        }
    }

    /// 是否有任意待处理信号
    pub fn any(&self) -> bool {
        self.signal.load(Ordering::Acquire) != 0
    }

    /// 获取第一个待处理信号
    pub fn first(&self) -> Option<SigType> {
        let signals = self.signal.load(Ordering::Acquire);
        if signals == 0 {
            return None;
        }
        Some(signals.trailing_zeros() as SigType + 1)
    }

    /// 清空所有信号
    pub fn clear(&self) {
        self.signal.store(0, Ordering::Release);
    }

    /// 获取所有待处理信号
    pub fn get_all(&self) -> u64 {
        self.signal.load(Ordering::Acquire)
    }
}
