//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 标准错误代码定义
//!
//! 和 include/uapi/asm-generic/errno-base.h 以及内核内部的
//! include/linux/errno.h（ERESTARTSYS 等不暴露给用户态的错误码）

use core::fmt;

/// 标准错误代码
///
/// 使用方法：
/// ```rust
/// use synch_semaphore::errno::Errno;
///
/// // 系统调用风格，返回负数
/// let ret = Errno::BadAddress.as_neg_isize();
/// assert_eq!(ret, -14);
/// ```
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// No such file or directory (ENOENT, 2)
    NoSuchFileOrDirectory = 2,

    /// Interrupted system call (EINTR, 4)
    InterruptedSystemCall = 4,

    /// No such device or address (ENXIO, 6)
    NoSuchDeviceOrAddress = 6,

    /// Bad file number (EBADF, 9)
    BadFileNumber = 9,

    /// Bad address (EFAULT, 14)
    BadAddress = 14,

    /// Device or resource busy (EBUSY, 16)
    DeviceOrResourceBusy = 16,

    /// File exists (EEXIST, 17)
    FileExists = 17,

    /// No such device (ENODEV, 19)
    NoSuchDevice = 19,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// 系统调用应当被重启 (ERESTARTSYS, 512)
    ///
    /// 仅在内核内部使用，信号处理完成后由系统调用层转换为 EINTR 或重启
    RestartSys = 512,
}

impl Errno {
    /// 获取错误代码的正数值（用于比较）
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取错误代码的负数值（用于系统调用返回）
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }

    /// 获取错误代码的负数值（ssize_t，用于 read/write 返回）
    #[inline]
    pub const fn as_neg_isize(self) -> isize {
        -(self as i32) as isize
    }

    /// 从正数错误码转换
    pub fn from_i32(code: i32) -> Option<Self> {
        let errno = match code {
            constants::ENOENT => Errno::NoSuchFileOrDirectory,
            constants::EINTR => Errno::InterruptedSystemCall,
            constants::ENXIO => Errno::NoSuchDeviceOrAddress,
            constants::EBADF => Errno::BadFileNumber,
            constants::EFAULT => Errno::BadAddress,
            constants::EBUSY => Errno::DeviceOrResourceBusy,
            constants::EEXIST => Errno::FileExists,
            constants::ENODEV => Errno::NoSuchDevice,
            constants::EINVAL => Errno::InvalidArgument,
            constants::ERESTARTSYS => Errno::RestartSys,
            _ => return None,
        };
        Some(errno)
    }

    /// 错误码的符号名
    pub const fn name(self) -> &'static str {
        match self {
            Errno::NoSuchFileOrDirectory => "ENOENT",
            Errno::InterruptedSystemCall => "EINTR",
            Errno::NoSuchDeviceOrAddress => "ENXIO",
            Errno::BadFileNumber => "EBADF",
            Errno::BadAddress => "EFAULT",
            Errno::DeviceOrResourceBusy => "EBUSY",
            Errno::FileExists => "EEXIST",
            Errno::NoSuchDevice => "ENODEV",
            Errno::InvalidArgument => "EINVAL",
            Errno::RestartSys => "ERESTARTSYS",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}

impl std::error::Error for Errno {}

/// 常用的错误代码常量
pub mod constants {
    pub const ENOENT: i32 = 2;
    pub const EINTR: i32 = 4;
    pub const ENXIO: i32 = 6;
    pub const EBADF: i32 = 9;
    pub const EFAULT: i32 = 14;
    pub const EBUSY: i32 = 16;
    pub const EEXIST: i32 = 17;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ERESTARTSYS: i32 = 512;
}
