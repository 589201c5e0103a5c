//! synch_semaphore - 信号量同步字符设备驱动
//!
//! 一个只支持 read 的字符设备：每次 read 在信号量保护的临界区内
//! 睡眠一段时间模拟慢速硬件，然后返回递增的计数值。并发的 read
//! 被信号量串行化，等待中的进程可以被信号打断。
//!
//! 模块划分：
//! - `drivers::synch_semaphore`: 设备本体与模块加载/卸载
//! - `sync`: 信号量与互斥锁
//! - `process`: 任务的睡眠/唤醒
//! - `signal`: 待处理信号
//! - `fs`: 字符设备注册与文件对象
//! - `uaccess`: copy_to_user
//! - `time`: msleep 与可注入的硬件延迟
//! - `config`: Driver.toml 配置
//! - `print`: 日志后端

pub mod config;
pub mod drivers;
pub mod errno;
pub mod fs;
pub mod print;
pub mod process;
pub mod signal;
pub mod sync;
pub mod time;
pub mod uaccess;

pub use drivers::synch_semaphore::{DriverError, SynchSemaphoreDevice, SynchSemaphoreModule};
