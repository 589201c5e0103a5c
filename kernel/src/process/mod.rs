//! 进程管理模块
//!
//! 驱动只需要任务的睡眠/唤醒与信号部分：
//! - `task`: 任务控制块 (task_struct 的子集)

pub mod task;

pub use task::{Pid, Task, TaskState};
