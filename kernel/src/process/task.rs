//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 任务控制块 (Task Control Block)
//!
//! 遵循 Linux 内核的 `struct task_struct` 中与睡眠/唤醒相关的部分
//! (include/linux/sched.h, kernel/sched/core.c)
//!
//! 每个调用驱动的 OS 线程对应一个 [`Task`]。任务通过 [`Task::schedule`]
//! 让出 CPU 进入睡眠，直到被 [`Task::wake_up`] 唤醒；处于
//! `Interruptible` 状态的任务还可以被 [`Task::send_signal`] 唤醒。
//!
//! 睡眠使用 Condvar 实现，等待期间不占用 CPU。

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::signal::{SigPending, SigType};

/// 进程 ID
pub type Pid = u32;

/// 进程状态 - 必须与 Linux 完全一致
///
/// 对应 Linux 内核的 task_state_t (include/linux/sched.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TaskState {
    /// 可运行状态 (TASK_RUNNING)
    Running = 0,

    /// 可中断睡眠 (TASK_INTERRUPTIBLE)
    /// 进程在等待某个事件，可被信号唤醒
    Interruptible = 1,

    /// 不可中断睡眠 (TASK_UNINTERRUPTIBLE)
    /// 进程在等待某个事件，不能被信号唤醒
    Uninterruptible = 2,
}

/// 任务
pub struct Task {
    pid: Pid,
    /// 调度状态，睡眠与唤醒都在此锁下完成
    state: Mutex<TaskState>,
    /// 睡眠的任务在这里等待
    wait: Condvar,
    /// 待处理信号
    pending: SigPending,
}

impl Task {
    /// 创建新任务，初始状态为 Running
    pub fn new(pid: Pid) -> Arc<Self> {
        Arc::new(Self {
            pid,
            state: Mutex::new(TaskState::Running),
            wait: Condvar::new(),
            pending: SigPending::new(),
        })
    }

    /// 获取 PID
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    fn lock_state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 获取当前状态
    pub fn state(&self) -> TaskState {
        *self.lock_state()
    }

    /// 设置状态
    ///
    /// 对应 Linux 的 set_current_state()，必须在检查等待条件之前调用，
    /// 这样在检查之后到达的唤醒不会丢失
    pub fn set_state(&self, state: TaskState) {
        *self.lock_state() = state;
    }

    /// 待处理信号集合
    pub fn pending(&self) -> &SigPending {
        &self.pending
    }

    /// 对应 Linux 的 signal_pending()
    pub fn signal_pending(&self) -> bool {
        self.pending.any()
    }

    /// 向任务发送信号
    ///
    /// 对应 Linux 的 send_signal() + signal_wake_up()：
    /// 记录待处理信号，若任务处于可中断睡眠则唤醒它
    pub fn send_signal(&self, sig: SigType) {
        self.pending.add(sig);

        let mut state = self.lock_state();
        if *state == TaskState::Interruptible {
            *state = TaskState::Running;
            self.wait.notify_all();
        }
    }

    /// 清空所有待处理信号
    ///
    /// 对应 Linux 的 flush_signals()
    pub fn flush_signals(&self) {
        self.pending.clear();
    }

    /// 让出 CPU，直到任务重新变为 Running
    ///
    /// 对应 Linux 的 schedule()。调用前应通过 [`Task::set_state`] 设置睡眠状态；
    /// 如果状态已经是 Running（唤醒先于睡眠到达），立即返回。
    pub fn schedule(&self) {
        let mut state = self.lock_state();
        loop {
            match *state {
                TaskState::Running => return,
                TaskState::Interruptible if self.pending.any() => {
                    *state = TaskState::Running;
                    return;
                }
                _ => {
                    state = self.wait.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// 带超时地让出 CPU
    ///
    /// 对应 Linux 的 schedule_timeout()
    ///
    /// # 返回
    /// 剩余的超时时间；超时到期返回 `Duration::ZERO`
    pub fn schedule_timeout(&self, timeout: Duration) -> Duration {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();
        loop {
            let now = Instant::now();
            match *state {
                TaskState::Running => return deadline.saturating_duration_since(now),
                TaskState::Interruptible if self.pending.any() => {
                    *state = TaskState::Running;
                    return deadline.saturating_duration_since(now);
                }
                _ if now >= deadline => {
                    *state = TaskState::Running;
                    return Duration::ZERO;
                }
                _ => {
                    let (guard, _) = self
                        .wait
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }

    /// 唤醒进程
    ///
    /// 对应 Linux 内核的 try_to_wake_up() (kernel/sched/core.c)
    ///
    /// # 返回
    /// - true: 成功唤醒
    /// - false: 进程不在睡眠状态
    pub fn wake_up(task: &Task) -> bool {
        let mut state = task.lock_state();
        match *state {
            TaskState::Interruptible | TaskState::Uninterruptible => {
                *state = TaskState::Running;
                task.wait.notify_all();
                true
            }
            _ => false,
        }
    }
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("pid", &self.pid)
            .field("state", &self.state())
            .field("pending", &self.pending.get_all())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::thread;

    #[test]
    fn test_taskstate_values() {
        assert_eq!(TaskState::Running as u32, 0, "TASK_RUNNING should be 0");
        assert_eq!(TaskState::Interruptible as u32, 1, "TASK_INTERRUPTIBLE should be 1");
        assert_eq!(TaskState::Uninterruptible as u32, 2, "TASK_UNINTERRUPTIBLE should be 2");
    }

    #[test]
    fn test_state_getset() {
        let task = Task::new(999);
        assert_eq!(task.state(), TaskState::Running, "Initial state should be Running");

        task.set_state(TaskState::Interruptible);
        assert_eq!(task.state(), TaskState::Interruptible);

        task.set_state(TaskState::Running);
        assert_eq!(task.state(), TaskState::Running);
    }

    #[test]
    fn test_wake_up_function() {
        let task = Task::new(1000);

        task.set_state(TaskState::Interruptible);
        assert!(Task::wake_up(&task), "wake_up should return true for sleeping task");
        assert_eq!(task.state(), TaskState::Running);

        assert!(!Task::wake_up(&task), "wake_up should return false for running task");
    }

    #[test]
    fn test_schedule_returns_after_wake_up() {
        let task = Task::new(1001);
        task.set_state(TaskState::Uninterruptible);

        let sleeper = {
            let task = Arc::clone(&task);
            thread::spawn(move || task.schedule())
        };

        while !Task::wake_up(&task) {
            thread::yield_now();
        }
        sleeper.join().unwrap();
        assert_eq!(task.state(), TaskState::Running);
    }

    #[test]
    fn test_signal_wakes_interruptible_sleeper() {
        let task = Task::new(1002);
        task.set_state(TaskState::Interruptible);

        let sleeper = {
            let task = Arc::clone(&task);
            thread::spawn(move || task.schedule())
        };

        task.send_signal(Signal::SIGINT.as_i32());
        sleeper.join().unwrap();
        assert!(task.signal_pending());
        assert_eq!(task.state(), TaskState::Running);

        task.flush_signals();
        assert!(!task.signal_pending());
    }

    #[test]
    fn test_signal_does_not_wake_uninterruptible_sleeper() {
        let task = Task::new(1003);
        task.set_state(TaskState::Uninterruptible);
        task.send_signal(Signal::SIGTERM.as_i32());

        assert_eq!(task.state(), TaskState::Uninterruptible);
        let remaining = task.schedule_timeout(Duration::from_millis(20));
        assert_eq!(remaining, Duration::ZERO);
        assert_eq!(task.state(), TaskState::Running);
    }
}
