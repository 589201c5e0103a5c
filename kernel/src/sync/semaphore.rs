//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 信号量 (Semaphore) 机制
//!
//! 遵循 Linux 内核的信号量实现：
//! - `include/linux/semaphore.h` - 信号量数据结构
//! - `kernel/locking/semaphore.c` - 信号量操作
//!
//! 核心概念：
//! - P 操作 (down/down_interruptible): 获取信号量，可能阻塞
//! - V 操作 (up): 释放信号量，唤醒等待的进程
//!
//! 计数和等待链表由自旋锁保护，自旋锁只在簿记期间持有；
//! 真正的等待通过 [`Task::schedule`] 睡眠完成，不占用 CPU。
//! 有进程等待时，`up()` 直接把信号量交给等待链表的第一个进程，
//! 计数保持为 0，其他进程无法插队。

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::errno::Errno;
use crate::process::{Task, TaskState};

/// 等待链表中的一项
///
/// 对应 Linux 的 struct semaphore_waiter
struct SemaphoreWaiter {
    task: Arc<Task>,
    /// up() 已将信号量交给该进程
    up: AtomicBool,
}

struct SemaphoreInner {
    count: u32,
    wait_list: VecDeque<Arc<SemaphoreWaiter>>,
}

/// 信号量
///
/// 信号量是一个非负整数，用于进程同步：
/// - 初始化为某个正整数
/// - P 操作 (down): 值大于 0 时减 1，否则阻塞等待
/// - V 操作 (up): 有进程等待时唤醒一个，否则值加 1
pub struct Semaphore {
    lock: spin::Mutex<SemaphoreInner>,
}

impl Semaphore {
    /// 创建新信号量
    ///
    /// 对应 Linux 的 sema_init()
    ///
    /// # 示例
    /// ```
    /// use synch_semaphore::sync::Semaphore;
    ///
    /// // 互斥信号量（二值信号量）
    /// let mutex = Semaphore::new(1);
    /// assert_eq!(mutex.count(), 1);
    /// ```
    pub const fn new(count: u32) -> Self {
        Self {
            lock: spin::Mutex::new(SemaphoreInner {
                count,
                wait_list: VecDeque::new(),
            }),
        }
    }

    /// P 操作（不可中断）
    ///
    /// 信号量不可用时睡眠，信号不会打断等待
    pub fn down(&self, task: &Arc<Task>) {
        // 不可中断的等待只会以成功结束
        let _ = self.down_common(task, TaskState::Uninterruptible);
    }

    /// P 操作（可中断）
    ///
    /// 对应 Linux 的 down_interruptible()
    ///
    /// # 返回
    /// - `Ok(())` - 成功获取信号量
    /// - `Err(Errno::InterruptedSystemCall)` - 等待期间收到信号，未获取信号量
    ///
    /// 信号量立即可用时直接获取，不检查信号
    pub fn down_interruptible(&self, task: &Arc<Task>) -> Result<(), Errno> {
        self.down_common(task, TaskState::Interruptible)
    }

    /// 对应 Linux 的 __down_common()
    fn down_common(&self, task: &Arc<Task>, state: TaskState) -> Result<(), Errno> {
        let mut inner = self.lock.lock();
        if inner.count > 0 {
            inner.count -= 1;
            return Ok(());
        }

        let waiter = Arc::new(SemaphoreWaiter {
            task: Arc::clone(task),
            up: AtomicBool::new(false),
        });
        inner.wait_list.push_back(Arc::clone(&waiter));

        loop {
            if state == TaskState::Interruptible && task.signal_pending() {
                inner.wait_list.retain(|w| !Arc::ptr_eq(w, &waiter));
                return Err(Errno::InterruptedSystemCall);
            }

            // 先设置睡眠状态再释放自旋锁，之后到达的 wake_up 不会丢失
            task.set_state(state);
            drop(inner);

            task.schedule();

            inner = self.lock.lock();
            if waiter.up.load(Ordering::Acquire) {
                return Ok(());
            }
        }
    }

    /// 尝试 P 操作（非阻塞）
    ///
    /// 对应 Linux 的 down_trylock()
    ///
    /// # 返回
    /// - `Ok(())` - 成功获取信号量
    /// - `Err(())` - 信号量不足
    pub fn down_trylock(&self) -> Result<(), ()> {
        let mut inner = self.lock.lock();
        if inner.count > 0 {
            inner.count -= 1;
            Ok(())
        } else {
            Err(())
        }
    }

    /// V 操作（释放信号量）
    ///
    /// 可以在任意上下文调用，不会睡眠
    pub fn up(&self) {
        let waiter = {
            let mut inner = self.lock.lock();
            match inner.wait_list.pop_front() {
                Some(waiter) => {
                    waiter.up.store(true, Ordering::Release);
                    waiter
                }
                None => {
                    inner.count += 1;
                    return;
                }
            }
        };

        Task::wake_up(&waiter.task);
    }

    /// 获取信号量当前值
    ///
    /// 此值仅供参考，实际值可能在调用后立即改变
    pub fn count(&self) -> u32 {
        self.lock.lock().count
    }

    /// 等待链表中的进程数
    pub fn nr_waiters(&self) -> usize {
        self.lock.lock().wait_list.len()
    }
}

/// 互斥锁
///
/// 二值信号量（初始值为 1）加上它保护的数据。数据只能通过
/// [`MutexGuard`] 访问，守护对象释放时自动执行 up()。
pub struct Mutex<T: ?Sized> {
    sem: Semaphore,
    data: UnsafeCell<T>,
}

// 对数据的访问由信号量串行化
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// 创建新互斥锁，初始为未加锁状态
    pub const fn new(data: T) -> Self {
        Self {
            sem: Semaphore::new(1),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    /// 获取锁（不可中断）
    pub fn lock(&self, task: &Arc<Task>) -> MutexGuard<'_, T> {
        self.sem.down(task);
        MutexGuard::new(self)
    }

    /// 获取锁（可中断）
    ///
    /// 等待期间收到信号时返回 `Err(Errno::InterruptedSystemCall)`
    pub fn lock_interruptible(&self, task: &Arc<Task>) -> Result<MutexGuard<'_, T>, Errno> {
        self.sem.down_interruptible(task)?;
        Ok(MutexGuard::new(self))
    }

    /// 尝试获取锁（非阻塞）
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.sem.down_trylock().ok()?;
        Some(MutexGuard::new(self))
    }

    /// 锁是否被持有
    pub fn is_locked(&self) -> bool {
        self.sem.count() == 0
    }

    /// 等待锁的进程数
    pub fn nr_waiters(&self) -> usize {
        self.sem.nr_waiters()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// 互斥锁守护（RAII）
///
/// 离开作用域时自动释放锁，包括错误提前返回的路径
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    _not_send: PhantomData<*const ()>,
}

unsafe impl<T: ?Sized + Sync> Sync for MutexGuard<'_, T> {}

impl<'a, T: ?Sized> MutexGuard<'a, T> {
    fn new(mutex: &'a Mutex<T>) -> Self {
        Self {
            mutex,
            _not_send: PhantomData,
        }
    }
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // 持有守护即持有信号量
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.sem.up();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;
    use std::thread;
    use std::time::Duration;

    fn wait_for_waiters(sem: &Semaphore, n: usize) {
        while sem.nr_waiters() < n {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_down_up_uncontended() {
        let task = Task::new(1);
        let sem = Semaphore::new(2);

        sem.down(&task);
        assert_eq!(sem.count(), 1);
        assert_eq!(sem.down_interruptible(&task), Ok(()));
        assert_eq!(sem.count(), 0);
        assert_eq!(sem.down_trylock(), Err(()));

        sem.up();
        sem.up();
        assert_eq!(sem.count(), 2);
    }

    #[test]
    fn test_up_hands_off_to_waiter() {
        let holder = Task::new(1);
        let waiter = Task::new(2);
        let sem = Arc::new(Semaphore::new(1));

        sem.down(&holder);

        let handle = {
            let sem = Arc::clone(&sem);
            let waiter = Arc::clone(&waiter);
            thread::spawn(move || sem.down(&waiter))
        };

        wait_for_waiters(&sem, 1);
        sem.up();
        handle.join().unwrap();

        // 信号量直接交给等待者，计数保持为 0
        assert_eq!(sem.count(), 0);
        assert_eq!(sem.nr_waiters(), 0);
        sem.up();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn test_down_interruptible_aborted_by_signal() {
        let holder = Task::new(1);
        let waiter = Task::new(2);
        let sem = Arc::new(Semaphore::new(1));

        sem.down(&holder);

        let handle = {
            let sem = Arc::clone(&sem);
            let waiter = Arc::clone(&waiter);
            thread::spawn(move || sem.down_interruptible(&waiter))
        };

        wait_for_waiters(&sem, 1);
        waiter.send_signal(Signal::SIGINT.as_i32());

        assert_eq!(handle.join().unwrap(), Err(Errno::InterruptedSystemCall));
        assert_eq!(sem.nr_waiters(), 0);
        assert_eq!(sem.count(), 0, "holder still owns the semaphore");

        sem.up();
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn test_pending_signal_does_not_block_fast_path() {
        let task = Task::new(3);
        task.send_signal(Signal::SIGUSR1.as_i32());

        let sem = Semaphore::new(1);
        assert_eq!(sem.down_interruptible(&task), Ok(()));
        assert_eq!(sem.down_interruptible(&task), Err(Errno::InterruptedSystemCall));
        assert_eq!(sem.nr_waiters(), 0);
    }

    #[test]
    fn test_mutex_guard_releases_on_drop() {
        let task = Task::new(4);
        let mutex = Mutex::new(10u32);

        {
            let mut guard = mutex.lock(&task);
            *guard += 1;
            assert!(mutex.is_locked());
            assert!(mutex.try_lock().is_none());
        }

        assert!(!mutex.is_locked());
        let guard = mutex.lock_interruptible(&task).unwrap();
        assert_eq!(*guard, 11);
    }

    #[test]
    fn test_mutex_serializes_increments() {
        let mutex = Arc::new(Mutex::new(0u32));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mutex = Arc::clone(&mutex);
                thread::spawn(move || {
                    let task = Task::new(10 + i);
                    for _ in 0..1000 {
                        *mutex.lock(&task) += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mutex = Arc::try_unwrap(mutex).ok().unwrap();
        assert_eq!(mutex.into_inner(), 4000);
    }
}
