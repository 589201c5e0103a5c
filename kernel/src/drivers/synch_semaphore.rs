//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 信号量同步示例驱动 (SYNCH_SEMAPHORE)
//!
//! 一个只支持 read 的字符设备。假设每次 read 都从硬件读取一个值，
//! 这个值实际上是每次加一的计数器；临界区内的睡眠制造出“硬件读取
//! 需要这么长时间”的效果。整个临界区由信号量保护，同一时刻只有
//! 一个进程可以访问设备，并发的第二个 read 会阻塞到第一个完成。
//!
//! 加载时分配字符设备号并创建 /dev/sample_cdev，卸载时清除节点并
//! 注销字符设备。

use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::DriverConfig;
use crate::errno::Errno;
use crate::fs::{dev_path, major, minor, CharDevRegistry, Class, DevT, File, FileOperations};
use crate::process::Task;
use crate::sync::Mutex;
use crate::time::{HardwareDelay, Msleep};
use crate::uaccess::{copy_to_user, UserBuffer};

/// read 失败的原因
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// 等待设备锁时收到信号，调用者应重试
    #[error("interrupted while waiting for the device lock")]
    Interrupted,

    /// 值无法写入调用者的缓冲区
    #[error("bad address while copying the value to the caller")]
    CopyFault,
}

impl DriverError {
    /// 对应的内核错误码
    pub const fn errno(self) -> Errno {
        match self {
            DriverError::Interrupted => Errno::RestartSys,
            DriverError::CopyFault => Errno::BadAddress,
        }
    }
}

impl From<DriverError> for Errno {
    fn from(err: DriverError) -> Self {
        err.errno()
    }
}

/// 设备
///
/// 计数器只能通过信号量守护访问，因此不持锁无法读写
pub struct SynchSemaphoreDevice<D = Msleep> {
    fake_val: Mutex<u32>,
    delay: D,
}

impl<D: HardwareDelay> SynchSemaphoreDevice<D> {
    pub fn new(initial_value: u32, delay: D) -> Self {
        Self {
            fake_val: Mutex::new(initial_value),
            delay,
        }
    }

    /// 从“硬件”读取下一个值
    ///
    /// 1. 可中断地获取信号量，收到信号时返回 `Interrupted`
    /// 2. 睡眠模拟硬件延迟（不可取消）
    /// 3. 计数器加一
    /// 4. 把值复制给调用者
    /// 5. 释放信号量
    ///
    /// 成功时返回写入的字节数（4）。复制失败时计数器已经前进，
    /// 这个值不会再交给任何调用者。
    pub fn read(&self, task: &Arc<Task>, buf: &mut dyn UserBuffer) -> Result<usize, DriverError> {
        info!("In the read function (pid {})", task.pid());

        let mut fake_val = self.fake_val.lock_interruptible(task).map_err(|_| {
            warn!("pid {} interrupted while waiting for the semaphore", task.pid());
            DriverError::Interrupted
        })?;
        debug!("pid {} entered the critical section", task.pid());

        self.delay.delay(task);

        *fake_val = fake_val.wrapping_add(1);

        let bytes = fake_val.to_ne_bytes();
        let copied = copy_to_user(buf, &bytes);

        drop(fake_val);
        debug!("pid {} left the critical section", task.pid());

        copied.map_err(|errno| {
            error!("pid {} copy_to_user failed: {}", task.pid(), errno);
            DriverError::CopyFault
        })?;

        Ok(bytes.len())
    }

    /// 当前计数值，不推进计数器
    pub fn value(&self, task: &Arc<Task>) -> u32 {
        *self.fake_val.lock(task)
    }

    /// 是否有进程处于临界区
    pub fn is_busy(&self) -> bool {
        self.fake_val.is_locked()
    }

    /// 等待设备锁的进程数
    pub fn nr_waiters(&self) -> usize {
        self.fake_val.nr_waiters()
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

impl<D: HardwareDelay> FileOperations for SynchSemaphoreDevice<D> {
    /// 偏移量被忽略，每次 read 都返回一个新值
    fn read(&self, task: &Arc<Task>, _file: &File, buf: &mut dyn UserBuffer, _offp: &mut i64) -> isize {
        match SynchSemaphoreDevice::read(self, task, buf) {
            Ok(n) => n as isize,
            Err(err) => err.errno().as_neg_isize(),
        }
    }
}

/// 已加载的驱动模块
///
/// 持有加载时注册的全部资源，`exit()` 时按相反顺序释放
pub struct SynchSemaphoreModule<D = Msleep> {
    device: Arc<SynchSemaphoreDevice<D>>,
    devt: DevT,
    nminors: u32,
    class: Class,
    node_path: String,
}

impl SynchSemaphoreModule<Msleep> {
    /// 模块初始化，硬件延迟取自配置
    pub fn init(registry: &CharDevRegistry, config: &DriverConfig) -> Result<Self, Errno> {
        Self::init_with_delay(registry, config, config.delay())
    }
}

impl<D: HardwareDelay + 'static> SynchSemaphoreModule<D> {
    /// 模块初始化
    ///
    /// 创建字符设备和 /dev 节点；任意一步失败都会撤销已完成的步骤
    pub fn init_with_delay(registry: &CharDevRegistry, config: &DriverConfig, delay: D) -> Result<Self, Errno> {
        info!("In init() function");

        let name = config.general.name.as_str();
        let nminors = config.device.nminors;

        let devt = registry.alloc_chrdev_region(config.device.first_minor, nminors, name)?;
        info!("{}: major {}, minor {}", name, major(devt), minor(devt));

        let device = Arc::new(SynchSemaphoreDevice::new(config.hardware.initial_value, delay));
        let fops: Arc<dyn FileOperations> = device.clone();

        if let Err(err) = registry.cdev_add(devt, 1, fops) {
            error!("{}: cdev_add failed: {}", name, err);
            registry.unregister_chrdev_region(devt, nminors);
            return Err(err);
        }

        let class = match registry.class_create(name) {
            Ok(class) => class,
            Err(err) => {
                error!("{}: class_create failed: {}", name, err);
                registry.cdev_del(devt);
                registry.unregister_chrdev_region(devt, nminors);
                return Err(err);
            }
        };

        if let Err(err) = registry.device_create(&class, devt, &config.device.node_name) {
            error!("{}: device_create failed: {}", name, err);
            registry.class_destroy(class);
            registry.cdev_del(devt);
            registry.unregister_chrdev_region(devt, nminors);
            return Err(err);
        }

        let node_path = dev_path(&config.device.node_name);
        info!("{}: created {}", name, node_path);

        Ok(Self {
            device,
            devt,
            nminors,
            class,
            node_path,
        })
    }

    /// 模块卸载
    pub fn exit(self, registry: &CharDevRegistry) {
        info!("In exit function");

        registry.device_destroy(&self.class, self.devt);
        registry.class_destroy(self.class);

        registry.cdev_del(self.devt);
        registry.unregister_chrdev_region(self.devt, self.nminors);
    }

    pub fn device(&self) -> &Arc<SynchSemaphoreDevice<D>> {
        &self.device
    }

    pub fn devt(&self) -> DevT {
        self.devt
    }

    /// /dev 下的节点路径
    pub fn node_path(&self) -> &str {
        &self.node_path
    }
}
