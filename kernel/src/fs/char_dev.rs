//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 字符设备注册
//!
//! 对应 Linux 的 fs/char_dev.c、include/linux/kdev_t.h 和
//! drivers/base/core.c 中 device_create() 相关部分
//!
//! 驱动的典型加载流程：
//! 1. alloc_chrdev_region() 分配设备号
//! 2. cdev_add() 把 file_operations 绑定到设备号
//! 3. class_create() + device_create() 在 /dev 下创建节点
//!
//! 卸载时按相反顺序执行。所有表都保存在 [`CharDevRegistry`] 中，
//! 由调用者显式持有，而不是全局变量。

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use super::file::{File, FileMode, FileOperations};
use crate::errno::Errno;

/// 设备号
pub type DevT = u32;

/// 次设备号位数
pub const MINORBITS: u32 = 20;
/// 次设备号掩码
pub const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// 动态分配主设备号的范围 [CHRDEV_MAJOR_DYN_END, CHRDEV_MAJOR_DYN_START]，从高往低分配
pub const CHRDEV_MAJOR_DYN_START: u32 = 254;
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;

/// 主设备号上限
pub const CHRDEV_MAJOR_MAX: u32 = 512;

/// 设备节点所在目录
pub const DEV_DIR: &str = "/dev";

/// 对应 Linux 的 MKDEV()
#[inline]
pub const fn mkdev(major: u32, minor: u32) -> DevT {
    (major << MINORBITS) | (minor & MINORMASK)
}

/// 对应 Linux 的 MAJOR()
#[inline]
pub const fn major(dev: DevT) -> u32 {
    dev >> MINORBITS
}

/// 对应 Linux 的 MINOR()
#[inline]
pub const fn minor(dev: DevT) -> u32 {
    dev & MINORMASK
}

/// 已注册的设备号区域
///
/// 对应 Linux 的 struct char_device_struct
#[derive(Debug, Clone, PartialEq, Eq)]
struct CharDeviceRegion {
    major: u32,
    baseminor: u32,
    minorct: u32,
    name: String,
}

impl CharDeviceRegion {
    fn overlaps(&self, major: u32, baseminor: u32, minorct: u32) -> bool {
        self.major == major
            && baseminor < self.baseminor + self.minorct
            && self.baseminor < baseminor + minorct
    }
}

/// 对应 Linux 的 struct cdev
struct Cdev {
    dev: DevT,
    count: u32,
    fops: Arc<dyn FileOperations>,
}

impl Cdev {
    fn contains(&self, dev: DevT) -> bool {
        major(dev) == major(self.dev)
            && minor(dev) >= minor(self.dev)
            && minor(dev) - minor(self.dev) < self.count
    }
}

/// 设备类
///
/// class_create() 返回的句柄，用于 device_create()/class_destroy()
#[derive(Debug, PartialEq, Eq)]
pub struct Class {
    name: String,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone)]
struct DeviceNode {
    class: String,
    devt: DevT,
}

/// 字符设备注册表
#[derive(Default)]
pub struct CharDevRegistry {
    regions: spin::Mutex<Vec<CharDeviceRegion>>,
    cdevs: spin::RwLock<Vec<Cdev>>,
    classes: spin::Mutex<Vec<String>>,
    /// 路径 -> 设备节点
    nodes: spin::RwLock<BTreeMap<String, DeviceNode>>,
}

fn check_minor_range(baseminor: u32, count: u32) -> Result<(), Errno> {
    if count == 0 {
        return Err(Errno::InvalidArgument);
    }
    match baseminor.checked_add(count - 1) {
        Some(last) if last <= MINORMASK => Ok(()),
        _ => Err(Errno::InvalidArgument),
    }
}

/// 节点名对应的完整路径
pub fn dev_path(node: &str) -> String {
    format!("{}/{}", DEV_DIR, node)
}

impl CharDevRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 动态分配主设备号
    ///
    /// 对应 Linux 的 alloc_chrdev_region()
    ///
    /// # 返回
    /// 区域的第一个设备号；动态主设备号耗尽时返回 `EBUSY`
    pub fn alloc_chrdev_region(&self, baseminor: u32, count: u32, name: &str) -> Result<DevT, Errno> {
        check_minor_range(baseminor, count)?;

        let mut regions = self.regions.lock();
        let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .find(|&major| regions.iter().all(|r| r.major != major))
            .ok_or(Errno::DeviceOrResourceBusy)?;

        regions.push(CharDeviceRegion {
            major,
            baseminor,
            minorct: count,
            name: name.to_string(),
        });

        debug!("chrdev: allocated major {} minors {}..{} for {}", major, baseminor, baseminor + count, name);
        Ok(mkdev(major, baseminor))
    }

    /// 注册指定的设备号区域
    ///
    /// 对应 Linux 的 register_chrdev_region()
    pub fn register_chrdev_region(&self, from: DevT, count: u32, name: &str) -> Result<(), Errno> {
        let (major, baseminor) = (major(from), minor(from));
        if major == 0 || major >= CHRDEV_MAJOR_MAX {
            return Err(Errno::InvalidArgument);
        }
        check_minor_range(baseminor, count)?;

        let mut regions = self.regions.lock();
        if regions.iter().any(|r| r.overlaps(major, baseminor, count)) {
            return Err(Errno::DeviceOrResourceBusy);
        }

        regions.push(CharDeviceRegion {
            major,
            baseminor,
            minorct: count,
            name: name.to_string(),
        });
        Ok(())
    }

    /// 释放设备号区域
    ///
    /// 对应 Linux 的 unregister_chrdev_region()
    pub fn unregister_chrdev_region(&self, from: DevT, count: u32) {
        let (major, baseminor) = (major(from), minor(from));
        self.regions
            .lock()
            .retain(|r| !(r.major == major && r.baseminor == baseminor && r.minorct == count));
        debug!(
            "chrdev: released major {} minors {}..{}",
            major,
            baseminor,
            baseminor.saturating_add(count)
        );
    }

    /// 已注册的字符设备，与 /proc/devices 的 "Character devices" 段一致
    pub fn chrdevs(&self) -> Vec<(u32, String)> {
        let mut list: Vec<_> = self
            .regions
            .lock()
            .iter()
            .map(|r| (r.major, r.name.clone()))
            .collect();
        list.sort();
        list.dedup();
        list
    }

    /// 把文件操作绑定到设备号区域
    ///
    /// 对应 Linux 的 cdev_init() + cdev_add()
    pub fn cdev_add(&self, dev: DevT, count: u32, fops: Arc<dyn FileOperations>) -> Result<(), Errno> {
        check_minor_range(minor(dev), count)?;

        let mut cdevs = self.cdevs.write();
        let clash = cdevs.iter().any(|c| {
            major(c.dev) == major(dev)
                && minor(dev) < minor(c.dev) + c.count
                && minor(c.dev) < minor(dev) + count
        });
        if clash {
            return Err(Errno::DeviceOrResourceBusy);
        }

        cdevs.push(Cdev { dev, count, fops });
        Ok(())
    }

    /// 对应 Linux 的 cdev_del()
    pub fn cdev_del(&self, dev: DevT) {
        self.cdevs.write().retain(|c| c.dev != dev);
    }

    fn lookup_cdev(&self, dev: DevT) -> Option<Arc<dyn FileOperations>> {
        self.cdevs
            .read()
            .iter()
            .find(|c| c.contains(dev))
            .map(|c| Arc::clone(&c.fops))
    }

    /// 对应 Linux 的 class_create()
    pub fn class_create(&self, name: &str) -> Result<Class, Errno> {
        let mut classes = self.classes.lock();
        if classes.iter().any(|c| c == name) {
            return Err(Errno::FileExists);
        }
        classes.push(name.to_string());
        Ok(Class {
            name: name.to_string(),
        })
    }

    /// 对应 Linux 的 class_destroy()
    pub fn class_destroy(&self, class: Class) {
        self.classes.lock().retain(|c| *c != class.name);
    }

    /// 在 /dev 下创建设备节点
    ///
    /// 对应 Linux 的 device_create()
    pub fn device_create(&self, class: &Class, devt: DevT, node: &str) -> Result<(), Errno> {
        if node.is_empty() || node.contains('/') {
            return Err(Errno::InvalidArgument);
        }
        if !self.classes.lock().iter().any(|c| *c == class.name) {
            return Err(Errno::NoSuchDevice);
        }

        let path = dev_path(node);
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&path) {
            return Err(Errno::FileExists);
        }

        debug!("chrdev: created {} ({}:{})", path, major(devt), minor(devt));
        nodes.insert(
            path,
            DeviceNode {
                class: class.name.clone(),
                devt,
            },
        );
        Ok(())
    }

    /// 对应 Linux 的 device_destroy()
    pub fn device_destroy(&self, class: &Class, devt: DevT) {
        self.nodes
            .write()
            .retain(|_, n| !(n.class == class.name && n.devt == devt));
    }

    /// 设备节点是否存在
    pub fn node_exists(&self, path: &str) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// 打开设备节点
    ///
    /// 对应 Linux 的 chrdev_open()
    ///
    /// # 返回
    /// - `ENOENT` - 节点不存在
    /// - `ENXIO` - 节点存在但没有驱动绑定该设备号
    pub fn open(&self, path: &str, mode: FileMode) -> Result<File, Errno> {
        let devt = self
            .nodes
            .read()
            .get(path)
            .map(|n| n.devt)
            .ok_or(Errno::NoSuchFileOrDirectory)?;

        let fops = self.lookup_cdev(devt).ok_or(Errno::NoSuchDeviceOrAddress)?;
        Ok(File::new(devt, mode, fops))
    }
}
