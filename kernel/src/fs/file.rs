//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 文件对象
//!
//! 对应 Linux 的 struct file / struct file_operations (include/linux/fs.h)
//!
//! 打开设备节点得到 [`File`]，对它的 read/write 被分派到
//! 注册该设备号的驱动的 [`FileOperations`]。

use std::sync::Arc;

use bitflags::bitflags;

use super::char_dev::DevT;
use crate::errno::Errno;
use crate::process::Task;
use crate::uaccess::UserBuffer;

bitflags! {
    /// 文件打开模式
    ///
    /// 对应 Linux 的 fmode_t
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileMode: u32 {
        const FMODE_READ = 0x1;
        const FMODE_WRITE = 0x2;
    }
}

/// 文件操作
///
/// 对应 Linux 的 struct file_operations。返回值遵循 ssize_t 约定：
/// 非负数为传输的字节数，负数为 `-errno`
pub trait FileOperations: Send + Sync {
    fn read(&self, task: &Arc<Task>, file: &File, buf: &mut dyn UserBuffer, offp: &mut i64) -> isize;

    /// 未实现 write 的驱动返回 -EINVAL，与 vfs_write() 一致
    fn write(&self, _task: &Arc<Task>, _file: &File, _buf: &[u8], _offp: &mut i64) -> isize {
        Errno::InvalidArgument.as_neg_isize()
    }
}

/// 文件对象
pub struct File {
    devt: DevT,
    mode: FileMode,
    fops: Arc<dyn FileOperations>,
    /// 文件位置 (f_pos)
    pos: spin::Mutex<i64>,
}

impl File {
    pub(crate) fn new(devt: DevT, mode: FileMode, fops: Arc<dyn FileOperations>) -> Self {
        Self {
            devt,
            mode,
            fops,
            pos: spin::Mutex::new(0),
        }
    }

    /// 设备号 (inode->i_rdev)
    pub fn devt(&self) -> DevT {
        self.devt
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn pos(&self) -> i64 {
        *self.pos.lock()
    }

    /// 对应 Linux 的 vfs_read()
    pub fn read(&self, task: &Arc<Task>, buf: &mut dyn UserBuffer) -> isize {
        if !self.mode.contains(FileMode::FMODE_READ) {
            return Errno::BadFileNumber.as_neg_isize();
        }

        let mut pos = self.pos();
        let ret = self.fops.read(task, self, buf, &mut pos);
        *self.pos.lock() = pos;
        ret
    }

    /// 对应 Linux 的 vfs_write()
    pub fn write(&self, task: &Arc<Task>, buf: &[u8]) -> isize {
        if !self.mode.contains(FileMode::FMODE_WRITE) {
            return Errno::BadFileNumber.as_neg_isize();
        }

        let mut pos = self.pos();
        let ret = self.fops.write(task, self, buf, &mut pos);
        *self.pos.lock() = pos;
        ret
    }
}

impl core::fmt::Debug for File {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("File")
            .field("devt", &self.devt)
            .field("mode", &self.mode)
            .field("pos", &self.pos())
            .finish()
    }
}
