//! 设备文件
//!
//! 遵循 Linux 内核的字符设备模型：
//! - `char_dev`: 设备号分配、cdev 映射、/dev 节点 (fs/char_dev.c)
//! - `file`: 文件对象与 file_operations (include/linux/fs.h)

pub mod char_dev;
pub mod file;

pub use char_dev::{dev_path, major, minor, mkdev, CharDevRegistry, Class, DevT};
pub use file::{File, FileMode, FileOperations};
