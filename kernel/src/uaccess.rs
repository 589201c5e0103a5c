//! 用户空间访问
//!
//! 对应 Linux 的 copy_to_user() (include/linux/uaccess.h)
//!
//! 用户态缓冲区通过 [`UserBuffer`] 抽象：目标地址无效或容量不足时
//! 复制失败并返回 `EFAULT`，而不是越界写入。

use crate::errno::Errno;

/// read() 的目标缓冲区
pub trait UserBuffer {
    /// 缓冲区长度，即 read() 的 count
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把 `src` 写到缓冲区起始处
    fn write_bytes(&mut self, src: &[u8]) -> Result<(), Errno>;
}

/// 由调用者提供的一段内存
///
/// `UserSlice::null()` 模拟传入空指针的调用者，任何写入都会失败
#[derive(Debug)]
pub struct UserSlice<'a> {
    buf: Option<&'a mut [u8]>,
}

impl<'a> UserSlice<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf: Some(buf) }
    }

    /// 无效的用户地址
    pub fn null() -> Self {
        Self { buf: None }
    }
}

impl UserBuffer for UserSlice<'_> {
    fn len(&self) -> usize {
        self.buf.as_ref().map_or(0, |buf| buf.len())
    }

    fn write_bytes(&mut self, src: &[u8]) -> Result<(), Errno> {
        let buf = self.buf.as_deref_mut().ok_or(Errno::BadAddress)?;
        let dst = buf.get_mut(..src.len()).ok_or(Errno::BadAddress)?;
        dst.copy_from_slice(src);
        Ok(())
    }
}

/// 复制数据到用户空间
///
/// 与 Linux 不同，失败时不返回未复制的字节数，而是直接返回 `EFAULT`
pub fn copy_to_user(dst: &mut dyn UserBuffer, src: &[u8]) -> Result<(), Errno> {
    dst.write_bytes(src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_to_user() {
        let mut buf = [0u8; 8];
        let mut user = UserSlice::new(&mut buf);
        assert_eq!(user.len(), 8);
        assert_eq!(copy_to_user(&mut user, &[1, 2, 3, 4]), Ok(()));
        assert_eq!(buf, [1, 2, 3, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn test_copy_to_short_buffer_faults() {
        let mut buf = [0xffu8; 2];
        let mut user = UserSlice::new(&mut buf);
        assert_eq!(copy_to_user(&mut user, &[1, 2, 3, 4]), Err(Errno::BadAddress));
        assert_eq!(buf, [0xff, 0xff], "a faulting copy must not write partially");
    }

    #[test]
    fn test_copy_to_null_faults() {
        let mut user = UserSlice::null();
        assert!(user.is_empty());
        assert_eq!(copy_to_user(&mut user, &[0]), Err(Errno::BadAddress));
    }
}
