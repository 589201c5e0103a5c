//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 设备驱动模块

pub mod synch_semaphore;

pub use synch_semaphore::{DriverError, SynchSemaphoreDevice, SynchSemaphoreModule};
