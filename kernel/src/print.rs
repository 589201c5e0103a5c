//! printk 风格的日志后端
//!
//! 驱动内部统一使用 `log` 宏，这里把记录格式化为
//! `[ INFO] synch_semaphore: message` 写到控制台（stderr）。

use core::fmt::{self, Write};
use std::io::{self, Write as IoWrite};

use log::{LevelFilter, Log, Metadata, Record};

/// 控制台
///
/// 持有 stderr 锁直到被 drop，一条日志在同一把锁下写完，
/// 并发打印时行与行不会交错。
pub struct Console {
    out: io::StderrLock<'static>,
}

impl Console {
    pub fn lock() -> Self {
        Self { out: io::stderr().lock() }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.out.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// 内核日志记录器
pub struct DriverLogger;

static LOGGER: DriverLogger = DriverLogger;

impl Log for DriverLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(record);
        let _ = Console::lock().write_str(&line);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// 格式化为完整的一行，包括换行符
fn format_record(record: &Record) -> String {
    let mut line = String::new();
    let _ = writeln!(
        line,
        "[{:>5}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    );
    line
}

/// 安装日志记录器
///
/// 重复调用只更新日志级别。启用 `debug_log` 特性时至少输出 debug 级别。
pub fn init(level: LevelFilter) {
    let level = if cfg!(feature = "debug_log") {
        level.max(LevelFilter::Debug)
    } else {
        level
    };

    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
