//! synch_semaphore 演示程序
//!
//! 加载驱动，然后像配套的用户态测试程序一样，从两个线程并行地
//! 对 /dev/sample_cdev 调用 read()。第二个 read 会被信号量阻塞，
//! 直到第一个完成，所以总耗时约为两倍 DELAY。
//!
//! 用法：`synch_semaphore [CONFIG.toml]`

use std::process::ExitCode;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use log::{error, info};

use synch_semaphore::config::DriverConfig;
use synch_semaphore::fs::{CharDevRegistry, FileMode};
use synch_semaphore::process::Task;
use synch_semaphore::uaccess::UserSlice;
use synch_semaphore::{print, SynchSemaphoreModule};

/// 并行读取的进程数
const NR_READERS: u32 = 2;

fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => DriverConfig::from_file(&path),
        None => Ok(DriverConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("synch_semaphore: {}", err);
            return ExitCode::FAILURE;
        }
    };

    // validate() 已经检查过日志级别
    print::init(config.log_level().unwrap_or(log::LevelFilter::Info));

    info!(
        "main: {} v{} (delay {} ms)",
        synch_semaphore::config::defaults::DRIVER_NAME,
        synch_semaphore::config::defaults::DRIVER_VERSION,
        config.hardware.delay_ms
    );

    let registry = Arc::new(CharDevRegistry::new());
    let module = match SynchSemaphoreModule::init(&registry, &config) {
        Ok(module) => module,
        Err(err) => {
            error!("main: module init failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let node = module.node_path().to_string();
    let start = Arc::new(Barrier::new(NR_READERS as usize));
    let t0 = Instant::now();

    let readers: Vec<_> = (1..=NR_READERS)
        .map(|pid| {
            let registry = Arc::clone(&registry);
            let start = Arc::clone(&start);
            let node = node.clone();
            thread::spawn(move || -> Result<u32, isize> {
                let task = Task::new(pid);
                start.wait();

                let file = registry
                    .open(&node, FileMode::FMODE_READ)
                    .map_err(|err| err.as_neg_isize())?;

                let mut buf = [0u8; 4];
                let ret = file.read(&task, &mut UserSlice::new(&mut buf));
                if ret < 0 {
                    return Err(ret);
                }
                Ok(u32::from_ne_bytes(buf))
            })
        })
        .collect();

    let mut failed = false;
    for (pid, reader) in (1..=NR_READERS).zip(readers) {
        match reader.join() {
            Ok(Ok(value)) => println!(
                "reader {}: value {} after {:.2?}",
                pid,
                value,
                t0.elapsed()
            ),
            Ok(Err(ret)) => {
                println!("reader {}: read failed with {}", pid, ret);
                failed = true;
            }
            Err(_) => {
                error!("main: reader {} panicked", pid);
                failed = true;
            }
        }
    }

    module.exit(&registry);

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
