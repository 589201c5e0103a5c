// 测试：并发 read 的互斥语义
//
// 测试内容：
// 1. N 个并发 read 得到 {initial+1, ..., initial+N}
// 2. 任意时刻最多一个进程处于临界区（延迟、计数、复制结果）
// 3. 两个同时开始的 read 被串行化，总耗时约为 2 * DELAY
// 4. 通过 /dev 节点并发读取

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use synch_semaphore::config::DriverConfig;
use synch_semaphore::errno::Errno;
use synch_semaphore::fs::{CharDevRegistry, FileMode};
use synch_semaphore::process::Task;
use synch_semaphore::time::{msleep, HardwareDelay, Msleep};
use synch_semaphore::uaccess::{UserBuffer, UserSlice};
use synch_semaphore::{SynchSemaphoreDevice, SynchSemaphoreModule};

const INITIAL: u32 = 10;

/// 检测临界区重入
///
/// 进程在延迟开始时进入，在 copy_to_user 完成时离开（见 [`CheckedBuffer`]），
/// 覆盖从等待硬件、修改计数器到复制结果的整个区间。
struct Exclusive {
    inside: AtomicUsize,
    max_inside: AtomicUsize,
    msecs: u64,
}

impl Exclusive {
    fn new(msecs: u64) -> Self {
        Self {
            inside: AtomicUsize::new(0),
            max_inside: AtomicUsize::new(0),
            msecs,
        }
    }

    fn leave(&self) {
        let prev = self.inside.fetch_sub(1, Ordering::SeqCst);
        assert_eq!(prev, 1, "two tasks inside the critical section");
    }
}

impl HardwareDelay for Exclusive {
    fn delay(&self, task: &Task) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inside.fetch_max(now, Ordering::SeqCst);
        assert_eq!(now, 1, "two tasks inside the critical section");

        msleep(task, self.msecs);
    }
}

/// 复制结果时检查设备锁仍被持有，然后离开临界区
struct CheckedBuffer<'a> {
    device: &'a SynchSemaphoreDevice<Exclusive>,
    buf: [u8; 4],
}

impl UserBuffer for CheckedBuffer<'_> {
    fn len(&self) -> usize {
        self.buf.len()
    }

    fn write_bytes(&mut self, src: &[u8]) -> Result<(), Errno> {
        assert!(self.device.is_busy(), "result copied after the lock was released");
        UserSlice::new(&mut self.buf).write_bytes(src)?;
        self.device.delay().leave();
        Ok(())
    }
}

fn read_exclusive(device: &Arc<SynchSemaphoreDevice<Exclusive>>, readers: u32) -> Vec<u32> {
    let start = Arc::new(Barrier::new(readers as usize));
    let handles: Vec<_> = (0..readers)
        .map(|i| {
            let device = Arc::clone(device);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                let task = Task::new(100 + i);
                let mut buf = CheckedBuffer {
                    device: &device,
                    buf: [0u8; 4],
                };
                start.wait();
                assert_eq!(device.read(&task, &mut buf), Ok(4));
                u32::from_ne_bytes(buf.buf)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn read_concurrently<D: HardwareDelay + 'static>(
    device: &Arc<SynchSemaphoreDevice<D>>,
    readers: u32,
) -> Vec<u32> {
    let start = Arc::new(Barrier::new(readers as usize));
    let handles: Vec<_> = (0..readers)
        .map(|i| {
            let device = Arc::clone(device);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                let task = Task::new(100 + i);
                let mut buf = [0u8; 4];
                start.wait();
                let n = device
                    .read(&task, &mut UserSlice::new(&mut buf))
                    .expect("read should succeed");
                assert_eq!(n, 4);
                u32::from_ne_bytes(buf)
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn concurrent_reads_return_contiguous_distinct_values() {
    let device = Arc::new(SynchSemaphoreDevice::new(INITIAL, Exclusive::new(2)));
    let readers = 8;

    let values = read_exclusive(&device, readers);

    let set: BTreeSet<u32> = values.iter().copied().collect();
    assert_eq!(set.len(), values.len(), "values must be pairwise distinct");
    let expected: BTreeSet<u32> = (INITIAL + 1..=INITIAL + readers).collect();
    assert_eq!(set, expected);

    assert_eq!(device.delay().max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(device.delay().inside.load(Ordering::SeqCst), 0);
    assert!(!device.is_busy());
    assert_eq!(device.value(&Task::new(1)), INITIAL + readers);
}

#[test]
fn sequential_reads_observe_delay() {
    let device = SynchSemaphoreDevice::new(INITIAL, Msleep::new(50));
    let task = Task::new(1);
    let mut buf = [0u8; 4];

    let t0 = Instant::now();
    assert_eq!(device.read(&task, &mut UserSlice::new(&mut buf)), Ok(4));
    assert!(t0.elapsed() >= Duration::from_millis(50));
    assert_eq!(u32::from_ne_bytes(buf), 11);

    assert_eq!(device.read(&task, &mut UserSlice::new(&mut buf)), Ok(4));
    assert_eq!(u32::from_ne_bytes(buf), 12);
}

#[test]
fn two_readers_are_serialized() {
    const DELAY_MS: u64 = 200;
    let device = Arc::new(SynchSemaphoreDevice::new(INITIAL, Msleep::new(DELAY_MS)));

    let t0 = Instant::now();
    let mut values = read_concurrently(&device, 2);
    let elapsed = t0.elapsed();

    values.sort_unstable();
    assert_eq!(values, vec![11, 12]);
    assert!(
        elapsed >= Duration::from_millis(2 * DELAY_MS),
        "reads overlapped: {:?}",
        elapsed
    );
}

#[test]
fn reads_through_device_node() {
    let registry = Arc::new(CharDevRegistry::new());
    let mut config = DriverConfig::default();
    config.hardware.delay_ms = 5;

    let module = SynchSemaphoreModule::init(&registry, &config).unwrap();
    let node = module.node_path().to_string();

    let handles: Vec<_> = (1..=4)
        .map(|pid| {
            let registry = Arc::clone(&registry);
            let node = node.clone();
            thread::spawn(move || {
                let task = Task::new(pid);
                let file = registry.open(&node, FileMode::FMODE_READ).unwrap();
                let mut buf = [0u8; 4];
                assert_eq!(file.read(&task, &mut UserSlice::new(&mut buf)), 4);
                u32::from_ne_bytes(buf)
            })
        })
        .collect();

    let values: BTreeSet<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(values, (11..=14).collect::<BTreeSet<u32>>());

    module.exit(&registry);
    assert!(!registry.node_exists(&node));
}
