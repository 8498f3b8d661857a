//! 后台轮询任务
//!
//! 每个长期运行的任务对应一个 [`PollingWorker`]：取消标志 + JoinHandle。
//! 停止 = 设置取消标志，然后 join；任务线程内部调用 `stop` 时只设置标志，不会 join 自己。

use crate::error::DriverError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// 可中断睡眠的最大切片
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// 协作式取消令牌
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// 分片睡眠，期间检查取消标志；被取消时返回 `false`
    pub fn sleep(&self, duration: Duration) -> bool {
        self.sleep_until(Instant::now() + duration)
    }

    /// 睡眠到指定时刻；被取消时返回 `false`
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            spin_sleep::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

struct RunningTask {
    token: CancelToken,
    handle: JoinHandle<()>,
}

/// 可重复启动/停止的后台任务
///
/// - `start` 幂等：任务运行中再次调用不会启动第二个线程
/// - `stop` 阻塞直到线程退出；返回后不会再有旧任务发出的命令
/// - 任务体内只允许调用 [`PollingWorker::is_current_thread`] 和 `stop`
pub struct PollingWorker {
    name: &'static str,
    slot: Mutex<Option<RunningTask>>,
    thread_id: Mutex<Option<ThreadId>>,
}

impl PollingWorker {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
            thread_id: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 启动任务；已在运行时返回 `Ok(false)`
    pub fn start<F>(&self, body: F) -> Result<bool, DriverError>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let mut slot = self.slot.lock();

        if let Some(task) = slot.as_ref()
            && !task.handle.is_finished()
        {
            debug!("{}: already running", self.name);
            return Ok(false);
        }

        // 回收已自然结束的旧线程
        if let Some(task) = slot.take()
            && task.handle.join().is_err()
        {
            error!("{}: previous worker panicked", self.name);
        }

        let token = CancelToken::new();
        let worker_token = token.clone();
        let name = self.name;
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                #[cfg(feature = "realtime")]
                raise_priority(name);
                body(worker_token);
                debug!("{}: exited", name);
            })
            .map_err(|e| DriverError::Thread(format!("{name}: {e}")))?;

        *self.thread_id.lock() = Some(handle.thread().id());
        *slot = Some(RunningTask { token, handle });
        debug!("{}: started", self.name);
        Ok(true)
    }

    /// 停止任务并等待退出；任务未运行时返回 `false`
    ///
    /// 在任务自身线程内调用时只设置取消标志，任务体返回后线程自然结束。
    pub fn stop(&self) -> bool {
        if self.is_current_thread() {
            if let Some(task) = self.slot.try_lock().as_ref().and_then(|s| s.as_ref()) {
                task.token.cancel();
            }
            warn!("{}: stop requested from inside the worker, not joining", self.name);
            return false;
        }

        let mut slot = self.slot.lock();
        let Some(task) = slot.take() else {
            return false;
        };
        task.token.cancel();
        if task.handle.join().is_err() {
            error!("{}: worker panicked", self.name);
        }
        *self.thread_id.lock() = None;
        debug!("{}: stopped", self.name);
        true
    }

    /// 任务线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.slot
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// 当前线程是否就是任务线程
    pub fn is_current_thread(&self) -> bool {
        *self.thread_id.lock() == Some(std::thread::current().id())
    }
}

impl Drop for PollingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(feature = "realtime")]
fn raise_priority(name: &str) {
    use thread_priority::*;

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => {
            tracing::info!("{} thread priority set to MAX (realtime)", name);
        },
        Err(e) => {
            warn!(
                "Failed to set {} thread priority: {:?}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                name, e
            );
        },
    }
}
