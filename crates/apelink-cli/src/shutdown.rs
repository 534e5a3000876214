use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Shutdown flag with interruptible waits: a thread parked in `wait`
/// wakes as soon as `trigger` runs instead of finishing its timeout.
pub struct ShutdownSignal {
    flag: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wait out `duration` unless shutdown arrives first. Returns
    /// `true` when shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }
        let guard = match self.mutex.lock() {
            Ok(guard) => guard,
            // Poisoned mutex: treat as shutdown.
            Err(_) => return true,
        };
        match self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_shutdown())
        {
            Ok((_, timeout)) => !timeout.timed_out(),
            Err(_) => true,
        }
    }

}

impl apelink_core::Shutdown for ShutdownSignal {
    fn wait(&self, duration: Duration) -> bool {
        ShutdownSignal::wait(self, duration)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_starts_clear() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
    }

    #[test]
    fn test_wait_times_out() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_trigger_interrupts_wait() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = Arc::clone(&signal);
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(30));
        signal.trigger();

        assert!(handle.join().unwrap());
        assert!(signal.is_shutdown());
    }
}
