use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Inner {
    stopped: AtomicBool,
    wake_sender: Sender<()>,
    wake_receiver: Receiver<()>,
}

/// Cooperative cancellation shared by the orchestrator, its workers and the
/// console. Workers poll it between steps; the monitor sleeps on it.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl Default for StopToken {
    fn default() -> Self {
        let (wake_sender, wake_receiver) = bounded(1);
        Self {
            inner: Arc::new(Inner {
                stopped: AtomicBool::new(false),
                wake_sender,
                wake_receiver,
            }),
        }
    }
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        // a full channel already holds a pending wakeup
        let _ = self.inner.wake_sender.try_send(());
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Sleeps for up to `timeout`, returning early once stopped.
    /// Returns whether the token is stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        let _ = self.inner.wake_receiver.recv_timeout(timeout);
        self.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_times_out_while_running() {
        let token = StopToken::new();
        let started = Instant::now();
        assert!(!token.wait_timeout(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn stop_wakes_waiter() {
        let token = StopToken::new();
        let waiter = {
            let token = token.clone();
            thread::spawn(move || token.wait_timeout(Duration::from_secs(30)))
        };
        let started = Instant::now();
        thread::sleep(Duration::from_millis(10));
        token.stop();
        assert!(waiter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn stop_is_idempotent() {
        let token = StopToken::new();
        token.stop();
        token.stop();
        assert!(token.is_stopped());
        assert!(token.wait_timeout(Duration::from_secs(30)));
        assert!(token.wait_timeout(Duration::from_secs(30)));
    }
}
