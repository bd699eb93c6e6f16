use tokio::sync::watch;

/// Monotonic change counter a view layer can subscribe to.
///
/// Managers bump it after every observable mutation. Subscribers see the
/// latest value only; intermediate bumps coalesce.
#[derive(Debug)]
pub struct Revision {
    sender: watch::Sender<u64>,
}

impl Revision {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self { sender }
    }

    pub fn bump(&self) {
        self.sender.send_modify(|value| *value = value.wrapping_add(1));
    }

    pub fn current(&self) -> u64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::new()
    }
}
