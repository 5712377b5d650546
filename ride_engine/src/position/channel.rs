use tokio::sync::mpsc;

use super::{PositionEvent, PositionProvider, WatchOptions};

/// Fixes pushed in by a host integration, e.g. a mobile shell forwarding its
/// platform location callbacks.
pub struct ChannelPositionProvider {
    rx: mpsc::Receiver<PositionEvent>,
}

impl ChannelPositionProvider {
    pub fn new(capacity: usize) -> (mpsc::Sender<PositionEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl PositionProvider for ChannelPositionProvider {
    async fn next_fix(&mut self, _options: &WatchOptions) -> Option<PositionEvent> {
        self.rx.recv().await
    }
}
