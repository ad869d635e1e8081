//! Outbound event delivery to a possibly-detached UI surface.
//!
//! While no surface is attached, only the single most recent undelivered
//! event is retained (last-write-wins, size 1) and flushed on the next
//! attach; earlier undelivered events are dropped.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::PanelEvent;

pub struct PanelBridge {
    inner: Mutex<BridgeInner>,
}

struct BridgeInner {
    attached: Option<mpsc::UnboundedSender<PanelEvent>>,
    pending: Option<PanelEvent>,
}

impl PanelBridge {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BridgeInner {
                attached: None,
                pending: None,
            }),
        }
    }

    /// Attach a surface sink, flushing the retained event if any. If the
    /// flush fails the sink is rejected and the event stays retained.
    pub fn attach(&self, sink: mpsc::UnboundedSender<PanelEvent>) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(event) = inner.pending.take() {
            if let Err(err) = sink.send(event) {
                inner.pending = Some(err.0);
                return;
            }
        }
        inner.attached = Some(sink);
    }

    pub fn detach(&self) {
        self.inner.lock().unwrap().attached = None;
    }

    pub fn is_attached(&self) -> bool {
        self.inner.lock().unwrap().attached.is_some()
    }

    /// Deliver an event to the attached surface, or retain it as the
    /// single pending event while detached. A failed send means the
    /// surface went away: the bridge detaches and retains the event.
    pub fn publish(&self, event: PanelEvent) {
        let mut inner = self.inner.lock().unwrap();
        match &inner.attached {
            Some(sink) => {
                if let Err(err) = sink.send(event) {
                    debug!("panel surface went away, retaining event");
                    inner.attached = None;
                    inner.pending = Some(err.0);
                }
            }
            None => inner.pending = Some(event),
        }
    }
}

impl Default for PanelBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> PanelEvent {
        PanelEvent::AddQuestion {
            value: text.into(),
            code: None,
        }
    }

    #[test]
    fn attached_events_are_delivered_in_order() {
        let bridge = PanelBridge::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge.attach(tx);

        bridge.publish(question("m1"));
        bridge.publish(question("m2"));

        assert_eq!(rx.try_recv().unwrap(), question("m1"));
        assert_eq!(rx.try_recv().unwrap(), question("m2"));
    }

    #[test]
    fn detached_retains_only_most_recent() {
        let bridge = PanelBridge::new();
        bridge.publish(question("m1"));
        bridge.publish(question("m2"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge.attach(tx);

        assert_eq!(rx.try_recv().unwrap(), question("m2"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn attach_without_pending_flushes_nothing() {
        let bridge = PanelBridge::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge.attach(tx);
        assert!(rx.try_recv().is_err());
        assert!(bridge.is_attached());
    }

    #[test]
    fn dropped_receiver_marks_detached_and_retains() {
        let bridge = PanelBridge::new();
        let (tx, rx) = mpsc::unbounded_channel();
        bridge.attach(tx);
        drop(rx);

        bridge.publish(question("kept"));
        assert!(!bridge.is_attached());

        let (tx2, mut rx2) = mpsc::unbounded_channel();
        bridge.attach(tx2);
        assert_eq!(rx2.try_recv().unwrap(), question("kept"));
    }

    #[test]
    fn explicit_detach_then_reattach() {
        let bridge = PanelBridge::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        bridge.attach(tx);
        bridge.detach();
        assert!(!bridge.is_attached());

        bridge.publish(question("buffered"));
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        bridge.attach(tx2);
        assert_eq!(rx2.try_recv().unwrap(), question("buffered"));
    }
}
