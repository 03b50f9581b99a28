use crossbeam_channel::Sender;

use super::event::Event;

/// Consumer of the event stream. The simulation calls `on_event` exactly once
/// per event, in emission order.
pub trait EventSink {
    fn on_event(&mut self, event: &Event);
}

impl EventSink for Vec<Event> {
    fn on_event(&mut self, event: &Event) {
        self.push(event.clone());
    }
}

impl<K: EventSink + ?Sized> EventSink for &mut K {
    fn on_event(&mut self, event: &Event) {
        (**self).on_event(event);
    }
}

impl<K: EventSink + ?Sized> EventSink for Box<K> {
    fn on_event(&mut self, event: &Event) {
        (**self).on_event(event);
    }
}

/// Discards everything; for callers that only read the retained trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn on_event(&mut self, _event: &Event) {}
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(&Event)> EventSink for FnSink<F> {
    fn on_event(&mut self, event: &Event) {
        (self.0)(event);
    }
}

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

/// Forwards events to another thread, typically the renderer's.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Event>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(tx: Sender<Event>) -> Self {
        Self { tx, dropped: 0 }
    }

    /// Events that could not be sent because the receiver hung up.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for ChannelSink {
    fn on_event(&mut self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            self.dropped += 1;
            tracing::warn!(seq = event.seq, "event receiver disconnected");
        }
    }
}
