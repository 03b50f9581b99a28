use serde::{Deserialize, Serialize};

use crate::{
    core::{Pid, Ticks},
    memory::MemUnit,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreemptReason {
    QuantumExpired,
    // A ready process ranks strictly ahead of the running one
    Outranked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fragmentation {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    Admitted,
    Dispatched {
        remaining: Ticks,
    },
    Preempted {
        remaining: Ticks,
        reason: PreemptReason,
    },
    Blocked {
        io: Ticks,
    },
    Woken,
    Completed,
    // CPU idle even after asking the policy
    CpuIdle,
    Allocated {
        start: u64,
        size: u64,
        unit: MemUnit,
    },
    Freed {
        start: u64,
        size: u64,
        unit: MemUnit,
    },
    Fragmented {
        fragmentation: Fragmentation,
        amount: u64,
    },
    Rejected {
        requested: u64,
    },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Dispatched { .. } => "dispatched",
            Self::Preempted { .. } => "preempted",
            Self::Blocked { .. } => "blocked",
            Self::Woken => "woken",
            Self::Completed => "completed",
            Self::CpuIdle => "cpu-idle",
            Self::Allocated { .. } => "allocated",
            Self::Freed { .. } => "freed",
            Self::Fragmented { .. } => "fragmented",
            Self::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub time: Ticks,
    pub pid: Option<Pid>,
    pub kind: EventKind,
}

/// Append-only record of everything a run has emitted. Events are handed to
/// the sink in batches; `delivered` marks how far that has got.
#[derive(Debug, Default, Clone)]
pub struct Trace {
    events: Vec<Event>,
    delivered: usize,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, time: Ticks, pid: Option<Pid>, kind: EventKind) {
        if let Some(last) = self.events.last() {
            debug_assert!(
                last.time <= time,
                "event at t={time} emitted after t={}",
                last.time
            );
        }
        let seq = self.events.len() as u64;
        tracing::trace!(seq, time, ?pid, kind = kind.label(), "emit");
        self.events.push(Event {
            seq,
            time,
            pid,
            kind,
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn take_undelivered(&mut self) -> &[Event] {
        let start = self.delivered;
        self.delivered = self.events.len();
        &self.events[start..]
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
        self.delivered = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_follow_emission_order() {
        let mut trace = Trace::new();
        trace.emit(0, Some(1), EventKind::Admitted);
        trace.emit(0, Some(1), EventKind::Dispatched { remaining: 3 });
        trace.emit(3, Some(1), EventKind::Completed);

        let seqs: Vec<u64> = trace.events().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }

    #[test]
    fn undelivered_events_are_handed_out_once() {
        let mut trace = Trace::new();
        trace.emit(0, Some(1), EventKind::Admitted);
        assert_eq!(trace.take_undelivered().len(), 1);
        assert!(trace.take_undelivered().is_empty());

        trace.emit(2, None, EventKind::CpuIdle);
        let batch = trace.take_undelivered();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, EventKind::CpuIdle);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = Event {
            seq: 4,
            time: 9,
            pid: Some(2),
            kind: EventKind::Preempted {
                remaining: 1,
                reason: PreemptReason::QuantumExpired,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"seq":4,"time":9,"pid":2,"kind":{"type":"preempted","remaining":1,"reason":"quantum-expired"}}"#
        );
    }
}
