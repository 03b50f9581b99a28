use super::state::{Pid, ProcessState, ProcessTable};

/// Consistency checks run after every CPU step. Debug builds only.
#[derive(Debug, Default)]
pub struct Observer {
    step: u64,
}

impl Observer {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, table: &ProcessTable, running: Option<Pid>, queued: &[Pid]) {
        self.step += 1;

        let on_cpu: Vec<Pid> = table
            .in_state(ProcessState::Running)
            .map(|p| p.pid)
            .collect();
        debug_assert!(
            on_cpu.len() <= 1,
            "step {}: several processes running at once: {on_cpu:?}",
            self.step
        );
        debug_assert_eq!(
            on_cpu.first().copied(),
            running,
            "step {}: CPU owner does not match process states",
            self.step
        );

        for &pid in queued {
            debug_assert!(
                table
                    .get(pid)
                    .is_ok_and(|p| p.state() == ProcessState::Ready),
                "step {}: queued process {pid} is not Ready",
                self.step
            );
        }
        debug_assert_eq!(
            table.in_state(ProcessState::Ready).count(),
            queued.len(),
            "step {}: a Ready process is missing from the ready queue",
            self.step
        );
    }
}
