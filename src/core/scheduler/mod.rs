use std::process::exit;
use tracing::{debug, error};

pub const MAX_EVENTS: usize = 16;
pub const DEFAULT_SLICE_CYCLES: i64 = 128;

/// Everything an event can do when it fires. The run loop owns the dispatch,
/// so callbacks need no captured state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    IpcAcknowledge,
    IpcComplete,
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub name: &'static str,
    pub kind: EventKind,
    pub arg: i32,
    cycles: i64, // remaining cycles to the deadline
}

/// Fixed pool of pending events plus a queue ordered by remaining cycles.
/// Deadlines are measured from the end of the current CPU slice; the queue is
/// not re-aged when a slice drains, which is fine for the handful of HLE
/// timers in play.
pub struct Scheduler {
    events: [Option<Event>; MAX_EVENTS],
    queue: Vec<usize>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            events: [None; MAX_EVENTS],
            queue: Vec::with_capacity(MAX_EVENTS),
        }
    }

    pub fn reset(&mut self) {
        self.events = [None; MAX_EVENTS];
        self.queue.clear();
    }

    /// Queues `kind` to fire `cycles_from_now` cycles ahead. `cycles_to_run`
    /// is the CPU budget still left in the current slice; events are measured
    /// from the end of that slice. A deadline the current slice would already
    /// cover lands at the next slice boundary instead.
    pub fn schedule(
        &mut self,
        name: &'static str,
        kind: EventKind,
        arg: i32,
        cycles_from_now: i64,
        cycles_to_run: i64,
    ) {
        let cycles = (cycles_from_now - cycles_to_run).max(1);

        let Some(slot) = self.events.iter().position(|e| e.is_none()) else {
            error!("Scheduler Failed to add event {} (pool exhausted)", name);
            exit(1);
        };

        debug!("Scheduler {} in {} cycles", name, cycles);

        self.events[slot] = Some(Event {
            name,
            kind,
            arg,
            cycles,
        });

        // Stable: a new event lands after every queued event with an
        // equal-or-earlier deadline.
        let at = self
            .queue
            .iter()
            .position(|&i| self.events[i].unwrap().cycles > cycles)
            .unwrap_or(self.queue.len());
        self.queue.insert(at, slot);
    }

    /// Removes and returns the event with the nearest deadline.
    pub fn pop(&mut self) -> Option<Event> {
        if self.queue.is_empty() {
            return None;
        }
        let slot = self.queue.remove(0);
        self.events[slot].take()
    }

    /// CPU budget for the next slice: the head event's deadline, or a default
    /// when nothing is queued.
    pub fn slice_cycles(event: Option<&Event>) -> i64 {
        event.map_or(DEFAULT_SLICE_CYCLES, |e| e.cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_deadline() {
        let mut s = Scheduler::new();
        s.schedule("late", EventKind::IpcComplete, 0, 300, 0);
        s.schedule("early", EventKind::IpcAcknowledge, 0, 100, 0);
        assert_eq!(s.pop().unwrap().name, "early");
        assert_eq!(s.pop().unwrap().name, "late");
        assert!(s.pop().is_none());
    }

    #[test]
    fn equal_deadlines_keep_insertion_order() {
        let mut s = Scheduler::new();
        s.schedule("first", EventKind::IpcAcknowledge, 1, 100, 0);
        s.schedule("second", EventKind::IpcAcknowledge, 2, 100, 0);
        assert_eq!(s.pop().unwrap().arg, 1);
        assert_eq!(s.pop().unwrap().arg, 2);
    }

    #[test]
    fn deadline_counts_from_end_of_slice() {
        let mut s = Scheduler::new();
        s.schedule("ev", EventKind::IpcAcknowledge, 0, 4096, 100);
        assert_eq!(s.pop().unwrap().cycles, 3996);
    }

    #[test]
    fn deadline_inside_current_slice_defers_to_next_boundary() {
        let mut s = Scheduler::new();
        // the remaining slice budget already covers the whole delay
        s.schedule("ev", EventKind::IpcAcknowledge, 0, 4096, 4096);
        assert_eq!(s.pop().unwrap().cycles, 1);

        s.schedule("ev", EventKind::IpcAcknowledge, 0, 100, 5000);
        assert_eq!(s.pop().unwrap().cycles, 1);
    }

    #[test]
    fn slice_budget() {
        let mut s = Scheduler::new();
        assert_eq!(Scheduler::slice_cycles(None), DEFAULT_SLICE_CYCLES);
        s.schedule("ev", EventKind::IpcComplete, 0, 64, 0);
        let ev = s.pop().unwrap();
        assert_eq!(Scheduler::slice_cycles(Some(&ev)), 64);
    }

    #[test]
    fn slots_are_reusable() {
        let mut s = Scheduler::new();
        for round in 0..4 {
            for i in 0..MAX_EVENTS {
                s.schedule("ev", EventKind::IpcComplete, (round * 16 + i) as i32, 10 + i as i64, 0);
            }
            for i in 0..MAX_EVENTS {
                assert_eq!(s.pop().unwrap().arg, (round * 16 + i) as i32);
            }
        }
    }
}
