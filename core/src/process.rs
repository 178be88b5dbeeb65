//! Process control blocks and the ready ring.
//!
//! PCBs live in a fixed arena and are addressed by [`Slot`] handles. The
//! ready queue is a single cycle threaded through the `next` field of every
//! live PCB; the kernel task is always part of it.

use core::ops::{Index, IndexMut};

use pmos_abi::{InterruptFrame, Pid, ProcessError, ProcessResult, ProcessState, MAX_PROCESSES};
use pmos_mm::{AddressSpace, PhysFrame};

/// Stable handle to a PCB in a [`ProcessTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot(u8);

impl Slot {
    pub const FIRST: Self = Self(0);

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcessState,
    /// Saved kernel stack pointer. Zero until the process has run once.
    pub esp: u32,
    /// Kernel stack frame; `None` for the kernel task, which keeps the boot
    /// stack.
    pub kernel_stack: Option<PhysFrame>,
    /// Value for TSS esp0 while this process runs.
    pub stack_top: u32,
    pub space: AddressSpace,
    pub next: Slot,
    /// One-shot register state for the first run after `fork`.
    pub seed: Option<InterruptFrame>,
    pub parent: Option<Pid>,
}

impl Process {
    /// Whether the process still needs its first-run stack built.
    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.esp == 0 && self.seed.is_some()
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state != ProcessState::Dead
    }
}

pub struct ProcessTable {
    slots: [Option<Process>; MAX_PROCESSES],
    len: usize,
}

impl ProcessTable {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; MAX_PROCESSES],
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == MAX_PROCESSES
    }

    /// Store `process` in a free slot. The caller links it into the ring.
    pub fn insert(&mut self, process: Process) -> ProcessResult<Slot> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(ProcessError::TableFull)?;
        self.slots[index] = Some(process);
        self.len += 1;
        Ok(Slot(index as u8))
    }

    /// Take the PCB out of the arena. The caller must have unlinked it.
    pub fn remove(&mut self, slot: Slot) -> Option<Process> {
        let process = self.slots.get_mut(slot.index())?.take()?;
        self.len -= 1;
        Some(process)
    }

    #[inline]
    pub fn get(&self, slot: Slot) -> Option<&Process> {
        self.slots.get(slot.index())?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut Process> {
        self.slots.get_mut(slot.index())?.as_mut()
    }

    pub fn find(&self, pid: Pid) -> Option<Slot> {
        self.slots
            .iter()
            .position(|p| p.as_ref().is_some_and(|p| p.pid == pid))
            .map(|i| Slot(i as u8))
    }

    /// Insert `new` into the ring right after `at`.
    pub fn link_after(&mut self, at: Slot, new: Slot) {
        let following = self[at].next;
        self[new].next = following;
        self[at].next = new;
    }

    /// Remove `slot` from the ring, returning its predecessor. A ring of one
    /// cannot be unlinked.
    pub fn unlink(&mut self, slot: Slot) -> Option<Slot> {
        let prev = self.ring(slot).find(|&s| self[s].next == slot)?;
        if prev == slot {
            return None;
        }
        let following = self[slot].next;
        self[prev].next = following;
        self[slot].next = slot;
        Some(prev)
    }

    /// Walk the ring once, starting at `start`.
    pub fn ring(&self, start: Slot) -> Ring<'_> {
        Ring {
            table: self,
            start,
            cursor: Some(start),
        }
    }

    /// Every occupied slot, in arena order.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_some())
            .map(|(i, _)| Slot(i as u8))
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Slot> for ProcessTable {
    type Output = Process;

    /// Panics on a stale slot; live slots are only ever taken from the ring.
    fn index(&self, slot: Slot) -> &Process {
        match self.get(slot) {
            Some(process) => process,
            None => panic!("stale process slot {}", slot.index()),
        }
    }
}

impl IndexMut<Slot> for ProcessTable {
    fn index_mut(&mut self, slot: Slot) -> &mut Process {
        match self.get_mut(slot) {
            Some(process) => process,
            None => panic!("stale process slot {}", slot.index()),
        }
    }
}

pub struct Ring<'a> {
    table: &'a ProcessTable,
    start: Slot,
    cursor: Option<Slot>,
}

impl Iterator for Ring<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let slot = self.cursor?;
        let next = self.table.get(slot)?.next;
        self.cursor = (next != self.start).then_some(next);
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HostFrames;

    fn pcb(pid: Pid) -> Process {
        Process {
            pid,
            state: ProcessState::Ready,
            esp: 0,
            kernel_stack: None,
            stack_top: 0,
            space: dummy_space(),
            next: Slot(0),
            seed: None,
            parent: None,
        }
    }

    fn dummy_space() -> AddressSpace {
        // Only the handle is used; nothing here walks the tables.
        let mut frames = HostFrames::new(4);
        AddressSpace::new_kernel(&mut frames).unwrap()
    }

    fn ring_pids(table: &ProcessTable, start: Slot) -> Vec<Pid> {
        table.ring(start).map(|s| table[s].pid).collect()
    }

    #[test]
    fn link_and_unlink_keep_one_cycle() {
        let mut table = ProcessTable::new();
        let a = table.insert(pcb(1)).unwrap();
        table[a].next = a;
        let b = table.insert(pcb(2)).unwrap();
        table.link_after(a, b);
        let c = table.insert(pcb(3)).unwrap();
        table.link_after(b, c);
        assert_eq!(ring_pids(&table, a), vec![1, 2, 3]);

        let d = table.insert(pcb(4)).unwrap();
        table.link_after(a, d);
        assert_eq!(ring_pids(&table, a), vec![1, 4, 2, 3]);

        assert_eq!(table.unlink(b), Some(d));
        assert_eq!(ring_pids(&table, a), vec![1, 4, 3]);
        assert!(table.remove(b).is_some());
        assert_eq!(table.len(), 3);
        assert_eq!(table.find(3), Some(c));
        assert_eq!(table.find(2), None);
    }

    #[test]
    fn single_entry_ring_cannot_unlink() {
        let mut table = ProcessTable::new();
        let a = table.insert(pcb(1)).unwrap();
        table[a].next = a;
        assert_eq!(table.unlink(a), None);
        assert_eq!(ring_pids(&table, a), vec![1]);
    }

    #[test]
    fn full_table_is_reported() {
        let mut table = ProcessTable::new();
        for pid in 0..MAX_PROCESSES as Pid {
            table.insert(pcb(pid)).unwrap();
        }
        assert!(table.is_full());
        assert_eq!(table.insert(pcb(999)).unwrap_err(), ProcessError::TableFull);
    }
}
