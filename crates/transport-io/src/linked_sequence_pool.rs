//! `LinkedSequencePool` — default `SequencePool` implementation.
//!
//! A free-list of linked cells, each holding one buffer id, chained into
//! sequences for multi-buffer logical transfers. Modeled on the
//! free-list/slab pattern used for connection slots elsewhere in this
//! codebase (allocate from a `Vec<usize>` free stack, return on release).

use transport_core::sequence::{ElementId, SequenceId, SequencePool};

struct Cell {
    buffer_id: u16,
    next: Option<ElementId>,
}

#[derive(Clone, Copy)]
struct SeqHead {
    first: Option<ElementId>,
    last: Option<ElementId>,
}

pub struct LinkedSequencePool {
    cells: Vec<Cell>,
    cell_used: Vec<bool>,
    free_cells: Vec<ElementId>,
    heads: Vec<Option<SeqHead>>,
    free_seqs: Vec<SequenceId>,
}

impl LinkedSequencePool {
    pub fn new(sequences_count: usize, elements_capacity: usize) -> Self {
        let free_seqs = (0..sequences_count).rev().map(|i| i as SequenceId).collect();
        let free_cells = (0..elements_capacity).rev().map(|i| i as ElementId).collect();
        Self {
            cells: (0..elements_capacity)
                .map(|_| Cell { buffer_id: 0, next: None })
                .collect(),
            cell_used: vec![false; elements_capacity],
            free_cells,
            heads: vec![None; sequences_count],
            free_seqs,
        }
    }

    fn predecessor_of(&self, seq: SequenceId, elem: ElementId) -> Option<ElementId> {
        let head = self.heads[seq as usize]?;
        let mut cur = head.first?;
        if cur == elem {
            return None;
        }
        loop {
            let next = self.cells[cur as usize].next?;
            if next == elem {
                return Some(cur);
            }
            cur = next;
        }
    }
}

impl SequencePool for LinkedSequencePool {
    fn get(&mut self) -> Option<SequenceId> {
        let seq = self.free_seqs.pop()?;
        self.heads[seq as usize] = Some(SeqHead { first: None, last: None });
        Some(seq)
    }

    fn release(&mut self, seq: SequenceId) {
        let mut cur = self.heads[seq as usize].and_then(|h| h.first);
        while let Some(elem) = cur {
            cur = self.cells[elem as usize].next;
            self.cell_used[elem as usize] = false;
            self.free_cells.push(elem);
        }
        self.heads[seq as usize] = None;
        self.free_seqs.push(seq);
    }

    fn add_buffer(&mut self, seq: SequenceId, buffer_id: u16) -> Option<ElementId> {
        let elem = self.free_cells.pop()?;
        self.cell_used[elem as usize] = true;
        self.cells[elem as usize] = Cell { buffer_id, next: None };

        let head = self.heads[seq as usize].get_or_insert(SeqHead { first: None, last: None });
        match head.last {
            Some(last) => self.cells[last as usize].next = Some(elem),
            None => head.first = Some(elem),
        }
        head.last = Some(elem);
        Some(elem)
    }

    fn first(&self, seq: SequenceId) -> Option<ElementId> {
        self.heads[seq as usize].and_then(|h| h.first)
    }

    fn next(&self, _seq: SequenceId, elem: ElementId) -> Option<ElementId> {
        self.cells[elem as usize].next
    }

    fn last(&self, seq: SequenceId) -> Option<ElementId> {
        self.heads[seq as usize].and_then(|h| h.last)
    }

    fn buffer_of(&self, elem: ElementId) -> u16 {
        self.cells[elem as usize].buffer_id
    }

    fn delete(&mut self, seq: SequenceId, elem: ElementId) {
        let pred = self.predecessor_of(seq, elem);
        let next = self.cells[elem as usize].next;
        if let Some(head) = self.heads[seq as usize].as_mut() {
            match pred {
                Some(p) => self.cells[p as usize].next = next,
                None => head.first = next,
            }
            if head.last == Some(elem) {
                head.last = pred;
            }
        }
    }

    fn release_element(&mut self, seq: SequenceId, elem: ElementId) {
        self.delete(seq, elem);
        self.cell_used[elem as usize] = false;
        self.free_cells.push(elem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_until_release() {
        let mut pool = LinkedSequencePool::new(2, 8);
        let seq = pool.get().unwrap();
        let e0 = pool.add_buffer(seq, 10).unwrap();
        let e1 = pool.add_buffer(seq, 11).unwrap();
        let e2 = pool.add_buffer(seq, 12).unwrap();

        assert_eq!(pool.first(seq), Some(e0));
        assert_eq!(pool.next(seq, e0), Some(e1));
        assert_eq!(pool.next(seq, e1), Some(e2));
        assert_eq!(pool.last(seq), Some(e2));
        assert_eq!(pool.buffer_of(e1), 11);
    }

    #[test]
    fn release_element_unlinks_and_frees() {
        let mut pool = LinkedSequencePool::new(1, 4);
        let seq = pool.get().unwrap();
        let e0 = pool.add_buffer(seq, 1).unwrap();
        let e1 = pool.add_buffer(seq, 2).unwrap();

        pool.release_element(seq, e0);
        assert_eq!(pool.first(seq), Some(e1));

        // the freed cell is available again
        let e2 = pool.add_buffer(seq, 3).unwrap();
        assert_eq!(e2, e0);
    }

    #[test]
    fn delete_unlinks_without_freeing() {
        let mut pool = LinkedSequencePool::new(1, 4);
        let seq = pool.get().unwrap();
        let e0 = pool.add_buffer(seq, 1).unwrap();
        let e1 = pool.add_buffer(seq, 2).unwrap();

        pool.delete(seq, e0);
        assert_eq!(pool.first(seq), Some(e1));
        // the cell is still marked used — not returned to the free list.
        assert!(pool.cell_used[e0 as usize]);
    }

    #[test]
    fn iteration_survives_release_of_current_node() {
        let mut pool = LinkedSequencePool::new(1, 4);
        let seq = pool.get().unwrap();
        let e0 = pool.add_buffer(seq, 1).unwrap();
        let e1 = pool.add_buffer(seq, 2).unwrap();

        let mut visited = Vec::new();
        let mut cur = pool.first(seq);
        while let Some(elem) = cur {
            let captured_next = pool.next(seq, elem);
            visited.push(pool.buffer_of(elem));
            pool.release_element(seq, elem);
            cur = captured_next;
        }
        assert_eq!(visited, vec![1, 2]);
        let _ = e1;
    }
}
