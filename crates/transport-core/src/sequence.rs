//! Sequence pool abstraction — linked chains of buffer ids for multi-buffer
//! logical transfers.
//!
//! # Implementors
//!
//! - `LinkedSequencePool` (default, in `transport-io`): a free-list of
//!   linked cells, each holding one buffer id.

pub type SequenceId = u16;
pub type ElementId = u16;

/// Manages sequences — ordered chains of buffer ids released in completion
/// order.
///
/// **Contract:** `delete` unlinks an element without freeing its cell back
/// to the pool's free list; `release_element` unlinks AND frees. Iteration
/// via repeated `next` remains valid across a `release_element` of the
/// current node as long as the caller captures `next` before releasing.
pub trait SequencePool {
    /// Allocate a new, empty sequence.
    fn get(&mut self) -> Option<SequenceId>;

    /// Release an entire sequence and every cell it still holds.
    fn release(&mut self, seq: SequenceId);

    /// Append a buffer id to the end of the sequence.
    fn add_buffer(&mut self, seq: SequenceId, buffer_id: u16) -> Option<ElementId>;

    /// First element of the sequence, if any.
    fn first(&self, seq: SequenceId) -> Option<ElementId>;

    /// Element following `elem` within the same sequence.
    fn next(&self, seq: SequenceId, elem: ElementId) -> Option<ElementId>;

    /// Last element of the sequence, if any.
    fn last(&self, seq: SequenceId) -> Option<ElementId>;

    /// The buffer id held by `elem`.
    fn buffer_of(&self, elem: ElementId) -> u16;

    /// Unlink `elem` from its sequence without freeing its cell.
    fn delete(&mut self, seq: SequenceId, elem: ElementId);

    /// Unlink `elem` from its sequence and free its cell back to the pool.
    fn release_element(&mut self, seq: SequenceId, elem: ElementId);
}
