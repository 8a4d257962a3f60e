//! Core type definitions for the stage simulator.
//!
//! This module defines the fundamental types used throughout the simulator.

/// Simulated time, in discrete ticks.
///
/// Every scheduled event and every stage reaction is stamped with a `Tick`.
pub type Tick = u64;

/// Tie-breaker assigned to events at scheduling time.
///
/// Strictly increasing per queue, so two events due at the same tick and
/// phase fire in the order they were scheduled.
pub type Sequence = u64;

/// Unique identifier for a link in the topology.
pub type LinkId = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_aliases() {
        let tick: Tick = 5;
        let seq: Sequence = 42;
        let link: LinkId = 3;

        assert_eq!(tick, 5);
        assert_eq!(seq, 42);
        assert_eq!(link, 3);
    }
}
