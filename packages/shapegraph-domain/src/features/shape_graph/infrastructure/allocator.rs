//! Node allocation
//!
//! One allocator per analyzed function. Clones share the counter, so every
//! state of the function (including states on different branches) draws ids
//! from the same monotonic sequence and never collides.

use crate::config::{JoinPolicy, OverlapPolicy, ShapeConfig};
use crate::features::shape_graph::domain::NodeId;
use crate::features::shape_graph::ports::NodePolicy;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Policy derived from `ShapeConfig`
#[derive(Debug, Clone)]
pub struct DefaultNodePolicy {
    overlap: OverlapPolicy,
    join: JoinPolicy,
    stack_frame_size: i64,
    max_offset_set: usize,
    dangling_threshold: i64,
}

impl DefaultNodePolicy {
    pub fn from_config(config: &ShapeConfig) -> Self {
        Self {
            overlap: config.overlap_policy,
            join: config.join_policy,
            stack_frame_size: config.stack_frame_size,
            max_offset_set: config.max_offset_set,
            dangling_threshold: config.dangling_threshold,
        }
    }
}

impl Default for DefaultNodePolicy {
    fn default() -> Self {
        Self::from_config(&ShapeConfig::default())
    }
}

impl NodePolicy for DefaultNodePolicy {
    fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap
    }

    fn join_policy(&self) -> JoinPolicy {
        self.join
    }

    fn stack_frame_size(&self) -> i64 {
        self.stack_frame_size
    }

    fn max_offset_set(&self) -> usize {
        self.max_offset_set
    }

    /// Zero or a small power of two
    fn is_plausible_dangling(&self, value: i64) -> bool {
        value == 0 || (value > 0 && value <= self.dangling_threshold && (value & (value - 1)) == 0)
    }
}

/// Monotonic node-id source plus the classification policy
#[derive(Debug, Clone)]
pub struct NodeAllocator {
    next: Arc<AtomicU32>,
    policy: Arc<dyn NodePolicy>,
}

impl NodeAllocator {
    pub fn new(policy: Arc<dyn NodePolicy>) -> Self {
        Self {
            next: Arc::new(AtomicU32::new(0)),
            policy,
        }
    }

    pub fn from_config(config: &ShapeConfig) -> Self {
        Self::new(Arc::new(DefaultNodePolicy::from_config(config)))
    }

    #[inline]
    pub fn next_id(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far
    pub fn allocated(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn policy(&self) -> &dyn NodePolicy {
        self.policy.as_ref()
    }
}

impl Default for NodeAllocator {
    fn default() -> Self {
        Self::new(Arc::new(DefaultNodePolicy::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counter() {
        let a = NodeAllocator::default();
        let b = a.clone();
        assert_eq!(a.next_id(), NodeId(0));
        assert_eq!(b.next_id(), NodeId(1));
        assert_eq!(a.allocated(), 2);
    }

    #[test]
    fn test_dangling_values() {
        let policy = DefaultNodePolicy::default();
        assert!(policy.is_plausible_dangling(0));
        assert!(policy.is_plausible_dangling(8));
        assert!(policy.is_plausible_dangling(64));
        assert!(!policy.is_plausible_dangling(12));
        assert!(!policy.is_plausible_dangling(128));
        assert!(!policy.is_plausible_dangling(-8));
    }

    #[test]
    fn test_policy_from_config() {
        let config = ShapeConfig::default().overlap_policy(OverlapPolicy::Optimistic);
        let alloc = NodeAllocator::from_config(&config);
        assert!(alloc.policy().accepts_tilings());
        assert_eq!(alloc.policy().stack_frame_size(), 4096);
    }
}
