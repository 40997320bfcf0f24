// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
//
// Stream priority tree (RFC 7540 section 5.3): an arena of nodes keyed by
// stream id, with edges as id-valued parent pointers. Reparenting is pure
// arithmetic on ids; there are no ownership cycles.

use std::collections::HashMap;

use crate::frame::StreamIdentifier;

const DEFAULT_WEIGHT: u8 = 16;

#[derive(Clone, Debug)]
struct Node {
    parent: StreamIdentifier,
    weight: u8,
    children: Vec<StreamIdentifier>,
}

#[derive(Default)]
pub struct PriorityTree {
    nodes: HashMap<StreamIdentifier, Node>,
}

impl PriorityTree {
    pub fn new() -> Self {
        PriorityTree {
            nodes: HashMap::new(),
        }
    }

    pub fn weight(&self, stream_id: StreamIdentifier) -> u8 {
        self.nodes
            .get(&stream_id)
            .map(|n| n.weight)
            .unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn parent(&self, stream_id: StreamIdentifier) -> StreamIdentifier {
        self.nodes
            .get(&stream_id)
            .map(|n| n.parent)
            .unwrap_or_else(StreamIdentifier::zero)
    }

    /// Applies a PRIORITY frame or a HEADERS frame's priority block
    /// (RFC 7540 section 5.3.1): reparent `stream_id` under `dependency_id`
    /// with the given `weight`, moving `stream_id`'s existing children along
    /// with it. If `exclusive`, every other child of `dependency_id`
    /// becomes a child of `stream_id` instead (cycles are impossible by
    /// construction since we always detach before reattaching).
    pub fn reprioritize(
        &mut self,
        stream_id: StreamIdentifier,
        dependency_id: StreamIdentifier,
        weight: u8,
        exclusive: bool,
    ) {
        if stream_id == dependency_id {
            // RFC 7540 section 5.3.1: a stream cannot depend on itself; the
            // frame reader rejects this before it reaches the tree, but stay
            // defensive here too.
            return;
        }

        // RFC 7540 section 5.3.3: reparenting `stream_id` under one of its
        // own descendants would create a cycle. Instead, the descendant is
        // first moved to `stream_id`'s old parent, keeping its own weight.
        if self.is_descendant(dependency_id, stream_id) {
            let old_parent = self.parent(stream_id);
            let dependency_weight = self.weight(dependency_id);
            self.detach(dependency_id);
            self.set_parent(dependency_id, old_parent);
            if let Some(node) = self.nodes.get_mut(&dependency_id) {
                node.weight = dependency_weight;
            }
        }

        self.detach(stream_id);

        if exclusive {
            let previous_children: Vec<StreamIdentifier> = self
                .nodes
                .get(&dependency_id)
                .map(|n| n.children.clone())
                .unwrap_or_default();
            for child in previous_children {
                if child == stream_id {
                    continue;
                }
                self.set_parent(child, stream_id);
            }
            if let Some(node) = self.nodes.get_mut(&dependency_id) {
                node.children.clear();
            }
        }

        self.set_parent(stream_id, dependency_id);
        self.nodes.entry(stream_id).or_insert_with(|| Node {
            parent: dependency_id,
            weight,
            children: Vec::new(),
        });
        if let Some(node) = self.nodes.get_mut(&stream_id) {
            node.weight = weight;
        }
    }

    pub fn remove(&mut self, stream_id: StreamIdentifier) {
        self.detach(stream_id);
        self.nodes.remove(&stream_id);
    }

    /// Walks `node_id`'s parent chain looking for `ancestor_id`.
    fn is_descendant(&self, node_id: StreamIdentifier, ancestor_id: StreamIdentifier) -> bool {
        let mut current = self.parent(node_id);
        while !current.is_zero() {
            if current == ancestor_id {
                return true;
            }
            current = self.parent(current);
        }
        false
    }

    fn detach(&mut self, stream_id: StreamIdentifier) {
        let parent = self.parent(stream_id);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|&id| id != stream_id);
        }
    }

    fn set_parent(&mut self, stream_id: StreamIdentifier, parent: StreamIdentifier) {
        self.nodes
            .entry(stream_id)
            .or_insert_with(|| Node {
                parent: StreamIdentifier::zero(),
                weight: DEFAULT_WEIGHT,
                children: Vec::new(),
            })
            .parent = parent;
        self.nodes
            .entry(parent)
            .or_insert_with(|| Node {
                parent: StreamIdentifier::zero(),
                weight: DEFAULT_WEIGHT,
                children: Vec::new(),
            })
            .children
            .push(stream_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weight_applies_until_a_priority_frame_arrives() {
        let tree = PriorityTree::new();
        assert_eq!(tree.weight(StreamIdentifier::from(1)), DEFAULT_WEIGHT);
        assert!(tree.parent(StreamIdentifier::from(1)).is_zero());
    }

    #[test]
    fn reprioritize_sets_parent_and_weight() {
        let mut tree = PriorityTree::new();
        tree.reprioritize(StreamIdentifier::from(3), StreamIdentifier::from(1), 200, false);
        assert_eq!(tree.parent(StreamIdentifier::from(3)), StreamIdentifier::from(1));
        assert_eq!(tree.weight(StreamIdentifier::from(3)), 200);
    }

    #[test]
    fn exclusive_reparent_displaces_existing_children() {
        let mut tree = PriorityTree::new();
        tree.reprioritize(StreamIdentifier::from(3), StreamIdentifier::from(1), 16, false);
        tree.reprioritize(StreamIdentifier::from(5), StreamIdentifier::from(1), 16, true);

        assert_eq!(tree.parent(StreamIdentifier::from(3)), StreamIdentifier::from(5));
        assert_eq!(tree.parent(StreamIdentifier::from(5)), StreamIdentifier::from(1));
    }

    #[test]
    fn reparenting_under_a_descendant_moves_the_descendant_first() {
        let mut tree = PriorityTree::new();
        // 1 -> 3 -> 5 (5 depends on 3, 3 depends on 1).
        tree.reprioritize(StreamIdentifier::from(3), StreamIdentifier::from(1), 16, false);
        tree.reprioritize(StreamIdentifier::from(5), StreamIdentifier::from(3), 16, false);

        // Now make 1 depend on 5, one of 1's own descendants.
        tree.reprioritize(StreamIdentifier::from(1), StreamIdentifier::from(5), 16, false);

        // 5 is moved to 1's old parent (the root) before 1 is attached to it.
        assert!(tree.parent(StreamIdentifier::from(5)).is_zero());
        assert_eq!(tree.parent(StreamIdentifier::from(1)), StreamIdentifier::from(5));
        assert_eq!(tree.parent(StreamIdentifier::from(3)), StreamIdentifier::from(1));
    }

    #[test]
    fn removing_a_stream_detaches_it_from_its_parent() {
        let mut tree = PriorityTree::new();
        tree.reprioritize(StreamIdentifier::from(3), StreamIdentifier::from(1), 16, false);
        tree.remove(StreamIdentifier::from(3));
        assert!(tree.parent(StreamIdentifier::from(3)).is_zero());
    }
}
