//! Broad-phase: a dynamic AABB tree with fattened leaf bounds, matching
//! the data structure `spec.md` §4.5 calls for (the teacher's own
//! broad-phase is a `SpatialHash`; only its module placement and the
//! insert/move/query entry-point shape are carried over from
//! `physics/broadphase.rs` — the tree itself is new).

use crate::math::{Aabb, Vec2};

const AABB_EXTENSION: f32 = 0.1;
const AABB_MULTIPLIER: f32 = 4.0;
const NULL_NODE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    aabb: Aabb,
    /// Opaque payload handed back from queries (a fixture/proxy id).
    user_data: u32,
    parent_or_next: u32,
    child1: u32,
    child2: u32,
    /// 0 for a leaf, otherwise 1 + subtree height (used to rebalance).
    height: i32,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.child1 == NULL_NODE
    }
}

/// A dynamic, incrementally-balanced bounding volume hierarchy over fat
/// AABBs. Proxies are created once per fixture and moved (re-inserted only
/// when the shape's tight AABB escapes its fattened bound) every step.
pub struct DynamicTree {
    nodes: Vec<Node>,
    root: u32,
    free_list: u32,
    node_count: u32,
}

impl Default for DynamicTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicTree {
    pub fn new() -> Self {
        let mut tree = DynamicTree { nodes: Vec::new(), root: NULL_NODE, free_list: NULL_NODE, node_count: 0 };
        tree.grow();
        tree
    }

    fn grow(&mut self) {
        let start = self.nodes.len() as u32;
        let capacity = (start.max(16)) * 2;
        self.nodes.resize(
            capacity as usize,
            Node { aabb: Aabb::empty(), user_data: 0, parent_or_next: NULL_NODE, child1: NULL_NODE, child2: NULL_NODE, height: -1 },
        );
        for i in start..capacity - 1 {
            self.nodes[i as usize].parent_or_next = i + 1;
            self.nodes[i as usize].height = -1;
        }
        self.nodes[(capacity - 1) as usize].parent_or_next = NULL_NODE;
        self.nodes[(capacity - 1) as usize].height = -1;
        self.free_list = start;
    }

    fn allocate(&mut self) -> u32 {
        if self.free_list == NULL_NODE {
            self.grow();
        }
        let id = self.free_list;
        self.free_list = self.nodes[id as usize].parent_or_next;
        self.nodes[id as usize] = Node {
            aabb: Aabb::empty(),
            user_data: 0,
            parent_or_next: NULL_NODE,
            child1: NULL_NODE,
            child2: NULL_NODE,
            height: 0,
        };
        self.node_count += 1;
        id
    }

    fn free(&mut self, id: u32) {
        self.nodes[id as usize].parent_or_next = self.free_list;
        self.nodes[id as usize].height = -1;
        self.free_list = id;
        self.node_count -= 1;
    }

    /// Inserts a fattened proxy for `aabb` and returns its handle.
    pub fn create_proxy(&mut self, aabb: Aabb, user_data: u32) -> u32 {
        let id = self.allocate();
        let margin = Vec2::new(AABB_EXTENSION, AABB_EXTENSION);
        self.nodes[id as usize].aabb = Aabb::new(aabb.lower - margin, aabb.upper + margin);
        self.nodes[id as usize].user_data = user_data;
        self.nodes[id as usize].height = 0;
        self.insert_leaf(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: u32) {
        self.remove_leaf(id);
        self.free(id);
    }

    /// Re-fattens and reinserts a proxy if `aabb` (the shape's tight bound
    /// this step) escaped the stored fat bound; `displacement` predicts
    /// motion so fast-moving bodies get a directional margin, mirroring
    /// Box2D's `b2BroadPhase::MoveProxy`. Returns true if the tree changed.
    pub fn move_proxy(&mut self, id: u32, aabb: Aabb, displacement: Vec2) -> bool {
        let fat = self.nodes[id as usize].aabb;
        if fat.contains(&aabb) {
            return false;
        }

        self.remove_leaf(id);

        let margin = Vec2::new(AABB_EXTENSION, AABB_EXTENSION);
        let mut new_fat = Aabb::new(aabb.lower - margin, aabb.upper + margin);

        if displacement.x < 0.0 {
            new_fat.lower.x += AABB_MULTIPLIER * displacement.x;
        } else {
            new_fat.upper.x += AABB_MULTIPLIER * displacement.x;
        }
        if displacement.y < 0.0 {
            new_fat.lower.y += AABB_MULTIPLIER * displacement.y;
        } else {
            new_fat.upper.y += AABB_MULTIPLIER * displacement.y;
        }

        self.nodes[id as usize].aabb = new_fat;
        self.insert_leaf(id);
        true
    }

    pub fn fat_aabb(&self, id: u32) -> Aabb {
        self.nodes[id as usize].aabb
    }

    pub fn user_data(&self, id: u32) -> u32 {
        self.nodes[id as usize].user_data
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent_or_next = NULL_NODE;
            return;
        }

        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut index = self.root;
        while !self.nodes[index as usize].is_leaf() {
            let child1 = self.nodes[index as usize].child1;
            let child2 = self.nodes[index as usize].child2;

            let area = self.nodes[index as usize].aabb.perimeter();
            let combined = self.nodes[index as usize].aabb.union(&leaf_aabb);
            let combined_area = combined.perimeter();

            let cost = 2.0 * combined_area;
            let inherited_cost = 2.0 * (combined_area - area);

            let cost1 = self.child_cost(child1, leaf_aabb, inherited_cost);
            let cost2 = self.child_cost(child2, leaf_aabb, inherited_cost);

            if cost < cost1 && cost < cost2 {
                break;
            }

            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;
        let old_parent = self.nodes[sibling as usize].parent_or_next;
        let new_parent = self.allocate();
        self.nodes[new_parent as usize].parent_or_next = old_parent;
        self.nodes[new_parent as usize].aabb = leaf_aabb.union(&self.nodes[sibling as usize].aabb);
        self.nodes[new_parent as usize].height = self.nodes[sibling as usize].height + 1;

        if old_parent != NULL_NODE {
            if self.nodes[old_parent as usize].child1 == sibling {
                self.nodes[old_parent as usize].child1 = new_parent;
            } else {
                self.nodes[old_parent as usize].child2 = new_parent;
            }
            self.nodes[new_parent as usize].child1 = sibling;
            self.nodes[new_parent as usize].child2 = leaf;
            self.nodes[sibling as usize].parent_or_next = new_parent;
            self.nodes[leaf as usize].parent_or_next = new_parent;
        } else {
            self.nodes[new_parent as usize].child1 = sibling;
            self.nodes[new_parent as usize].child2 = leaf;
            self.nodes[sibling as usize].parent_or_next = new_parent;
            self.nodes[leaf as usize].parent_or_next = new_parent;
            self.root = new_parent;
        }

        self.fix_upward(self.nodes[leaf as usize].parent_or_next);
    }

    fn child_cost(&self, child: u32, leaf_aabb: Aabb, inherited_cost: f32) -> f32 {
        let node = &self.nodes[child as usize];
        if node.is_leaf() {
            leaf_aabb.union(&node.aabb).perimeter() + inherited_cost
        } else {
            let old_area = node.aabb.perimeter();
            let new_area = leaf_aabb.union(&node.aabb).perimeter();
            (new_area - old_area) + inherited_cost
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent_or_next;
        let grandparent = self.nodes[parent as usize].parent_or_next;
        let sibling = if self.nodes[parent as usize].child1 == leaf {
            self.nodes[parent as usize].child2
        } else {
            self.nodes[parent as usize].child1
        };

        if grandparent != NULL_NODE {
            if self.nodes[grandparent as usize].child1 == parent {
                self.nodes[grandparent as usize].child1 = sibling;
            } else {
                self.nodes[grandparent as usize].child2 = sibling;
            }
            self.nodes[sibling as usize].parent_or_next = grandparent;
            self.free(parent);
            self.fix_upward(grandparent);
        } else {
            self.root = sibling;
            self.nodes[sibling as usize].parent_or_next = NULL_NODE;
            self.free(parent);
        }
    }

    /// Re-tightens ancestor AABBs/heights and applies a single rotation
    /// step at each level when one subtree has grown much deeper, the
    /// same incremental rebalance Box2D's dynamic tree uses.
    fn fix_upward(&mut self, mut index: u32) {
        while index != NULL_NODE {
            index = self.balance(index);

            let child1 = self.nodes[index as usize].child1;
            let child2 = self.nodes[index as usize].child2;

            self.nodes[index as usize].height = 1 + self.nodes[child1 as usize].height.max(self.nodes[child2 as usize].height);
            self.nodes[index as usize].aabb = self.nodes[child1 as usize].aabb.union(&self.nodes[child2 as usize].aabb);

            index = self.nodes[index as usize].parent_or_next;
        }
    }

    fn balance(&mut self, a: u32) -> u32 {
        if self.nodes[a as usize].is_leaf() || self.nodes[a as usize].height < 2 {
            return a;
        }

        let b = self.nodes[a as usize].child1;
        let c = self.nodes[a as usize].child2;
        let balance = self.nodes[c as usize].height - self.nodes[b as usize].height;

        if balance > 1 {
            self.rotate(a, c, b)
        } else if balance < -1 {
            self.rotate(a, b, c)
        } else {
            a
        }
    }

    /// Rotates `heavy` up to replace `a`, hanging `a` and `heavy`'s
    /// shallower child below the new root (`light` is `heavy`'s sibling).
    fn rotate(&mut self, a: u32, heavy: u32, light: u32) -> u32 {
        let f = self.nodes[heavy as usize].child1;
        let g = self.nodes[heavy as usize].child2;

        let parent_a = self.nodes[a as usize].parent_or_next;
        self.nodes[heavy as usize].parent_or_next = parent_a;
        if parent_a != NULL_NODE {
            if self.nodes[parent_a as usize].child1 == a {
                self.nodes[parent_a as usize].child1 = heavy;
            } else {
                self.nodes[parent_a as usize].child2 = heavy;
            }
        } else {
            self.root = heavy;
        }

        let (f, g) = if self.nodes[f as usize].height > self.nodes[g as usize].height {
            (f, g)
        } else {
            (g, f)
        };

        self.nodes[heavy as usize].child1 = a;
        self.nodes[heavy as usize].child2 = f;
        self.nodes[a as usize].parent_or_next = heavy;
        self.nodes[f as usize].parent_or_next = heavy;

        if self.nodes[a as usize].child1 == heavy {
            self.nodes[a as usize].child1 = g;
        } else {
            self.nodes[a as usize].child2 = g;
        }
        self.nodes[g as usize].parent_or_next = a;

        let ca1 = self.nodes[a as usize].child1;
        let ca2 = self.nodes[a as usize].child2;
        self.nodes[a as usize].aabb = self.nodes[ca1 as usize].aabb.union(&self.nodes[ca2 as usize].aabb);
        self.nodes[a as usize].height = 1 + self.nodes[ca1 as usize].height.max(self.nodes[ca2 as usize].height);

        let ch1 = self.nodes[heavy as usize].child1;
        let ch2 = self.nodes[heavy as usize].child2;
        self.nodes[heavy as usize].aabb = self.nodes[ch1 as usize].aabb.union(&self.nodes[ch2 as usize].aabb);
        self.nodes[heavy as usize].height = 1 + self.nodes[ch1 as usize].height.max(self.nodes[ch2 as usize].height);

        let _ = light;
        heavy
    }

    /// Visits every leaf whose fat AABB overlaps `aabb`, stopping early if
    /// `visitor` returns `false`.
    pub fn query(&self, aabb: Aabb, mut visitor: impl FnMut(u32) -> bool) {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }
            let node = &self.nodes[node_id as usize];
            if !node.aabb.overlaps(&aabb) {
                continue;
            }
            if node.is_leaf() {
                if !visitor(node_id) {
                    return;
                }
            } else {
                stack.push(node.child1);
                stack.push(node.child2);
            }
        }
    }

    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }
}

/// Incremental pair generator: tracks which proxy moved this step and
/// queries the tree for overlaps, deduping symmetric/self pairs exactly
/// the way the teacher's `SpatialHash::get_pairs` dedupes cell collisions.
#[derive(Default)]
pub struct BroadPhase {
    pub tree: DynamicTree,
    moved: Vec<u32>,
}

impl BroadPhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_proxy(&mut self, aabb: Aabb, user_data: u32) -> u32 {
        let id = self.tree.create_proxy(aabb, user_data);
        self.moved.push(id);
        id
    }

    pub fn destroy_proxy(&mut self, id: u32) {
        self.moved.retain(|&m| m != id);
        self.tree.destroy_proxy(id);
    }

    pub fn move_proxy(&mut self, id: u32, aabb: Aabb, displacement: Vec2) {
        if self.tree.move_proxy(id, aabb, displacement) && !self.moved.contains(&id) {
            self.moved.push(id);
        }
    }

    /// Emits `(proxy_a, proxy_b)` pairs where at least one side moved this
    /// step, each pair reported once with `proxy_a < proxy_b`.
    pub fn find_new_pairs(&mut self) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        for &moved in &self.moved {
            let fat = self.tree.fat_aabb(moved);
            self.tree.query(fat, |other| {
                if other != moved {
                    let (a, b) = if moved < other { (moved, other) } else { (other, moved) };
                    pairs.push((a, b));
                }
                true
            });
        }
        pairs.sort_unstable();
        pairs.dedup();
        self.moved.clear();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_finds_overlapping_proxy() {
        let mut tree = DynamicTree::new();
        let a = tree.create_proxy(Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)), 1);
        let _b = tree.create_proxy(Aabb::new(Vec2::new(10.0, 10.0), Vec2::new(11.0, 11.0)), 2);

        let mut hits = Vec::new();
        tree.query(Aabb::new(Vec2::new(0.5, 0.5), Vec2::new(0.6, 0.6)), |id| {
            hits.push(id);
            true
        });
        assert_eq!(hits, vec![a]);
    }

    #[test]
    fn move_proxy_within_fat_bound_is_noop() {
        let mut tree = DynamicTree::new();
        let a = tree.create_proxy(Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)), 1);
        let changed = tree.move_proxy(a, Aabb::new(Vec2::new(0.01, 0.0), Vec2::new(1.01, 1.0)), Vec2::ZERO);
        assert!(!changed);
    }

    #[test]
    fn new_pairs_report_each_overlap_once() {
        let mut bp = BroadPhase::new();
        let a = bp.create_proxy(Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0)), 1);
        let b = bp.create_proxy(Aabb::new(Vec2::new(0.5, 0.5), Vec2::new(1.5, 1.5)), 2);
        let pairs = bp.find_new_pairs();
        assert_eq!(pairs, vec![(a.min(b), a.max(b))]);
        // Nothing moved since, so a second call reports nothing new.
        assert!(bp.find_new_pairs().is_empty());
    }

    #[test]
    fn tree_stays_balanced_with_many_insertions() {
        let mut tree = DynamicTree::new();
        for i in 0..200 {
            let x = i as f32;
            tree.create_proxy(Aabb::new(Vec2::new(x, 0.0), Vec2::new(x + 0.5, 0.5)), i as u32);
        }
        // A balanced tree over n leaves has height roughly O(log n); this
        // is a loose sanity bound, not a tight balance proof.
        assert!(tree.height() < 40);
    }
}
