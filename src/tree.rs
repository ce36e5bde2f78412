use ndarray::ArrayView1;
use rand::Rng;

use crate::dataset::TrainingSet;

pub(crate) type NodeId = usize;

/// One arena slot. A node is a leaf iff both children are `None`.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) score: f64,
    pub(crate) test_feature_index: usize,
    pub(crate) test_threshold: f64,
    pub(crate) is_unmixed: bool,
    pub(crate) unmixed_label: usize,
    pub(crate) leaf_index: usize,
    pub(crate) n_leaves: usize,
    /// Lowest-scoring final node in this subtree, `None` for leaves.
    pub(crate) weakest_final: Option<NodeId>,
}

impl Node {
    fn leaf(parent: Option<NodeId>) -> Self {
        Node {
            parent,
            left: None,
            right: None,
            score: 0.0,
            test_feature_index: 0,
            test_threshold: 0.0,
            is_unmixed: false,
            unmixed_label: 0,
            leaf_index: 0,
            n_leaves: 1,
            weakest_final: None,
        }
    }
}

/// Leaf reached by routing a feature vector down a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaf {
    /// Dense index in `[0, n_leaves)`, stable between structural changes.
    pub index: usize,
    /// The single training label below this leaf, if its subtree was
    /// label-unmixed.
    pub unmixed: Option<usize>,
}

/// A randomized binary decision tree over arena-allocated nodes.
///
/// All nodes live in one `Vec` addressed by index handles; parent links
/// and the weakest-final-node cache are handles into the same arena, so
/// pruning never dangles. Slots freed by a collapse are reused through a
/// free list. Leaf indices and the weakest cache are derived state,
/// rebuilt by [`Tree::compute_global_properties`] after every structural
/// change and never persisted.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn partition_score(label_entropy: f64, side_entropy: f64, joint_entropy: f64) -> f64 {
    if label_entropy + side_entropy == 0.0 {
        0.0
    } else {
        2.0 * (1.0 - joint_entropy / (label_entropy + side_entropy))
    }
}

impl Tree {
    /// A single-leaf tree.
    pub fn new() -> Self {
        Tree {
            nodes: vec![Node::leaf(None)],
            free: Vec::new(),
            root: 0,
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes[self.root].n_leaves
    }

    fn alloc(&mut self, parent: NodeId) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Node::leaf(Some(parent));
                id
            }
            None => {
                self.nodes.push(Node::leaf(Some(parent)));
                self.nodes.len() - 1
            }
        }
    }

    /// Collapses `id` back to a leaf, returning its whole subtree to the
    /// free list. Unmixed state is kept, split state is cleared.
    fn reset_to_leaf(&mut self, id: NodeId) {
        let mut stack = Vec::new();
        if let Some(l) = self.nodes[id].left {
            stack.push(l);
        }
        if let Some(r) = self.nodes[id].right {
            stack.push(r);
        }
        while let Some(cur) = stack.pop() {
            if let Some(l) = self.nodes[cur].left {
                stack.push(l);
            }
            if let Some(r) = self.nodes[cur].right {
                stack.push(r);
            }
            self.free.push(cur);
        }
        let node = &mut self.nodes[id];
        node.left = None;
        node.right = None;
        node.score = 0.0;
        node.test_feature_index = 0;
        node.test_threshold = 0.0;
        node.n_leaves = 1;
        node.weakest_final = None;
    }

    /// Turns `id` into an internal node with the given test parameters and
    /// two fresh leaf children. Used by induction and by deserialization.
    pub(crate) fn split_node(
        &mut self,
        id: NodeId,
        score: f64,
        test_feature_index: usize,
        test_threshold: f64,
    ) -> (NodeId, NodeId) {
        let left = self.alloc(id);
        let right = self.alloc(id);
        let node = &mut self.nodes[id];
        node.score = score;
        node.test_feature_index = test_feature_index;
        node.test_threshold = test_threshold;
        node.left = Some(left);
        node.right = Some(right);
        (left, right)
    }

    pub(crate) fn set_leaf_payload(&mut self, id: NodeId, unmixed: Option<usize>) {
        let node = &mut self.nodes[id];
        node.is_unmixed = unmixed.is_some();
        node.unmixed_label = unmixed.unwrap_or(0);
    }

    /// Grows the tree over `set` by recursive randomized split search.
    ///
    /// Each node runs up to `t_max + 1` trials of a uniformly random
    /// (feature, threshold-in-observed-range) test, keeping the best
    /// mutual-information score, and stops early once the kept score
    /// reaches `s_min`. Degenerate winners (an empty side) force a leaf.
    /// Derived leaf indices and the weakest-final cache are rebuilt once
    /// the whole tree is grown.
    pub fn train<R: Rng>(
        &mut self,
        set: &mut TrainingSet<'_>,
        s_min: f64,
        t_max: usize,
        rng: &mut R,
    ) {
        let root = self.root;
        self.train_node(root, set, s_min, t_max, rng, None);
        self.compute_global_properties();
    }

    fn train_node<R: Rng>(
        &mut self,
        id: NodeId,
        set: &mut TrainingSet<'_>,
        s_min: f64,
        t_max: usize,
        rng: &mut R,
        inherited_label: Option<usize>,
    ) {
        // A parent already known to be unmixed propagates its label
        // without recomputation.
        let unmixed = match inherited_label {
            Some(label) => Some(label),
            None => set.is_unmixed().then(|| set.point_label(0)),
        };
        self.set_leaf_payload(id, unmixed);
        self.reset_to_leaf(id);

        if set.is_indivisible() {
            return;
        }

        let label_entropy = set.label_entropy();
        let mut left = set.empty_like();
        let mut right = set.empty_like();

        let mut best_score = 0.0;
        let mut best_feature = 0;
        let mut best_threshold = 0.0;
        let mut trials = 0;
        loop {
            let feature = rng.gen_range(0..set.feature_dim());
            let lo = set.min_feature(feature);
            let hi = set.max_feature(feature);
            let threshold = lo + rng.gen::<f64>() * (hi - lo);

            set.partition(feature, threshold, &mut left, &mut right);
            let score = partition_score(
                label_entropy,
                TrainingSet::partition_entropy(&left, &right),
                TrainingSet::label_partition_joint_entropy(&left, &right),
            );

            // The first trial is always kept; afterwards only strict
            // improvement replaces the incumbent, so ties keep the
            // earlier candidate.
            if trials == 0 || score > best_score {
                best_score = score;
                best_feature = feature;
                best_threshold = threshold;
            }
            trials += 1;
            if best_score >= s_min || trials > t_max {
                break;
            }
        }

        set.partition(best_feature, best_threshold, &mut left, &mut right);
        if left.n_points() == 0 || right.n_points() == 0 {
            // Even the best trial separated nothing; stay a leaf.
            return;
        }

        // Both sides are nonempty, so point counts strictly decrease and
        // the recursion terminates.
        let (left_id, right_id) = self.split_node(id, best_score, best_feature, best_threshold);
        let child_label = unmixed;
        self.train_node(left_id, &mut left, s_min, t_max, rng, child_label);
        self.train_node(right_id, &mut right, s_min, t_max, rng, child_label);
    }

    /// Recomputes every derived per-node property: dense leaf indices in
    /// left-to-right order, `n_leaves` counts, and the bottom-up
    /// weakest-final-node cache.
    pub(crate) fn compute_global_properties(&mut self) {
        let mut next_leaf_index = 0;
        let mut stack = vec![(self.root, false)];
        while let Some((id, children_done)) = stack.pop() {
            match (self.nodes[id].left, self.nodes[id].right) {
                (None, None) => {
                    let node = &mut self.nodes[id];
                    node.leaf_index = next_leaf_index;
                    node.n_leaves = 1;
                    node.weakest_final = None;
                    next_leaf_index += 1;
                }
                (Some(left), Some(right)) => {
                    if children_done {
                        self.refresh_internal(id, left, right);
                    } else {
                        stack.push((id, true));
                        stack.push((right, false));
                        stack.push((left, false));
                    }
                }
                // Induction and deserialization only ever create zero or
                // two children.
                _ => debug_assert!(false, "node with a single child"),
            }
        }
    }

    /// Refreshes `n_leaves` and the weakest-final cache of one internal
    /// node from its children, which must already be up to date.
    fn refresh_internal(&mut self, id: NodeId, left: NodeId, right: NodeId) {
        let n_leaves = self.nodes[left].n_leaves + self.nodes[right].n_leaves;
        let left_is_leaf = self.nodes[left].left.is_none() && self.nodes[left].right.is_none();
        let right_is_leaf = self.nodes[right].left.is_none() && self.nodes[right].right.is_none();

        let weakest = if left_is_leaf && right_is_leaf {
            Some(id)
        } else if left_is_leaf {
            self.nodes[right].weakest_final
        } else if right_is_leaf {
            self.nodes[left].weakest_final
        } else {
            match (self.nodes[left].weakest_final, self.nodes[right].weakest_final) {
                (Some(a), Some(b)) => {
                    // On a score tie the right candidate wins; ordering
                    // between equal-score final nodes is unspecified.
                    if self.nodes[a].score < self.nodes[b].score {
                        Some(a)
                    } else {
                        Some(b)
                    }
                }
                (a, None) => a,
                (None, b) => b,
            }
        };

        let node = &mut self.nodes[id];
        node.n_leaves = n_leaves;
        node.weakest_final = weakest;
    }

    /// Repeatedly removes the weakest split until at most `max_leaves`
    /// leaves remain. Each removal collapses the cached weakest final
    /// node to a leaf and refreshes only its ancestor path, so one
    /// removal costs O(depth); dense leaf indices are reassigned once at
    /// the end. A tree already under budget is left untouched.
    pub fn prune(&mut self, max_leaves: usize) {
        if self.n_leaves() <= max_leaves {
            return;
        }
        while self.n_leaves() > max_leaves {
            let Some(weakest) = self.nodes[self.root].weakest_final else {
                break;
            };
            self.reset_to_leaf(weakest);
            let mut cur = self.nodes[weakest].parent;
            while let Some(id) = cur {
                if let (Some(left), Some(right)) = (self.nodes[id].left, self.nodes[id].right) {
                    self.refresh_internal(id, left, right);
                }
                cur = self.nodes[id].parent;
            }
        }
        self.compute_global_properties();
    }

    /// Routes a feature vector to its leaf.
    pub fn route(&self, feature: ArrayView1<f64>) -> Leaf {
        let mut id = self.root;
        while let (Some(left), Some(right)) = (self.nodes[id].left, self.nodes[id].right) {
            let node = &self.nodes[id];
            id = if feature[node.test_feature_index] < node.test_threshold {
                left
            } else {
                right
            };
        }
        let node = &self.nodes[id];
        Leaf {
            index: node.leaf_index,
            unmixed: node.is_unmixed.then_some(node.unmixed_label),
        }
    }

    /// Largest feature index any split tests, if the tree has splits.
    pub(crate) fn max_test_feature_index(&self) -> Option<usize> {
        let mut max = None;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let (Some(left), Some(right)) = (self.nodes[id].left, self.nodes[id].right) {
                let index = self.nodes[id].test_feature_index;
                max = Some(max.map_or(index, |m: usize| m.max(index)));
                stack.push(left);
                stack.push(right);
            }
        }
        max
    }
}
