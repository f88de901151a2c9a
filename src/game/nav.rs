//! Corridor navigation graph
//!
//! Nodes are corridor endpoints (hub centers, ring corners, spawn anchors and
//! spawn centers), deduplicated by exact position. Edges are undirected and
//! weighted by Euclidean length. The graph is built once per match and shared
//! read-only between every bot through an `Arc`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use bitvec::prelude::*;
use rand::Rng;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::game::agent::SpawnStatus;
use crate::game::map::ArenaMap;
use crate::util::vec2::Vec2;

pub type NodeId = usize;

/// What a node represents in the map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Hub center or corridor junction in the open arena
    Junction,
    /// Arena end of a spawn connector
    SpawnAnchor,
    /// Inside a spawn sanctuary; only reachable while that zone is active
    SpawnCenter,
}

#[derive(Debug, Clone)]
pub struct NavNode {
    pub id: NodeId,
    pub position: Vec2,
    pub kind: NodeKind,
    /// Owning sanctuary of a `SpawnCenter`
    pub zone_id: Option<u8>,
    pub neighbors: SmallVec<[NodeId; 4]>,
}

impl NavNode {
    /// Whether an agent with this spawn status can stand on the node
    #[inline]
    pub fn is_walkable_for(&self, spawn: SpawnStatus) -> bool {
        match self.kind {
            NodeKind::SpawnCenter => spawn.is_protected() && self.zone_id == spawn.zone_id,
            NodeKind::Junction | NodeKind::SpawnAnchor => true,
        }
    }
}

/// Source of paths between world points.
///
/// `NavGraph` is the default provider. A host with a richer navigator
/// (a navmesh, say) injects its own implementation into the bot driver.
pub trait NavProvider: Send + Sync {
    /// Ordered points from near `from` to near `to`; empty when unreachable
    fn find_path(&self, from: Vec2, to: Vec2) -> Vec<Vec2>;

    /// Path for an agent with the given spawn status. Providers without a
    /// notion of sanctuaries route as `find_path`.
    fn find_path_for(&self, from: Vec2, to: Vec2, spawn: SpawnStatus) -> Vec<Vec2> {
        let _ = spawn;
        self.find_path(from, to)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavGraph {
    nodes: Vec<NavNode>,
    lookup: FxHashMap<(u32, u32), NodeId>,
}

/// Exact-match key; folds -0.0 into 0.0
#[inline]
fn position_key(position: Vec2) -> (u32, u32) {
    ((position.x + 0.0).to_bits(), (position.y + 0.0).to_bits())
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arena corridors, spawn connectors and anchor-to-hub links
    pub fn from_map(map: &ArenaMap) -> Self {
        let mut graph = Self::new();
        for corridor in map.corridors() {
            graph.add_segment(
                corridor.start,
                NodeKind::Junction,
                corridor.end,
                NodeKind::Junction,
            );
        }
        for zone in map.spawn_zones() {
            graph.add_segment(
                zone.anchor,
                NodeKind::SpawnAnchor,
                zone.center,
                NodeKind::SpawnCenter,
            );
            if let Some(id) = graph.node_at(zone.center) {
                graph.nodes[id].zone_id = Some(zone.id);
            }
            if let Some(hub) = map.hub_containing(zone.anchor) {
                graph.add_segment(zone.anchor, NodeKind::SpawnAnchor, hub.center, NodeKind::Junction);
            }
        }
        graph
    }

    /// Add an undirected edge, creating endpoint nodes as needed
    pub fn add_segment(&mut self, a: Vec2, kind_a: NodeKind, b: Vec2, kind_b: NodeKind) {
        let id_a = self.get_or_create(a, kind_a);
        let id_b = self.get_or_create(b, kind_b);
        self.connect(id_a, id_b);
    }

    fn get_or_create(&mut self, position: Vec2, kind: NodeKind) -> NodeId {
        let key = position_key(position);
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(NavNode {
            id,
            position,
            kind,
            zone_id: None,
            neighbors: SmallVec::new(),
        });
        self.lookup.insert(key, id);
        id
    }

    fn connect(&mut self, a: NodeId, b: NodeId) {
        if a == b || self.nodes[a].neighbors.contains(&b) {
            return;
        }
        self.nodes[a].neighbors.push(b);
        self.nodes[b].neighbors.push(a);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&NavNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[NavNode] {
        &self.nodes
    }

    pub fn node_at(&self, position: Vec2) -> Option<NodeId> {
        self.lookup.get(&position_key(position)).copied()
    }

    /// Nearest node by squared distance; `None` on an empty graph
    pub fn find_closest_node(&self, point: Vec2) -> Option<NodeId> {
        self.find_closest_node_where(point, |_| true)
    }

    /// Nearest node accepted by `allow`
    pub fn find_closest_node_where<F>(&self, point: Vec2, allow: F) -> Option<NodeId>
    where
        F: Fn(&NavNode) -> bool,
    {
        let mut best: Option<(NodeId, f32)> = None;
        for node in self.nodes.iter().filter(|node| allow(*node)) {
            let d = node.position.distance_sq_to(point);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((node.id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Snap both ends to nodes and return the node positions of the shortest
    /// path, inclusive. Empty if no path exists.
    pub fn find_path(&self, start: Vec2, goal: Vec2) -> Vec<Vec2> {
        self.find_path_where(start, goal, |_| true)
    }

    /// As `find_path`, but neither snapping nor the search touches another
    /// sanctuary's center, which the agent could never stand on.
    pub fn find_path_for(&self, start: Vec2, goal: Vec2, spawn: SpawnStatus) -> Vec<Vec2> {
        self.find_path_where(start, goal, |node| node.is_walkable_for(spawn))
    }

    fn find_path_where<F>(&self, start: Vec2, goal: Vec2, allow: F) -> Vec<Vec2>
    where
        F: Fn(&NavNode) -> bool,
    {
        let (Some(start_id), Some(goal_id)) = (
            self.find_closest_node_where(start, &allow),
            self.find_closest_node_where(goal, &allow),
        ) else {
            return Vec::new();
        };
        self.path_between_where(start_id, goal_id, &allow)
            .map(|ids| ids.into_iter().map(|id| self.nodes[id].position).collect())
            .unwrap_or_default()
    }

    /// A* between two nodes. Cost and heuristic are both Euclidean, so the
    /// heuristic is admissible and consistent.
    pub fn path_between(&self, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
        self.path_between_where(start, goal, |_| true)
    }

    /// A* restricted to nodes accepted by `allow`
    pub fn path_between_where<F>(&self, start: NodeId, goal: NodeId, allow: F) -> Option<Vec<NodeId>>
    where
        F: Fn(&NavNode) -> bool,
    {
        let n = self.nodes.len();
        if start >= n || goal >= n {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let goal_pos = self.nodes[goal].position;
        let mut g_score = vec![f32::INFINITY; n];
        let mut came_from: Vec<Option<NodeId>> = vec![None; n];
        let mut closed = bitvec![0; n];

        // Non-negative f32 bit patterns order like the floats themselves.
        // The sequence number makes ties pop in insertion order.
        let mut open: BinaryHeap<Reverse<(u32, u64, NodeId)>> = BinaryHeap::new();
        let mut seq: u64 = 0;
        g_score[start] = 0.0;
        open.push(Reverse((
            self.nodes[start].position.distance_to(goal_pos).to_bits(),
            seq,
            start,
        )));

        while let Some(Reverse((_, _, current))) = open.pop() {
            if closed[current] {
                continue;
            }
            if current == goal {
                return Some(self.reconstruct(&came_from, start, goal));
            }
            closed.set(current, true);

            let current_pos = self.nodes[current].position;
            for &next in &self.nodes[current].neighbors {
                if closed[next] || !allow(&self.nodes[next]) {
                    continue;
                }
                let next_pos = self.nodes[next].position;
                let tentative = g_score[current] + current_pos.distance_to(next_pos);
                if tentative < g_score[next] {
                    g_score[next] = tentative;
                    came_from[next] = Some(current);
                    seq += 1;
                    let f = tentative + next_pos.distance_to(goal_pos);
                    open.push(Reverse((f.to_bits(), seq, next)));
                }
            }
        }

        None
    }

    fn reconstruct(&self, came_from: &[Option<NodeId>], start: NodeId, goal: NodeId) -> Vec<NodeId> {
        let mut path = vec![goal];
        let mut current = goal;
        while current != start {
            match came_from[current] {
                Some(prev) => {
                    path.push(prev);
                    current = prev;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Sum of edge lengths along a node position list
    pub fn path_length(points: &[Vec2]) -> f32 {
        points.windows(2).map(|w| w[0].distance_to(w[1])).sum()
    }

    /// Uniformly random node that a bot outside spawn can stand on
    pub fn random_node<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Vec2> {
        let walkable: SmallVec<[NodeId; 64]> = self
            .nodes
            .iter()
            .filter(|node| node.kind != NodeKind::SpawnCenter)
            .map(|node| node.id)
            .collect();
        if walkable.is_empty() {
            return None;
        }
        let pick = walkable[rng.gen_range(0..walkable.len())];
        Some(self.nodes[pick].position)
    }

    /// True if every node can reach every other node
    pub fn is_connected(&self) -> bool {
        if self.nodes.is_empty() {
            return true;
        }
        let mut seen = bitvec![0; self.nodes.len()];
        let mut stack = vec![0];
        seen.set(0, true);
        while let Some(id) = stack.pop() {
            for &next in &self.nodes[id].neighbors {
                if !seen[next] {
                    seen.set(next, true);
                    stack.push(next);
                }
            }
        }
        seen.all()
    }
}

impl NavProvider for NavGraph {
    fn find_path(&self, from: Vec2, to: Vec2) -> Vec<Vec2> {
        NavGraph::find_path(self, from, to)
    }

    fn find_path_for(&self, from: Vec2, to: Vec2, spawn: SpawnStatus) -> Vec<Vec2> {
        NavGraph::find_path_for(self, from, to, spawn)
    }
}
