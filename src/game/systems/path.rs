//! Waypoint following and stuck detection

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::game::agent::SpawnStatus;
use crate::game::nav::NavProvider;
use crate::util::vec2::Vec2;

/// How a target was routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Provider path plus the raw target
    Graph,
    /// No provider configured; single waypoint at the target
    Direct,
    /// Provider found nothing; single waypoint at the target
    Fallback,
}

/// Result of advancing along the waypoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowStatus {
    /// No target set
    Idle,
    Following,
    /// Last waypoint reached; the target has been cleared
    Arrived,
}

#[derive(Debug, Clone, Default)]
pub struct PathFollower {
    target: Option<Vec2>,
    waypoints: SmallVec<[Vec2; 16]>,
    cursor: usize,
}

impl PathFollower {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route from `from` to `target` and reset the cursor. The cursor
    /// starts past the snapped start node when the agent is already beyond
    /// it, so a re-route never walks the agent back.
    pub fn set_target(
        &mut self,
        from: Vec2,
        target: Vec2,
        provider: Option<&dyn NavProvider>,
        min_spacing: f32,
        spawn: SpawnStatus,
    ) -> RouteKind {
        self.target = Some(target);
        self.cursor = 0;
        self.waypoints.clear();

        let Some(provider) = provider else {
            self.waypoints.push(target);
            return RouteKind::Direct;
        };

        let path = provider.find_path_for(from, target, spawn);
        if path.is_empty() {
            warn!(?from, ?target, "No path found, walking straight at target");
            self.waypoints.push(target);
            return RouteKind::Fallback;
        }

        let spacing_sq = min_spacing * min_spacing;
        for point in path {
            match self.waypoints.last() {
                Some(last) if last.distance_sq_to(point) < spacing_sq => {}
                _ => self.waypoints.push(point),
            }
        }
        // The raw target always survives coalescing
        match self.waypoints.last_mut() {
            Some(last) if last.distance_sq_to(target) < spacing_sq => *last = target,
            _ => self.waypoints.push(target),
        }
        if let [first, second, ..] = self.waypoints[..] {
            if from.distance_sq_to(second) < first.distance_sq_to(second) {
                self.cursor = 1;
            }
        }
        debug!(waypoints = self.waypoints.len(), cursor = self.cursor, ?target, "Path rebuilt");
        RouteKind::Graph
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.waypoints.clear();
        self.cursor = 0;
    }

    #[inline]
    pub fn target(&self) -> Option<Vec2> {
        self.target
    }

    #[inline]
    pub fn waypoints(&self) -> &[Vec2] {
        &self.waypoints
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_waypoint(&self) -> Option<Vec2> {
        self.target?;
        self.waypoints.get(self.cursor).copied()
    }

    /// Step the cursor past every waypoint already within reach
    pub fn advance(&mut self, position: Vec2, reach: f32, final_reach: f32) -> FollowStatus {
        if self.target.is_none() {
            return FollowStatus::Idle;
        }
        while let Some(&waypoint) = self.waypoints.get(self.cursor) {
            let is_last = self.cursor + 1 == self.waypoints.len();
            let threshold = if is_last { final_reach } else { reach };
            if position.distance_sq_to(waypoint) > threshold * threshold {
                return FollowStatus::Following;
            }
            self.cursor += 1;
        }
        self.clear();
        FollowStatus::Arrived
    }

    /// Unit direction toward the current waypoint, zero when idle
    pub fn desired_direction(&self, position: Vec2) -> Vec2 {
        self.current_waypoint()
            .map(|waypoint| (waypoint - position).normalize())
            .unwrap_or(Vec2::ZERO)
    }
}

/// Flags an agent that stopped making progress toward its target
#[derive(Debug, Clone, Copy, Default)]
pub struct StuckDetector {
    anchor: Vec2,
    since: f32,
}

impl StuckDetector {
    pub fn reset(&mut self, position: Vec2, now: f32) {
        self.anchor = position;
        self.since = now;
    }

    /// True once `timeout` seconds pass without moving `min_progress` away
    /// from the anchor. Re-anchors on progress and after firing.
    pub fn check(&mut self, position: Vec2, now: f32, min_progress: f32, timeout: f32) -> bool {
        if position.distance_sq_to(self.anchor) > min_progress * min_progress {
            self.reset(position, now);
            return false;
        }
        if now - self.since >= timeout {
            self.reset(position, now);
            return true;
        }
        false
    }
}
