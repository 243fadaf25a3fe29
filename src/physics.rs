use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};

use crate::graph::{GraphData, Node, NodeKind, ResolvedLink, connected_nodes, index_by_id, resolve_links};
use crate::util::stable_pair;

pub const ALPHA_MIN: f32 = 0.001;
const ALPHA_DECAY: f32 = 0.028;
const VELOCITY_RETENTION: f32 = 0.6;
const MAX_SPEED: f32 = 14.0;

const CHARGE_SOFTENING: f32 = 580.0;
const CHARGE_MAX_DISTANCE: f32 = 420.0;
const IDEA_CHARGE: f32 = 170.0;
const IDEA_CHARGE_PER_DEGREE: f32 = 22.0;
const TAG_CHARGE: f32 = 250.0;

const CENTER_PULL: f32 = 0.012;
const COLLISION_MARGIN: f32 = 2.5;
const COLLISION_STRENGTH: f32 = 0.7;

const TEMPORAL_STRENGTH: f32 = 0.06;
const TEMPORAL_SPACING: f32 = 9.0;
const TEMPORAL_PIVOT_DAYS: f32 = 45.0;

const HIERARCHY_STRENGTH: f32 = 0.08;
const HIERARCHY_BASE_Y: f32 = -180.0;
const HIERARCHY_LEVEL_SPACING: f32 = 90.0;

const DRAG_ALPHA_TARGET: f32 = 0.3;

#[derive(Clone, Copy, Debug)]
pub struct PhysicsTuning {
    pub intensity: f32,
    pub repulsion: f32,
    pub spring: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            repulsion: 1.0,
            spring: 1.0,
        }
    }
}

/// The live force simulation. Owns the node arena for the lifetime of one
/// graph build; a rebuild drops the whole value and starts over.
pub struct Simulation {
    pub nodes: Vec<Node>,
    pub links: Vec<ResolvedLink>,
    pub index_by_id: HashMap<String, usize>,
    alpha: f32,
    alpha_target: f32,
}

impl Simulation {
    pub fn new(graph: GraphData) -> Self {
        let index = index_by_id(&graph.nodes);
        let links = resolve_links(&graph.links, &index);
        let mut nodes = graph.nodes;

        let n = nodes.len().max(1) as f32;
        let base_radius = n.sqrt() * 26.0;
        for (slot, node) in nodes.iter_mut().enumerate() {
            let angle = (slot as f32 / n) * TAU;
            let (jx, jy) = stable_pair(&node.id);
            node.x = angle.cos() * base_radius + jx * 50.0;
            node.y = angle.sin() * base_radius + jy * 50.0;
            node.vx = 0.0;
            node.vy = 0.0;
        }

        Self {
            nodes,
            links,
            index_by_id: index,
            alpha: 1.0,
            alpha_target: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.alpha >= ALPHA_MIN || self.alpha_target >= ALPHA_MIN
    }

    pub fn begin_drag(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = Some(node.x);
            node.fy = Some(node.y);
        }
        self.alpha_target = DRAG_ALPHA_TARGET;
        self.alpha = self.alpha.max(DRAG_ALPHA_TARGET);
    }

    pub fn drag_to(&mut self, index: usize, x: f32, y: f32) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = Some(x);
            node.fy = Some(y);
        }
    }

    pub fn end_drag(&mut self, index: usize) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.fx = None;
            node.fy = None;
        }
        self.alpha_target = 0.0;
    }

    pub fn connected_of(&self, index: usize) -> HashSet<usize> {
        connected_nodes(&self.links, index)
    }

    /// One force pass. Returns false without touching anything once the
    /// excitation has decayed below the floor and nothing holds it up.
    pub fn tick(&mut self, tuning: PhysicsTuning, timeline_mode: bool) -> bool {
        let node_count = self.nodes.len();
        if node_count == 0 {
            return false;
        }
        if self.alpha < ALPHA_MIN && self.alpha_target < ALPHA_MIN {
            return false;
        }

        self.alpha += (self.alpha_target - self.alpha) * ALPHA_DECAY;
        let alpha = self.alpha.max(ALPHA_MIN);
        let intensity = tuning.intensity.clamp(0.2, 2.5);

        let mut forces = vec![Vec2::ZERO; node_count];

        let charges: Vec<f32> = self
            .nodes
            .iter()
            .map(|node| match &node.kind {
                NodeKind::Idea { degree, .. } => {
                    IDEA_CHARGE + IDEA_CHARGE_PER_DEGREE * *degree as f32
                }
                NodeKind::Tag { .. } => TAG_CHARGE,
            })
            .collect();

        let repulsion_scale = intensity * tuning.repulsion.clamp(0.2, 2.5);
        let max_distance_sq = CHARGE_MAX_DISTANCE * CHARGE_MAX_DISTANCE;
        for i in 0..node_count {
            for j in (i + 1)..node_count {
                let delta = vec2(
                    self.nodes[i].x - self.nodes[j].x,
                    self.nodes[i].y - self.nodes[j].y,
                );
                let distance_sq = delta.length_sq();
                if distance_sq > max_distance_sq {
                    continue;
                }

                let distance = distance_sq.sqrt();
                let direction = if distance > 0.0001 {
                    delta / distance
                } else {
                    let angle = ((i as f32) * 0.618_034 + (j as f32) * 0.414_214) * TAU;
                    vec2(angle.cos(), angle.sin())
                };

                let repulsion =
                    (charges[i] * charges[j]) / (distance_sq + CHARGE_SOFTENING) * repulsion_scale * alpha;
                forces[i] += direction * repulsion;
                forces[j] -= direction * repulsion;

                let min_distance = self.nodes[i].radius + self.nodes[j].radius + COLLISION_MARGIN;
                if distance < min_distance {
                    let overlap_push = (min_distance - distance) * COLLISION_STRENGTH * intensity;
                    forces[i] += direction * overlap_push;
                    forces[j] -= direction * overlap_push;
                }
            }
        }

        let spring_scale = intensity * tuning.spring.clamp(0.2, 2.5);
        for link in &self.links {
            if link.source >= node_count || link.target >= node_count || link.source == link.target {
                continue;
            }

            let delta = vec2(
                self.nodes[link.source].x - self.nodes[link.target].x,
                self.nodes[link.source].y - self.nodes[link.target].y,
            );
            let distance = delta.length();
            if distance <= 0.0001 {
                continue;
            }
            let direction = delta / distance;

            let spring =
                (distance - link.distance) * link.strength * link.weight * spring_scale * alpha;
            forces[link.source] -= direction * spring * 0.5;
            forces[link.target] += direction * spring * 0.5;
        }

        for (index, node) in self.nodes.iter().enumerate() {
            forces[index] -= vec2(node.x, node.y) * CENTER_PULL * intensity * alpha;
        }

        if timeline_mode {
            for (index, node) in self.nodes.iter().enumerate() {
                if let NodeKind::Idea { age, .. } = &node.kind {
                    let target_x = (TEMPORAL_PIVOT_DAYS - age) * TEMPORAL_SPACING;
                    forces[index].x += (target_x - node.x) * TEMPORAL_STRENGTH * alpha;
                }
            }
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if let NodeKind::Tag { level, .. } = &node.kind {
                let target_y = HIERARCHY_BASE_Y + (*level as f32) * HIERARCHY_LEVEL_SPACING;
                forces[index].y += (target_y - node.y) * HIERARCHY_STRENGTH * alpha;
            }
        }

        for (index, node) in self.nodes.iter_mut().enumerate() {
            let mut velocity = (vec2(node.vx, node.vy) + forces[index]) * VELOCITY_RETENTION;
            let speed = velocity.length();
            if speed > MAX_SPEED {
                velocity = velocity / speed * MAX_SPEED;
            }

            if let Some(fx) = node.fx {
                node.x = fx;
                velocity.x = 0.0;
            } else {
                node.x += velocity.x;
            }

            if let Some(fy) = node.fy {
                node.y = fy;
                velocity.y = 0.0;
            } else {
                node.y += velocity.y;
            }

            node.vx = velocity.x;
            node.vy = velocity.y;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::journal::demo_journal;
    use time::macros::datetime;

    fn sim(timeline: bool) -> Simulation {
        let now = datetime!(2026-08-01 12:00:00 UTC);
        let journal = demo_journal(now);
        let graph = build_graph(&journal.ideas, true, now);
        let mut sim = Simulation::new(graph);
        for _ in 0..50 {
            sim.tick(PhysicsTuning::default(), timeline);
        }
        sim
    }

    #[test]
    fn positions_stay_finite() {
        let sim = sim(false);
        for node in &sim.nodes {
            assert!(node.x.is_finite() && node.y.is_finite(), "node {}", node.id);
            assert!(node.vx.is_finite() && node.vy.is_finite());
        }
    }

    #[test]
    fn excitation_decays_to_rest() {
        let mut sim = sim(false);
        for _ in 0..2000 {
            if !sim.tick(PhysicsTuning::default(), false) {
                break;
            }
        }
        assert!(!sim.is_active());
        assert!(!sim.tick(PhysicsTuning::default(), false));
    }

    #[test]
    fn pinned_node_is_forced_to_the_pin() {
        let mut sim = sim(false);
        sim.begin_drag(0);
        sim.drag_to(0, 42.0, -17.0);
        sim.tick(PhysicsTuning::default(), false);

        assert_eq!(sim.nodes[0].x, 42.0);
        assert_eq!(sim.nodes[0].y, -17.0);
        assert_eq!(sim.nodes[0].vx, 0.0);
        assert_eq!(sim.nodes[0].vy, 0.0);
    }

    #[test]
    fn drag_release_clears_pin_and_resumes_motion() {
        let mut sim = sim(false);
        sim.begin_drag(0);
        sim.drag_to(0, 400.0, 400.0);
        sim.tick(PhysicsTuning::default(), false);
        sim.end_drag(0);

        assert!(sim.nodes[0].fx.is_none());
        assert!(sim.nodes[0].fy.is_none());

        let before = (sim.nodes[0].x, sim.nodes[0].y);
        sim.tick(PhysicsTuning::default(), false);
        let after = (sim.nodes[0].x, sim.nodes[0].y);
        assert_ne!(before, after, "released node follows forces again");
    }

    #[test]
    fn drag_keeps_the_simulation_excited() {
        let mut sim = sim(false);
        sim.begin_drag(0);
        for _ in 0..2000 {
            sim.tick(PhysicsTuning::default(), false);
        }
        assert!(sim.is_active(), "excitation holds at the drag target");

        sim.end_drag(0);
        for _ in 0..2000 {
            if !sim.tick(PhysicsTuning::default(), false) {
                break;
            }
        }
        assert!(!sim.is_active());
    }

    #[test]
    fn timeline_mode_orders_ideas_by_recency() {
        let mut sim = sim(true);
        for _ in 0..400 {
            sim.tick(PhysicsTuning::default(), true);
        }

        let mut aged: Vec<(f32, f32)> = sim
            .nodes
            .iter()
            .filter_map(|node| node.age().map(|age| (age, node.x)))
            .collect();
        aged.sort_by(|a, b| a.0.total_cmp(&b.0));

        let newest = aged.first().copied().unwrap();
        let oldest = aged.last().copied().unwrap();
        assert!(
            newest.1 > oldest.1,
            "newest idea ({}d, x={}) should sit right of oldest ({}d, x={})",
            newest.0,
            newest.1,
            oldest.0,
            oldest.1
        );
    }

    #[test]
    fn tag_levels_stratify_vertically() {
        let mut sim = sim(false);
        for _ in 0..2000 {
            if !sim.tick(PhysicsTuning::default(), false) {
                break;
            }
        }
        let level_y = |wanted: usize| -> Vec<f32> {
            sim.nodes
                .iter()
                .filter_map(|node| match &node.kind {
                    NodeKind::Tag { level, .. } if *level == wanted => Some(node.y),
                    _ => None,
                })
                .collect()
        };

        let roots = level_y(0);
        let children = level_y(1);
        assert!(!roots.is_empty() && !children.is_empty());

        let avg = |values: &[f32]| values.iter().sum::<f32>() / values.len() as f32;
        assert!(
            avg(&roots) < avg(&children),
            "root tags settle above their children"
        );
    }
}
