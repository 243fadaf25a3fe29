use std::collections::{HashMap, HashSet};

use time::OffsetDateTime;

use crate::extract::{ParsedTag, parse_nested_tags, process_idea};
use crate::journal::{Idea, age_days};

pub const TAG_ID_PREFIX: &str = "tag-";

pub fn tag_node_id(name: &str) -> String {
    format!("{TAG_ID_PREFIX}{name}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkKind {
    Topic,
    Tag,
    Temporal,
    Hierarchy,
    Ticker,
    Strategy,
}

impl LinkKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Tag => "tag",
            Self::Temporal => "temporal",
            Self::Hierarchy => "hierarchy",
            Self::Ticker => "ticker",
            Self::Strategy => "strategy",
        }
    }

    fn weight(self) -> f32 {
        match self {
            Self::Topic => 1.0,
            Self::Tag => 1.0,
            Self::Temporal => 1.0,
            Self::Hierarchy => 1.25,
            Self::Ticker => 1.0,
            Self::Strategy => 0.75,
        }
    }

    /// Tag membership is visual-weighting-neutral: only the relationship
    /// kinds count toward an idea's degree.
    pub fn counts_toward_degree(self) -> bool {
        !matches!(self, Self::Tag)
    }
}

#[derive(Clone, Debug)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub kind: LinkKind,
    pub weight: f32,
    pub distance: f32,
    pub strength: f32,
    pub age: Option<f32>,
}

impl Link {
    fn new(source: &str, target: &str, kind: LinkKind, distance: f32, strength: f32) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            weight: kind.weight(),
            distance,
            strength,
            age: None,
        }
    }
}

/// Link with endpoints resolved to arena indices, done once per rebuild so
/// the per-tick force pass never looks nodes up by id.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedLink {
    pub source: usize,
    pub target: usize,
    pub kind: LinkKind,
    pub weight: f32,
    pub distance: f32,
    pub strength: f32,
    pub age: Option<f32>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Idea {
        idea: Idea,
        degree: usize,
        age: f32,
    },
    Tag {
        name: String,
        parent: Option<String>,
        level: usize,
        count: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Node {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
    pub radius: f32,
    pub kind: NodeKind,
}

impl Node {
    fn with_kind(id: String, radius: f32, kind: NodeKind) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            fx: None,
            fy: None,
            radius,
            kind,
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self.kind, NodeKind::Tag { .. })
    }

    pub fn label(&self) -> &str {
        match &self.kind {
            NodeKind::Idea { idea, .. } => &idea.title,
            NodeKind::Tag { name, .. } => name.rsplit('/').next().unwrap_or(name),
        }
    }

    pub fn age(&self) -> Option<f32> {
        match &self.kind {
            NodeKind::Idea { age, .. } => Some(*age),
            NodeKind::Tag { .. } => None,
        }
    }

    pub fn matches_search(&self, needle_lower: &str) -> bool {
        if needle_lower.is_empty() {
            return false;
        }
        match &self.kind {
            NodeKind::Idea { idea, .. } => {
                idea.title.to_lowercase().contains(needle_lower)
                    || idea.topic.to_lowercase().contains(needle_lower)
                    || idea.content.to_lowercase().contains(needle_lower)
                    || idea
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(needle_lower))
                    || idea
                        .trades
                        .iter()
                        .any(|trade| trade.to_lowercase().contains(needle_lower))
            }
            NodeKind::Tag { name, .. } => name.to_lowercase().contains(needle_lower),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub tag_hierarchy: Vec<ParsedTag>,
    pub topics: Vec<String>,
}

const TAG_LINK_DISTANCE: f32 = 40.0;
const TAG_LINK_STRENGTH: f32 = 0.5;
const HIERARCHY_DISTANCE: f32 = 35.0;
const HIERARCHY_STRENGTH: f32 = 0.9;
const TEMPORAL_WINDOW_DAYS: f32 = 7.0;
const TOPIC_DISTANCE: f32 = 70.0;
const TOPIC_STRENGTH: f32 = 0.4;
const TICKER_DISTANCE: f32 = 50.0;
const TICKER_STRENGTH: f32 = 0.6;
const STRATEGY_DISTANCE: f32 = 80.0;
const STRATEGY_STRENGTH: f32 = 0.3;

/// Builds the full node/link set from scratch. Deterministic for identical
/// inputs (`now` included); never mutates the input ideas.
pub fn build_graph(ideas: &[Idea], show_tags: bool, now: OffsetDateTime) -> GraphData {
    let enriched: Vec<Idea> = ideas.iter().map(process_idea).collect();

    let mut nodes = Vec::with_capacity(enriched.len());
    for idea in &enriched {
        let age = age_days(idea.created_at, now);
        let radius = (6.0 + 0.5 * idea.tags.len() as f32 + 0.8 * idea.tickers.len() as f32)
            .clamp(6.0, 12.0);
        nodes.push(Node::with_kind(
            idea.id.clone(),
            radius,
            NodeKind::Idea {
                idea: idea.clone(),
                degree: 0,
                age,
            },
        ));
    }

    // Every path level an idea's tags reach, counted once per idea.
    let mut tag_hierarchy: Vec<ParsedTag> = Vec::new();
    let mut tag_counts: HashMap<String, usize> = HashMap::new();
    let mut seen_tags: HashSet<String> = HashSet::new();
    for idea in &enriched {
        for parsed in parse_nested_tags(&idea.tags) {
            *tag_counts.entry(parsed.name.clone()).or_insert(0) += 1;
            if seen_tags.insert(parsed.name.clone()) {
                tag_hierarchy.push(parsed);
            }
        }
    }

    for parsed in &tag_hierarchy {
        let count = tag_counts.get(&parsed.name).copied().unwrap_or(0);
        if count == 0 {
            continue;
        }
        let radius = (4.0 + 0.8 * count as f32).clamp(4.0, 10.0);
        nodes.push(Node::with_kind(
            tag_node_id(&parsed.name),
            radius,
            NodeKind::Tag {
                name: parsed.name.clone(),
                parent: parsed.parent.clone(),
                level: parsed.level,
                count,
            },
        ));
    }

    let tag_ids: HashSet<String> = nodes
        .iter()
        .filter(|node| node.is_tag())
        .map(|node| node.id.clone())
        .collect();

    let mut links = Vec::new();

    // Tag tree edges, parent toward child.
    for parsed in &tag_hierarchy {
        if let Some(parent) = &parsed.parent {
            let parent_id = tag_node_id(parent);
            let child_id = tag_node_id(&parsed.name);
            if tag_ids.contains(&parent_id) && tag_ids.contains(&child_id) {
                links.push(Link::new(
                    &parent_id,
                    &child_id,
                    LinkKind::Hierarchy,
                    HIERARCHY_DISTANCE,
                    HIERARCHY_STRENGTH,
                ));
            }
        }
    }

    // Idea-to-tag membership: each raw tag string links the idea to its most
    // specific path level only; ancestors hang off the hierarchy edges.
    for idea in &enriched {
        let mut linked = HashSet::new();
        for tag in &idea.tags {
            let leaf_id = tag_node_id(tag);
            if tag_ids.contains(&leaf_id) && linked.insert(leaf_id.clone()) {
                links.push(Link::new(
                    &idea.id,
                    &leaf_id,
                    LinkKind::Tag,
                    TAG_LINK_DISTANCE,
                    TAG_LINK_STRENGTH,
                ));
            }
        }
    }

    // Temporal chain over the creation timeline.
    let mut by_time: Vec<&Idea> = enriched.iter().collect();
    by_time.sort_by_key(|idea| idea.created_at);
    for pair in by_time.windows(2) {
        let [earlier, later] = pair else { continue };
        if earlier.id == later.id {
            continue;
        }
        let gap_days = (later.created_at - earlier.created_at).whole_seconds() as f32 / 86_400.0;
        if gap_days <= TEMPORAL_WINDOW_DAYS {
            let mut link = Link::new(
                &earlier.id,
                &later.id,
                LinkKind::Temporal,
                (gap_days * 10.0).max(60.0),
                0.3,
            );
            link.age = Some(
                age_days(earlier.created_at, now).min(age_days(later.created_at, now)),
            );
            links.push(link);
        }
    }

    // Cliques within shared topic, ticker, and strategy groups.
    let topics = clique_links(
        &enriched,
        &mut links,
        LinkKind::Topic,
        TOPIC_DISTANCE,
        TOPIC_STRENGTH,
        |idea| {
            if idea.topic.is_empty() {
                vec![]
            } else {
                vec![idea.topic.clone()]
            }
        },
    );

    clique_links(
        &enriched,
        &mut links,
        LinkKind::Ticker,
        TICKER_DISTANCE,
        TICKER_STRENGTH,
        |idea| idea.tickers.clone(),
    );

    clique_links(
        &enriched,
        &mut links,
        LinkKind::Strategy,
        STRATEGY_DISTANCE,
        STRATEGY_STRENGTH,
        |idea| idea.strategy.clone().into_iter().collect(),
    );

    if !show_tags {
        nodes.retain(|node| !node.is_tag());
        links.retain(|link| !matches!(link.kind, LinkKind::Tag | LinkKind::Hierarchy));
    }

    apply_degrees(&mut nodes, &links);

    GraphData {
        nodes,
        links,
        tag_hierarchy,
        topics,
    }
}

/// Emits pairwise links inside each group produced by `keys_of`, in
/// first-seen group order, and returns the distinct keys. Groups of one
/// yield nothing.
fn clique_links(
    ideas: &[Idea],
    links: &mut Vec<Link>,
    kind: LinkKind,
    distance: f32,
    strength: f32,
    keys_of: impl Fn(&Idea) -> Vec<String>,
) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();

    for (index, idea) in ideas.iter().enumerate() {
        for key in keys_of(idea) {
            let members = groups.entry(key.clone()).or_default();
            if members.is_empty() {
                order.push(key);
            }
            members.push(index);
        }
    }

    for key in &order {
        let Some(members) = groups.get(key) else {
            continue;
        };
        if members.len() < 2 {
            continue;
        }
        for (slot, &a) in members.iter().enumerate() {
            for &b in &members[slot + 1..] {
                links.push(Link::new(&ideas[a].id, &ideas[b].id, kind, distance, strength));
            }
        }
    }

    order
}

fn apply_degrees(nodes: &mut [Node], links: &[Link]) {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut degrees = vec![0usize; nodes.len()];
    for link in links {
        if !link.kind.counts_toward_degree() {
            continue;
        }
        if let Some(&source) = index.get(link.source.as_str()) {
            degrees[source] += 1;
        }
        if let Some(&target) = index.get(link.target.as_str()) {
            degrees[target] += 1;
        }
    }

    for (node, node_degree) in nodes.iter_mut().zip(degrees) {
        if let NodeKind::Idea { degree, .. } = &mut node.kind {
            *degree = node_degree;
        }
    }
}

pub fn index_by_id(nodes: &[Node]) -> HashMap<String, usize> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.clone(), index))
        .collect()
}

pub fn resolve_links(links: &[Link], index: &HashMap<String, usize>) -> Vec<ResolvedLink> {
    links
        .iter()
        .filter_map(|link| {
            let source = *index.get(&link.source)?;
            let target = *index.get(&link.target)?;
            Some(ResolvedLink {
                source,
                target,
                kind: link.kind,
                weight: link.weight,
                distance: link.distance,
                strength: link.strength,
                age: link.age,
            })
        })
        .collect()
}

/// Opposite endpoints of every link touching `node_index`, one hop only.
pub fn connected_nodes(links: &[ResolvedLink], node_index: usize) -> HashSet<usize> {
    let mut connected = HashSet::new();
    for link in links {
        if link.source == node_index {
            connected.insert(link.target);
        } else if link.target == node_index {
            connected.insert(link.source);
        }
    }
    connected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::IdeaKind;
    use time::Duration;
    use time::macros::datetime;

    fn idea(id: &str, topic: &str, tags: &[&str], days_before_now: i64) -> Idea {
        Idea {
            id: id.to_string(),
            title: format!("Idea {id}"),
            content: String::new(),
            topic: topic.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            trades: vec![],
            created_at: now() - Duration::days(days_before_now),
            winrate: None,
            strategy: None,
            tickers: vec![],
            kind: IdeaKind::Regular,
        }
    }

    fn now() -> OffsetDateTime {
        datetime!(2026-08-01 12:00:00 UTC)
    }

    fn link_kinds(graph: &GraphData, kind: LinkKind) -> Vec<&Link> {
        graph.links.iter().filter(|l| l.kind == kind).collect()
    }

    #[test]
    fn spec_scenario_counts() {
        let ideas = vec![
            idea("1", "Breakout", &["setup/breakout"], 10),
            idea("2", "Breakout", &["setup/breakout"], 8),
        ];
        let graph = build_graph(&ideas, true, now());

        let idea_nodes = graph.nodes.iter().filter(|n| !n.is_tag()).count();
        let tag_nodes = graph.nodes.iter().filter(|n| n.is_tag()).count();
        assert_eq!(idea_nodes, 2);
        assert_eq!(tag_nodes, 2);

        assert_eq!(link_kinds(&graph, LinkKind::Hierarchy).len(), 1);
        assert_eq!(link_kinds(&graph, LinkKind::Tag).len(), 2);
        assert_eq!(link_kinds(&graph, LinkKind::Temporal).len(), 1);
        assert_eq!(link_kinds(&graph, LinkKind::Topic).len(), 1);
    }

    #[test]
    fn build_is_deterministic() {
        let ideas = vec![
            idea("1", "Breakout", &["setup/breakout", "risk"], 3),
            idea("2", "Macro", &["macro/fed"], 5),
            idea("3", "Breakout", &["setup/retest"], 6),
        ];
        let a = build_graph(&ideas, true, now());
        let b = build_graph(&ideas, true, now());

        let ids = |g: &GraphData| g.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        let edge_set = |g: &GraphData| {
            let mut edges: Vec<_> = g
                .links
                .iter()
                .map(|l| (l.source.clone(), l.target.clone(), l.kind))
                .collect();
            edges.sort();
            edges
        };
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(edge_set(&a), edge_set(&b));
    }

    #[test]
    fn no_dangling_tag_references() {
        let ideas = vec![
            idea("1", "Breakout", &["setup/breakout/fast"], 1),
            idea("2", "Macro", &["macro"], 2),
        ];
        let graph = build_graph(&ideas, true, now());
        let ids: HashSet<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        for link in &graph.links {
            assert!(ids.contains(link.source.as_str()), "dangling {}", link.source);
            assert!(ids.contains(link.target.as_str()), "dangling {}", link.target);
        }
    }

    #[test]
    fn hidden_tags_drop_tag_and_hierarchy_links_only() {
        let ideas = vec![
            idea("1", "Breakout", &["setup/breakout"], 1),
            idea("2", "Breakout", &["setup/breakout"], 2),
        ];
        let graph = build_graph(&ideas, false, now());

        assert!(graph.nodes.iter().all(|n| !n.is_tag()));
        assert!(link_kinds(&graph, LinkKind::Tag).is_empty());
        assert!(link_kinds(&graph, LinkKind::Hierarchy).is_empty());
        assert_eq!(link_kinds(&graph, LinkKind::Temporal).len(), 1);
        assert_eq!(link_kinds(&graph, LinkKind::Topic).len(), 1);
    }

    #[test]
    fn temporal_links_respect_the_seven_day_window() {
        let ideas = vec![
            idea("1", "", &[], 30),
            idea("2", "", &[], 25),
            idea("3", "", &[], 2),
        ];
        let graph = build_graph(&ideas, true, now());
        let temporal = link_kinds(&graph, LinkKind::Temporal);
        assert_eq!(temporal.len(), 1);
        assert_eq!(temporal[0].source, "1");
        assert_eq!(temporal[0].target, "2");
        assert_ne!(temporal[0].source, temporal[0].target);
        assert!(temporal[0].age.is_some());
        assert_eq!(temporal[0].distance, 60.0);
    }

    #[test]
    fn temporal_distance_grows_with_gap() {
        let ideas = vec![idea("1", "", &[], 7), idea("2", "", &[], 0)];
        let graph = build_graph(&ideas, true, now());
        let temporal = link_kinds(&graph, LinkKind::Temporal);
        assert_eq!(temporal.len(), 1);
        assert!((temporal[0].distance - 70.0).abs() < 0.5);
    }

    #[test]
    fn topic_groups_form_cliques() {
        let ideas = vec![
            idea("1", "Macro", &[], 100),
            idea("2", "Macro", &[], 200),
            idea("3", "Macro", &[], 300),
            idea("4", "Macro", &[], 400),
            idea("5", "Other", &[], 500),
        ];
        let graph = build_graph(&ideas, true, now());
        assert_eq!(link_kinds(&graph, LinkKind::Topic).len(), 6);
        assert_eq!(graph.topics, vec!["Macro".to_string(), "Other".to_string()]);
    }

    #[test]
    fn empty_topic_is_not_a_group() {
        let ideas = vec![idea("1", "", &[], 100), idea("2", "", &[], 300)];
        let graph = build_graph(&ideas, true, now());
        assert!(link_kinds(&graph, LinkKind::Topic).is_empty());
    }

    #[test]
    fn single_use_tickers_yield_no_links() {
        let mut a = idea("1", "Crypto", &[], 1);
        a.content = "watching $BTC and $SOL here".to_string();
        let mut b = idea("2", "Crypto", &[], 2);
        b.content = "$BTC only".to_string();

        let graph = build_graph(&[a, b], true, now());
        let ticker = link_kinds(&graph, LinkKind::Ticker);
        assert_eq!(ticker.len(), 1, "only the shared BTC pair links");
    }

    #[test]
    fn shared_strategy_links_pairs() {
        let mut a = idea("1", "", &[], 1);
        a.strategy = Some("momentum".to_string());
        let mut b = idea("2", "", &[], 40);
        b.strategy = Some("momentum".to_string());
        let mut c = idea("3", "", &[], 80);
        c.strategy = Some("event".to_string());

        let graph = build_graph(&[a, b, c], true, now());
        assert_eq!(link_kinds(&graph, LinkKind::Strategy).len(), 1);
    }

    #[test]
    fn degree_ignores_tag_membership() {
        let ideas = vec![
            idea("1", "Breakout", &["setup/breakout"], 1),
            idea("2", "Breakout", &["setup/breakout"], 2),
        ];
        let graph = build_graph(&ideas, true, now());
        for node in graph.nodes.iter().filter(|n| !n.is_tag()) {
            let NodeKind::Idea { degree, .. } = &node.kind else {
                unreachable!();
            };
            // one topic link + one temporal link, the tag link not counted
            assert_eq!(*degree, 2);
        }
    }

    #[test]
    fn idea_radius_is_clamped() {
        let small = idea("1", "", &[], 1);
        let mut big = idea("2", "", &["a", "b", "c", "d", "e", "f", "g", "h"], 2);
        big.content = "$AAA $BBB $CCC $DDD $EEE $FFF".to_string();

        let graph = build_graph(&[small, big], true, now());
        let radii: Vec<f32> = graph
            .nodes
            .iter()
            .filter(|n| !n.is_tag())
            .map(|n| n.radius)
            .collect();
        assert_eq!(radii[0], 6.0);
        assert_eq!(radii[1], 12.0);
    }

    #[test]
    fn tag_counts_accumulate_across_ideas() {
        let ideas = vec![
            idea("1", "", &["setup/breakout"], 1),
            idea("2", "", &["setup/retest"], 2),
            idea("3", "", &["setup"], 3),
        ];
        let graph = build_graph(&ideas, true, now());
        let setup = graph
            .nodes
            .iter()
            .find(|n| n.id == tag_node_id("setup"))
            .unwrap();
        let NodeKind::Tag { count, .. } = &setup.kind else {
            unreachable!();
        };
        assert_eq!(*count, 3);
    }

    #[test]
    fn resolution_and_one_hop_neighbourhood() {
        let ideas = vec![
            idea("1", "Breakout", &["setup"], 1),
            idea("2", "Breakout", &["setup"], 2),
            idea("3", "Macro", &[], 90),
        ];
        let graph = build_graph(&ideas, true, now());
        let index = index_by_id(&graph.nodes);
        let resolved = resolve_links(&graph.links, &index);
        assert_eq!(resolved.len(), graph.links.len());

        let first = index["1"];
        let connected = connected_nodes(&resolved, first);
        assert!(connected.contains(&index["2"]));
        assert!(connected.contains(&index[&tag_node_id("setup")]));
        assert!(!connected.contains(&index["3"]));
        assert!(!connected.contains(&first));
    }
}
