use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use eframe::egui::{
    self, Align, Align2, Color32, Context, CursorIcon, FontId, Layout, Painter, Pos2, Rect,
    RichText, Sense, Stroke, Ui, Vec2, vec2,
};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::color;
use crate::extract::ticker_sentiment;
use crate::graph::{LinkKind, Node, NodeKind, build_graph};
use crate::journal::{Idea, Journal, demo_journal, load_journal};
use crate::physics::{PhysicsTuning, Simulation};
use crate::util::{format_age, truncate_label};

const ZOOM_MIN: f32 = 0.1;
const ZOOM_MAX: f32 = 4.0;

pub struct IdeaGraphApp {
    source: JournalSource,
    state: AppState,
}

#[derive(Clone)]
pub enum JournalSource {
    File(PathBuf),
    Demo,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Journal, String>>,
    },
    Ready(ViewModel),
    Error(String),
}

impl IdeaGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, source: JournalSource) -> Self {
        let state = Self::start_load(source.clone());
        Self { source, state }
    }

    fn start_load(source: JournalSource) -> AppState {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = match &source {
                JournalSource::File(path) => load_journal(path).map_err(|error| format!("{error:#}")),
                JournalSource::Demo => Ok(demo_journal(OffsetDateTime::now_utc())),
            };
            let _ = tx.send(result);
        });

        AppState::Loading { rx }
    }
}

impl eframe::App for IdeaGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(journal) => AppState::Ready(ViewModel::new(journal)),
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading journal...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load journal");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.source.clone()));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                model.show(ctx, &mut reload_requested);
                if reload_requested {
                    transition = Some(Self::start_load(self.source.clone()));
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkMode {
    All,
    Temporal,
    Conceptual,
    Hierarchy,
    Ticker,
}

impl LinkMode {
    const ALL: [LinkMode; 5] = [
        Self::All,
        Self::Temporal,
        Self::Conceptual,
        Self::Hierarchy,
        Self::Ticker,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::All => "All links",
            Self::Temporal => "Temporal",
            Self::Conceptual => "Conceptual",
            Self::Hierarchy => "Hierarchy",
            Self::Ticker => "Ticker",
        }
    }

    fn allows(self, kind: LinkKind) -> bool {
        match self {
            Self::All => true,
            Self::Temporal => kind == LinkKind::Temporal,
            Self::Conceptual => {
                matches!(kind, LinkKind::Topic | LinkKind::Tag | LinkKind::Strategy)
            }
            Self::Hierarchy => kind == LinkKind::Hierarchy,
            Self::Ticker => kind == LinkKind::Ticker,
        }
    }
}

struct ViewModel {
    journal: Journal,
    sim: Simulation,
    topics: Vec<String>,
    all_tickers: Vec<String>,
    search: String,
    link_mode: LinkMode,
    show_tags: bool,
    timeline_mode: bool,
    selected_tickers: Vec<String>,
    hidden: HashSet<String>,
    isolated: Option<String>,
    selected: Option<String>,
    dragging: Option<usize>,
    context_target: Option<String>,
    pan: Vec2,
    zoom: f32,
    tuning: PhysicsTuning,
    graph_dirty: bool,
    visible_node_count: usize,
    visible_link_count: usize,
}

impl ViewModel {
    fn new(journal: Journal) -> Self {
        Self {
            journal,
            sim: Simulation::new(Default::default()),
            topics: Vec::new(),
            all_tickers: Vec::new(),
            search: String::new(),
            link_mode: LinkMode::All,
            show_tags: true,
            timeline_mode: false,
            selected_tickers: Vec::new(),
            hidden: HashSet::new(),
            isolated: None,
            selected: None,
            dragging: None,
            context_target: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            tuning: PhysicsTuning::default(),
            graph_dirty: true,
            visible_node_count: 0,
            visible_link_count: 0,
        }
    }

    fn show(&mut self, ctx: &Context, reload_requested: &mut bool) {
        if self.graph_dirty {
            self.rebuild_graph();
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("idea-graph");
                    ui.separator();
                    ui.label(format!("journal: {}", self.journal.source));
                    ui.label(format!("ideas: {}", self.journal.idea_count()));
                    if self.journal.dropped > 0 {
                        ui.colored_label(
                            Color32::from_rgb(235, 160, 90),
                            format!("{} dropped (bad dates)", self.journal.dropped),
                        );
                    }
                    if ui.button("Reload journal").clicked() {
                        *reload_requested = true;
                    }
                    if ui.button("Reset view").clicked() {
                        self.pan = Vec2::ZERO;
                        self.zoom = 1.0;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(format!(
                            "visible: {} nodes / {} links",
                            self.visible_node_count, self.visible_link_count
                        ));
                        let dt = ui.input(|input| input.stable_dt);
                        if dt > f32::EPSILON {
                            ui.label(format!("{:.0} fps", (1.0 / dt).clamp(0.0, 999.0)));
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(330.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));
    }

    fn rebuild_graph(&mut self) {
        let graph = build_graph(&self.journal.ideas, self.show_tags, OffsetDateTime::now_utc());
        self.topics = graph.topics.clone();

        let mut tickers: Vec<String> = Vec::new();
        for node in &graph.nodes {
            if let NodeKind::Idea { idea, .. } = &node.kind {
                for ticker in &idea.tickers {
                    if !tickers.contains(ticker) {
                        tickers.push(ticker.clone());
                    }
                }
            }
        }
        tickers.sort();
        self.all_tickers = tickers;

        debug!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            tag_paths = graph.tag_hierarchy.len(),
            show_tags = self.show_tags,
            "rebuilt idea graph"
        );

        // The old simulation (and with it every stale position and pin) is
        // dropped wholesale before the replacement takes over.
        self.sim = Simulation::new(graph);
        self.dragging = None;

        if let Some(isolated) = &self.isolated
            && !self.sim.index_by_id.contains_key(isolated)
        {
            self.isolated = None;
        }
        if let Some(selected) = &self.selected
            && !self.sim.index_by_id.contains_key(selected)
        {
            self.selected = None;
        }
        self.graph_dirty = false;
    }

    fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.add_space(4.0);

        ui.label("Search ideas and tags");
        ui.text_edit_singleline(&mut self.search)
            .on_hover_text("Substring match on title, topic, content, tags and trades.");

        ui.add_space(6.0);
        egui::ComboBox::from_label("Link filter")
            .selected_text(self.link_mode.label())
            .show_ui(ui, |ui| {
                for mode in LinkMode::ALL {
                    ui.selectable_value(&mut self.link_mode, mode, mode.label());
                }
            });

        if ui
            .checkbox(&mut self.show_tags, "Show tag nodes")
            .on_hover_text("Include tag nodes and tag/hierarchy links in the graph.")
            .changed()
        {
            self.graph_dirty = true;
        }

        ui.checkbox(&mut self.timeline_mode, "Timeline mode")
            .on_hover_text("Pull ideas into a left-to-right recency ordering.");

        if !self.all_tickers.is_empty() {
            ui.add_space(6.0);
            ui.label(RichText::new("Tickers").strong());
            ui.horizontal_wrapped(|ui| {
                let tickers = self.all_tickers.clone();
                for ticker in tickers {
                    let active = self.selected_tickers.contains(&ticker);
                    if ui.selectable_label(active, format!("${ticker}")).clicked() {
                        self.toggle_ticker(&ticker);
                    }
                }
            });
            if !self.selected_tickers.is_empty() && ui.button("Clear ticker filter").clicked() {
                self.selected_tickers.clear();
            }
        }

        ui.add_space(6.0);
        ui.collapsing("Physics tuning", |ui| {
            ui.add(
                egui::Slider::new(&mut self.tuning.intensity, 0.2..=2.5)
                    .text("Intensity")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("Overall strength applied to all layout forces.");
            ui.add(
                egui::Slider::new(&mut self.tuning.repulsion, 0.2..=2.5)
                    .text("Repulsion")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("How strongly nodes push away from each other.");
            ui.add(
                egui::Slider::new(&mut self.tuning.spring, 0.2..=2.5)
                    .text("Link spring")
                    .clamping(egui::SliderClamping::Always),
            )
            .on_hover_text("How strongly linked nodes pull toward their rest distance.");
        });

        if let Some(isolated) = self.isolated.clone() {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label(format!(
                    "Isolated: {}",
                    self.node_by_id(&isolated)
                        .map(|node| truncate_label(node.label(), 18))
                        .unwrap_or_else(|| isolated.clone())
                ));
                if ui.small_button("Clear").clicked() {
                    self.isolated = None;
                }
            });
        }

        if !self.hidden.is_empty() {
            ui.add_space(6.0);
            if ui
                .button(format!("Clear hidden ({})", self.hidden.len()))
                .clicked()
            {
                self.hidden.clear();
            }
        }

        ui.add_space(8.0);
        ui.collapsing("Legend", |ui| {
            for kind in [
                LinkKind::Topic,
                LinkKind::Tag,
                LinkKind::Temporal,
                LinkKind::Hierarchy,
                LinkKind::Ticker,
                LinkKind::Strategy,
            ] {
                ui.horizontal(|ui| {
                    let (rect, _) = ui.allocate_exact_size(vec2(18.0, 4.0), Sense::hover());
                    ui.painter()
                        .rect_filled(rect, 1.0, color::link_color(kind));
                    ui.label(kind.label());
                });
            }
            ui.separator();
            ui.label("Filled circles are ideas, rings are tags.");
            ui.label("Gold accents mark ideas with extracted tickers.");
        });

        if !self.topics.is_empty() {
            ui.add_space(8.0);
            ui.label(RichText::new("Topics").strong());
            let topics = self.topics.clone();
            for topic in topics {
                ui.horizontal(|ui| {
                    let (rect, _) = ui.allocate_exact_size(vec2(10.0, 10.0), Sense::hover());
                    ui.painter()
                        .circle_filled(rect.center(), 4.0, color::topic_color(&topic));
                    if ui.link(&topic).clicked() {
                        self.search = topic.clone();
                    }
                });
            }
        }
    }

    fn toggle_ticker(&mut self, ticker: &str) {
        if let Some(position) = self.selected_tickers.iter().position(|t| t == ticker) {
            self.selected_tickers.remove(position);
        } else {
            self.selected_tickers.push(ticker.to_string());
        }
    }

    fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.sim
            .index_by_id
            .get(id)
            .and_then(|&index| self.sim.nodes.get(index))
    }

    fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Details");
        ui.add_space(6.0);

        let Some(selected_id) = self.selected.clone() else {
            ui.label("Select a node from the graph.");
            return;
        };

        let Some(node) = self.node_by_id(&selected_id).cloned() else {
            ui.label("The selected node is no longer in the graph.");
            return;
        };

        match &node.kind {
            NodeKind::Idea { idea, degree, age } => {
                self.draw_idea_details(ui, idea, *degree, *age);
            }
            NodeKind::Tag {
                name,
                parent,
                level,
                count,
            } => {
                self.draw_tag_details(ui, name, parent.as_deref(), *level, *count);
            }
        }
    }

    fn draw_idea_details(&mut self, ui: &mut Ui, idea: &Idea, degree: usize, age: f32) {
        ui.label(RichText::new(&idea.title).strong());
        ui.small(idea.id.as_str());
        ui.add_space(6.0);

        if !idea.topic.is_empty() {
            ui.label(format!("Topic: {}", idea.topic));
        }
        ui.label(format!("Type: {}", idea.kind.label()));
        ui.label(format!("Created: {}", format_age(age)));
        ui.label(format!("Connections: {degree}"));
        if let Some(winrate) = idea.winrate {
            ui.label(format!("Win rate: {winrate:.0}%"));
        }
        if let Some(strategy) = &idea.strategy {
            ui.label(format!("Strategy: {strategy}"));
        }
        if !idea.tags.is_empty() {
            ui.label(format!("Tags: {}", idea.tags.join(", ")));
        }
        if !idea.trades.is_empty() {
            ui.label(format!("Trades: {}", idea.trades.join(", ")));
        }

        if !idea.tickers.is_empty() {
            ui.add_space(6.0);
            ui.label(RichText::new("Tickers").strong());
            let context = format!("{} {}", idea.title, idea.content);
            for ticker in &idea.tickers {
                let sentiment = ticker_sentiment(&context, ticker);
                ui.horizontal(|ui| {
                    ui.label(format!("${ticker}"));
                    ui.label(RichText::new(sentiment.label()).small());
                });
            }
        }

        if !idea.content.is_empty() {
            ui.add_space(6.0);
            ui.separator();
            ui.label(truncate_label(&idea.content, 320));
        }

        ui.add_space(6.0);
        ui.separator();
        ui.label(RichText::new("Similar ideas").strong());
        let similar = self.similar_ideas(idea, 8);
        if similar.is_empty() {
            ui.label("Nothing comparable in this journal.");
        } else {
            for (id, title, score) in similar {
                if ui
                    .link(truncate_label(&title, 36))
                    .on_hover_text(format!("similarity score {score}"))
                    .clicked()
                {
                    self.selected = Some(id);
                }
            }
        }
    }

    fn draw_tag_details(
        &mut self,
        ui: &mut Ui,
        name: &str,
        parent: Option<&str>,
        level: usize,
        count: usize,
    ) {
        ui.label(RichText::new(name).strong());
        ui.add_space(6.0);
        ui.label(format!("Level: {level}"));
        ui.label(format!(
            "Used by {count} idea{}",
            if count == 1 { "" } else { "s" }
        ));
        if let Some(parent) = parent {
            let parent_id = crate::graph::tag_node_id(parent);
            if ui.link(format!("Parent: {parent}")).clicked()
                && self.sim.index_by_id.contains_key(&parent_id)
            {
                self.selected = Some(parent_id);
            }
        }

        ui.add_space(6.0);
        ui.separator();
        ui.label(RichText::new("Ideas with this tag").strong());
        let mut members: Vec<(String, String)> = Vec::new();
        for idea in &self.journal.ideas {
            let has_tag = idea
                .tags
                .iter()
                .any(|tag| tag == name || tag.starts_with(&format!("{name}/")));
            if has_tag {
                members.push((idea.id.clone(), idea.title.clone()));
            }
        }
        if members.is_empty() {
            ui.label("No ideas currently carry this tag.");
        }
        for (id, title) in members {
            if ui.link(truncate_label(&title, 36)).clicked() {
                self.selected = Some(id);
            }
        }
    }

    /// Fuzzy-ranks the other ideas against this idea's title and topic.
    fn similar_ideas(&self, reference: &Idea, limit: usize) -> Vec<(String, String, i64)> {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(String, String, i64)> = self
            .journal
            .ideas
            .iter()
            .filter(|other| other.id != reference.id)
            .filter_map(|other| {
                let haystack = format!("{} {}", other.title, other.content);
                let mut score = matcher.fuzzy_match(&haystack, &reference.title).unwrap_or(0);
                if !reference.topic.is_empty() && other.topic == reference.topic {
                    score += 24;
                }
                for ticker in &reference.tickers {
                    if other.tickers.contains(ticker)
                        || haystack.to_uppercase().contains(ticker.as_str())
                    {
                        score += 16;
                    }
                }
                (score > 0).then(|| (other.id.clone(), other.title.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }

    fn draw_graph(&mut self, ui: &mut Ui) {
        if self.graph_dirty {
            self.rebuild_graph();
        }

        self.sim.tick(self.tuning, self.timeline_mode);
        if self.sim.is_active() {
            ui.ctx().request_repaint();
        }

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        draw_background(&painter, rect, self.pan, self.zoom);

        if self.sim.nodes.is_empty() {
            self.visible_node_count = 0;
            self.visible_link_count = 0;
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No ideas to graph yet.",
                FontId::proportional(14.0),
                Color32::from_gray(150),
            );
            return;
        }

        // Wheel zoom about the pointer; suppressed entirely while dragging.
        if response.hovered() && self.dragging.is_none() {
            let scroll = ui.input(|input| input.raw_scroll_delta.y);
            if scroll.abs() > f32::EPSILON {
                let pointer = ui
                    .input(|input| input.pointer.hover_pos())
                    .unwrap_or_else(|| rect.center());
                let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

                let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
                self.zoom = (self.zoom * zoom_factor).clamp(ZOOM_MIN, ZOOM_MAX);

                self.pan = pointer - rect.center() - (world_before * self.zoom);
            }
        }

        let isolation_keep = self.isolated.clone().and_then(|id| {
            self.sim.index_by_id.get(&id).map(|&index| {
                let mut keep = self.sim.connected_of(index);
                keep.insert(index);
                keep
            })
        });

        // Tags draw first so idea nodes overlay them; the same order drives
        // hit testing from the top of the stack down.
        let mut draw_order: Vec<usize> = Vec::with_capacity(self.sim.nodes.len());
        for want_tag in [true, false] {
            for (index, node) in self.sim.nodes.iter().enumerate() {
                if node.is_tag() != want_tag {
                    continue;
                }
                if self.hidden.contains(&node.id) {
                    continue;
                }
                if let Some(keep) = &isolation_keep
                    && !keep.contains(&index)
                {
                    continue;
                }
                draw_order.push(index);
            }
        }

        let drawable: HashSet<usize> = draw_order.iter().copied().collect();
        self.visible_node_count = draw_order.len();

        // Drag a node, or pan when the press lands on empty canvas.
        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
        {
            let world = screen_to_world(rect, self.pan, self.zoom, pointer);
            if let Some(index) = find_node_at(&self.sim.nodes, &draw_order, world) {
                self.dragging = Some(index);
                self.sim.begin_drag(index);
            }
        }

        if let Some(index) = self.dragging {
            if let Some(pointer) = response.interact_pointer_pos() {
                let world = screen_to_world(rect, self.pan, self.zoom, pointer);
                self.sim.drag_to(index, world.x, world.y);
            }
            if response.drag_stopped_by(egui::PointerButton::Primary) {
                self.sim.end_drag(index);
                self.dragging = None;
            }
        } else if response.dragged_by(egui::PointerButton::Primary)
            || response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }

        // Hover resolves against the same geometry as rendering; suspended
        // while a drag is in progress.
        let pointer_pos = ui.input(|input| input.pointer.hover_pos());
        let hovered = if self.dragging.is_none() {
            pointer_pos.and_then(|pointer| {
                if !rect.contains(pointer) {
                    return None;
                }
                let world = screen_to_world(rect, self.pan, self.zoom, pointer);
                find_node_at(&self.sim.nodes, &draw_order, world)
            })
        } else {
            self.dragging
        };

        if hovered.is_some() && self.dragging.is_none() {
            ui.output_mut(|output| {
                output.cursor_icon = CursorIcon::PointingHand;
            });
        }

        if response.clicked_by(egui::PointerButton::Primary) {
            self.selected = hovered.map(|index| self.sim.nodes[index].id.clone());
        }

        if response.double_clicked() {
            if let Some(index) = hovered {
                let id = self.sim.nodes[index].id.clone();
                self.isolated = if self.isolated.as_deref() == Some(id.as_str()) {
                    None
                } else {
                    Some(id)
                };
            } else {
                self.isolated = None;
            }
        }

        if response.secondary_clicked() {
            self.context_target = hovered.map(|index| self.sim.nodes[index].id.clone());
        }

        let highlight_set: Option<HashSet<usize>> = hovered.map(|index| {
            let mut set = self.sim.connected_of(index);
            set.insert(index);
            set
        });

        let needle = self.search.trim().to_lowercase();
        let search_matches: HashSet<usize> = if needle.is_empty() {
            HashSet::new()
        } else {
            draw_order
                .iter()
                .copied()
                .filter(|&index| self.sim.nodes[index].matches_search(&needle))
                .collect()
        };
        let search_active = !needle.is_empty();

        let ticker_matches: HashSet<usize> = if self.selected_tickers.is_empty() {
            HashSet::new()
        } else {
            draw_order
                .iter()
                .copied()
                .filter(|&index| match &self.sim.nodes[index].kind {
                    NodeKind::Idea { idea, .. } => idea
                        .tickers
                        .iter()
                        .any(|ticker| self.selected_tickers.contains(ticker)),
                    NodeKind::Tag { .. } => false,
                })
                .collect()
        };
        let ticker_filter_active = !self.selected_tickers.is_empty();

        let mut visible_links = 0usize;
        for link in &self.sim.links {
            if !self.link_mode.allows(link.kind) {
                continue;
            }
            if !drawable.contains(&link.source) || !drawable.contains(&link.target) {
                continue;
            }

            let source = &self.sim.nodes[link.source];
            let target = &self.sim.nodes[link.target];
            let start = world_to_screen(rect, self.pan, self.zoom, vec2(source.x, source.y));
            let end = world_to_screen(rect, self.pan, self.zoom, vec2(target.x, target.y));
            if !segment_visible(rect, start, end) {
                continue;
            }
            visible_links += 1;

            let in_highlight = highlight_set.as_ref().is_some_and(|set| {
                set.contains(&link.source) || set.contains(&link.target)
            });

            let mut link_alpha: f32 = 0.55;
            if link.kind == LinkKind::Temporal
                && let Some(age) = link.age
            {
                link_alpha *= color::temporal_fade(age);
            }

            let base = color::link_color(link.kind);
            let (width, line_color) = if in_highlight {
                (
                    (1.9 * self.zoom.sqrt()).clamp(1.0, 3.4),
                    color::blend(base, Color32::WHITE, 0.35),
                )
            } else if highlight_set.is_some() {
                (
                    (0.6 * self.zoom.sqrt()).clamp(0.3, 1.4),
                    color::dim(base, 0.35),
                )
            } else {
                (
                    (0.9 * self.zoom.sqrt()).clamp(0.5, 2.2),
                    base.gamma_multiply(link_alpha),
                )
            };

            painter.line_segment([start, end], Stroke::new(width, line_color));

            if link.kind == LinkKind::Hierarchy {
                draw_arrowhead(&painter, start, end, target.radius * self.zoom, line_color);
            }
        }
        self.visible_link_count = visible_links;

        for &index in &draw_order {
            let node = &self.sim.nodes[index];
            let position = world_to_screen(rect, self.pan, self.zoom, vec2(node.x, node.y));
            let radius = (node.radius * self.zoom).max(1.5);
            if !circle_visible(rect, position, radius) {
                continue;
            }

            let is_dragged = self.dragging == Some(index);
            let is_hovered = hovered == Some(index);
            let is_selected = self.selected.as_deref() == Some(node.id.as_str());
            let in_highlight = highlight_set.as_ref().is_some_and(|set| set.contains(&index));
            let is_search_match = search_matches.contains(&index);
            let dim_for_search = search_active && !is_search_match;
            let dim_for_ticker = ticker_filter_active
                && !node.is_tag()
                && !ticker_matches.contains(&index);

            match &node.kind {
                NodeKind::Tag { level, .. } => {
                    let mut ring = color::tag_ring_color(*level);
                    if dim_for_search {
                        ring = color::dim(ring, 0.35);
                    }
                    let ring_width = if is_hovered || is_selected { 2.6 } else { 1.6 };
                    painter.circle_stroke(position, radius, Stroke::new(ring_width, ring));
                    if in_highlight && !is_hovered {
                        painter.circle_stroke(
                            position,
                            radius + 2.5,
                            Stroke::new(1.0, color::blend(ring, Color32::WHITE, 0.4)),
                        );
                    }
                }
                NodeKind::Idea { idea, age, .. } => {
                    let mut fill = if self.timeline_mode {
                        color::age_color(*age)
                    } else if !idea.tickers.is_empty() {
                        color::asset_class_color(&idea.tickers)
                    } else {
                        color::topic_color(&idea.topic)
                    };

                    if is_search_match {
                        fill = color::blend(fill, Color32::from_rgb(103, 196, 255), 0.45);
                    } else if dim_for_search || dim_for_ticker {
                        fill = color::dim(fill, 0.3);
                    } else if highlight_set.is_some() && !in_highlight {
                        fill = color::dim(fill, 0.55);
                    }

                    painter.circle_filled(position, radius, fill);
                    // Offset sheen stands in for a radial gradient.
                    painter.circle_filled(
                        position - vec2(radius * 0.3, radius * 0.3),
                        radius * 0.4,
                        color::blend(fill, Color32::WHITE, 0.25),
                    );

                    let stroke = if is_dragged {
                        Stroke::new(2.6, Color32::WHITE)
                    } else if is_selected {
                        Stroke::new(2.2, color::ACCENT_GOLD)
                    } else if is_hovered {
                        Stroke::new(2.0, Color32::from_rgb(255, 164, 101))
                    } else if in_highlight {
                        Stroke::new(1.6, Color32::from_gray(220))
                    } else {
                        Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190))
                    };
                    painter.circle_stroke(position, radius, stroke);

                    if !idea.tickers.is_empty() && !dim_for_search {
                        painter.circle_stroke(
                            position,
                            radius + 2.0,
                            Stroke::new(1.0, color::ACCENT_GOLD),
                        );
                        painter.circle_filled(
                            position + vec2(radius * 0.75, -radius * 0.75),
                            2.0,
                            color::ACCENT_GOLD,
                        );
                    }
                }
            }

            let label_color = if dim_for_search {
                Color32::from_gray(110)
            } else {
                Color32::from_gray(230)
            };
            painter.text(
                position + vec2(radius + 5.0, 0.0),
                Align2::LEFT_CENTER,
                truncate_label(node.label(), 26),
                FontId::proportional(12.0),
                label_color,
            );

            if is_hovered || is_search_match {
                let detail = node_detail_line(node);
                if !detail.is_empty() {
                    painter.text(
                        position + vec2(radius + 5.0, 13.0),
                        Align2::LEFT_CENTER,
                        detail,
                        FontId::proportional(10.0),
                        Color32::from_gray(170),
                    );
                }
            }
        }

        self.context_menu(&response);
    }

    fn context_menu(&mut self, response: &egui::Response) {
        let Some(target_id) = self.context_target.clone() else {
            return;
        };
        let Some(node) = self.node_by_id(&target_id).cloned() else {
            return;
        };

        response.context_menu(|ui| {
            ui.label(RichText::new(truncate_label(node.label(), 28)).strong());
            ui.separator();

            let isolated_here = self.isolated.as_deref() == Some(target_id.as_str());
            if ui
                .button(if isolated_here {
                    "Clear isolation"
                } else {
                    "Isolate neighborhood"
                })
                .clicked()
            {
                self.isolated = if isolated_here {
                    None
                } else {
                    Some(target_id.clone())
                };
                ui.close();
            }

            if ui.button("Hide node").clicked() {
                self.hidden.insert(target_id.clone());
                if self.selected.as_deref() == Some(target_id.as_str()) {
                    self.selected = None;
                }
                info!(id = %target_id, "hid node from the graph");
                ui.close();
            }

            match &node.kind {
                NodeKind::Idea { idea, .. } => {
                    if !idea.topic.is_empty()
                        && ui.button(format!("Filter topic \"{}\"", idea.topic)).clicked()
                    {
                        self.search = idea.topic.clone();
                        ui.close();
                    }
                    for ticker in idea.tickers.iter().take(4) {
                        if ui.button(format!("Filter ${ticker}")).clicked() {
                            if !self.selected_tickers.contains(ticker) {
                                self.selected_tickers.push(ticker.clone());
                            }
                            ui.close();
                        }
                    }
                    ui.separator();
                    if ui.button("Find similar").clicked() {
                        self.selected = Some(target_id.clone());
                        ui.close();
                    }
                    if ui.button("Copy title").clicked() {
                        ui.ctx().copy_text(idea.title.clone());
                        ui.close();
                    }
                    if ui.button("Copy content").clicked() {
                        ui.ctx().copy_text(idea.content.clone());
                        ui.close();
                    }
                }
                NodeKind::Tag { name, .. } => {
                    if ui.button(format!("Filter tag \"{name}\"")).clicked() {
                        self.search = name.clone();
                        ui.close();
                    }
                }
            }
        });
    }
}

fn node_detail_line(node: &Node) -> String {
    match &node.kind {
        NodeKind::Idea { idea, age, .. } => {
            let mut parts = vec![format_age(*age)];
            if let Some(winrate) = idea.winrate {
                parts.push(format!("WR {winrate:.0}%"));
            }
            if !idea.tickers.is_empty() {
                parts.push(
                    idea.tickers
                        .iter()
                        .map(|t| format!("${t}"))
                        .collect::<Vec<_>>()
                        .join(" "),
                );
            }
            parts.join("  ·  ")
        }
        NodeKind::Tag { count, level, .. } => {
            format!("{count} ideas  ·  level {level}")
        }
    }
}

/// World-space hit test over the draw order, preferring whatever was
/// rendered last (top of the stack).
fn find_node_at(nodes: &[Node], draw_order: &[usize], world: Vec2) -> Option<usize> {
    draw_order
        .iter()
        .rev()
        .copied()
        .find(|&index| {
            let node = &nodes[index];
            let delta = vec2(node.x - world.x, node.y - world.y);
            delta.length() <= node.radius
        })
}

fn draw_arrowhead(painter: &Painter, start: Pos2, end: Pos2, target_radius: f32, color: Color32) {
    let delta = end - start;
    let length = delta.length();
    if length <= f32::EPSILON {
        return;
    }
    let direction = delta / length;
    let normal = vec2(-direction.y, direction.x);

    let tip = end - direction * (target_radius + 2.0);
    let base = tip - direction * 6.0;
    let left = base + normal * 3.5;
    let right = base - normal * 3.5;
    painter.add(egui::Shape::convex_polygon(
        vec![tip, left, right],
        color,
        Stroke::NONE,
    ));
}

fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(16, 20, 27));

    let grid = Stroke::new(1.0, Color32::from_rgba_unmultiplied(55, 66, 82, 64));
    let step = (64.0 * zoom.clamp(0.5, 2.0)).max(24.0);
    let origin = rect.center() + pan;

    let mut x = origin.x.rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], grid);
        x += step;
    }

    let mut y = origin.y.rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], grid);
        y += step;
    }

    // Axis crosshair marks the simulation origin the center force pulls toward.
    let cross = Stroke::new(1.0, Color32::from_rgba_unmultiplied(80, 94, 112, 90));
    if origin.x > rect.left() && origin.x < rect.right() {
        painter.line_segment(
            [
                Pos2::new(origin.x, rect.top()),
                Pos2::new(origin.x, rect.bottom()),
            ],
            cross,
        );
    }
    if origin.y > rect.top() && origin.y < rect.bottom() {
        painter.line_segment(
            [
                Pos2::new(rect.left(), origin.y),
                Pos2::new(rect.right(), origin.y),
            ],
            cross,
        );
    }
}

fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

fn segment_visible(rect: Rect, start: Pos2, end: Pos2) -> bool {
    let min_x = start.x.min(end.x) - 2.5;
    let max_x = start.x.max(end.x) + 2.5;
    let min_y = start.y.min(end.y) - 2.5;
    let max_y = start.y.max(end.y) + 2.5;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphData, build_graph};
    use crate::journal::demo_journal;
    use time::macros::datetime;

    fn test_nodes() -> Vec<Node> {
        let now = datetime!(2026-08-01 12:00:00 UTC);
        let journal = demo_journal(now);
        let graph = build_graph(&journal.ideas, true, now);
        let mut sim = Simulation::new(graph);
        for _ in 0..30 {
            sim.tick(PhysicsTuning::default(), false);
        }
        sim.nodes
    }

    #[test]
    fn transforms_round_trip() {
        let rect = Rect::from_min_size(Pos2::new(10.0, 20.0), vec2(800.0, 600.0));
        for (pan, zoom) in [
            (Vec2::ZERO, 1.0),
            (vec2(120.0, -44.0), 0.1),
            (vec2(-300.0, 95.0), 4.0),
        ] {
            let world = vec2(37.5, -81.25);
            let screen = world_to_screen(rect, pan, zoom, world);
            let back = screen_to_world(rect, pan, zoom, screen);
            assert!((back - world).length() < 0.001, "pan {pan:?} zoom {zoom}");
        }
    }

    #[test]
    fn hit_at_center_regardless_of_transform() {
        let nodes = test_nodes();
        let order: Vec<usize> = (0..nodes.len()).collect();
        let rect = Rect::from_min_size(Pos2::ZERO, vec2(1000.0, 700.0));

        for (pan, zoom) in [(Vec2::ZERO, 1.0), (vec2(250.0, -60.0), 0.1), (Vec2::ZERO, 4.0)] {
            let node = &nodes[3];
            let screen = world_to_screen(rect, pan, zoom, vec2(node.x, node.y));
            let world = screen_to_world(rect, pan, zoom, screen);
            let hit = find_node_at(&nodes, &order, world);
            assert!(hit.is_some(), "pan {pan:?} zoom {zoom}");
            let hit_node = &nodes[hit.unwrap()];
            let delta = vec2(hit_node.x - node.x, hit_node.y - node.y);
            assert!(delta.length() <= hit_node.radius + node.radius);
        }
    }

    #[test]
    fn miss_outside_every_radius() {
        let nodes = test_nodes();
        let order: Vec<usize> = (0..nodes.len()).collect();

        let max_extent = nodes
            .iter()
            .map(|n| vec2(n.x, n.y).length() + n.radius)
            .fold(0.0f32, f32::max);
        let far = vec2(max_extent + 50.0, 0.0);
        assert!(find_node_at(&nodes, &order, far).is_none());
    }

    #[test]
    fn hit_prefers_the_top_of_the_stack() {
        let mut nodes = test_nodes();
        // Stack two nodes on the same spot; the later draw-order entry wins.
        nodes[0].x = 500.0;
        nodes[0].y = 500.0;
        nodes[1].x = 500.0;
        nodes[1].y = 500.0;
        let order = vec![0, 1];
        assert_eq!(find_node_at(&nodes, &order, vec2(500.0, 500.0)), Some(1));
    }

    #[test]
    fn link_mode_filters_by_kind() {
        assert!(LinkMode::All.allows(LinkKind::Temporal));
        assert!(LinkMode::Temporal.allows(LinkKind::Temporal));
        assert!(!LinkMode::Temporal.allows(LinkKind::Topic));
        assert!(LinkMode::Conceptual.allows(LinkKind::Topic));
        assert!(LinkMode::Conceptual.allows(LinkKind::Tag));
        assert!(LinkMode::Conceptual.allows(LinkKind::Strategy));
        assert!(!LinkMode::Conceptual.allows(LinkKind::Hierarchy));
        assert!(LinkMode::Hierarchy.allows(LinkKind::Hierarchy));
        assert!(LinkMode::Ticker.allows(LinkKind::Ticker));
        assert!(!LinkMode::Ticker.allows(LinkKind::Tag));
    }

    #[test]
    fn empty_graph_view_model_is_inert() {
        let sim = Simulation::new(GraphData::default());
        assert!(sim.nodes.is_empty());
        assert!(find_node_at(&sim.nodes, &[], Vec2::ZERO).is_none());
    }
}
