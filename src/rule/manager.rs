//! Rule Manager
//!
//! Owns the rule layers and the committed [`Snapshot`], and drives the
//! per-update cycle:
//!
//! ```text
//! Idle -> Evaluating -> Ready
//!                    -> Stale   (the tree was superseded during evaluation)
//! ```
//!
//! Between updates it answers navigation queries (incremental navigation,
//! results at an offset, mutated controls), tracks the active zone by
//! identity and runs the auto-action sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::context::Evaluator;
use super::def::RuleDef;
use super::layers::Layers;
use super::mutation::MutatedControl;
use super::properties::PropertyKey;
use super::result::{AutoAction, RuleResult};
use super::rules::Rule;
use super::snapshot::Snapshot;
use super::types::{Direction, RuleType, BUILTIN_ACTIONS, MOVETO};
use super::zone::Zone;
use crate::config::Config;
use crate::dom::{ChangeSeq, Document};
use crate::error::{Error, Result};
use crate::path::PathCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No document evaluated yet, or terminated
    Idle,
    Evaluating,
    Ready,
    /// The last evaluation ran on a superseded tree; a rebuild is due
    Stale,
}

/// Incremental navigation request
#[derive(Debug, Clone, Copy)]
pub struct QuickNav<'q> {
    /// Search backwards
    pub previous: bool,
    /// Caret offset
    pub position: u32,
    /// Accepted rule types, every type when empty
    pub types: &'q [RuleType],
    pub name: Option<&'q str>,
    /// Stay inside the active zone
    pub respect_zone: bool,
    /// Skip results flagged `skip` and results inside skipped zones
    pub honour_skip: bool,
    /// Wrap to the first or last result when nothing lies ahead
    pub cycle: bool,
}

impl<'q> QuickNav<'q> {
    pub fn next(position: u32) -> Self {
        QuickNav {
            previous: false,
            position,
            types: &[],
            name: None,
            respect_zone: false,
            honour_skip: true,
            cycle: true,
        }
    }

    pub fn previous(position: u32) -> Self {
        QuickNav {
            previous: true,
            ..Self::next(position)
        }
    }

    #[must_use]
    pub fn types(mut self, types: &'q [RuleType]) -> Self {
        self.types = types;
        self
    }
}

/// Result of an incremental navigation
#[derive(Debug, Clone)]
pub struct NavHit {
    pub result: RuleResult,
    /// Found after wrapping around the document
    pub wrapped: bool,
}

/// What a gesture resolves to
#[derive(Debug, Clone)]
pub enum GestureTarget {
    Action { result: RuleResult, action: String },
    /// A rule binds the gesture but has no result on this page
    NotFound { rule: String, layer: String },
}

pub struct RuleManager {
    config: Config,
    layers: Layers,
    paths: PathCache,
    /// Custom action ids registered by the host
    actions: Vec<String>,
    state: ManagerState,
    snapshot: Option<Arc<Snapshot>>,
    zone: Option<Zone>,
    /// Text prefix last seen per control, for the auto-action sweep
    triggered: HashMap<u64, String>,
    last_moveto: Option<(String, Instant)>,
    auto_action_due: Option<Instant>,
    reported_title: Option<String>,
}

impl RuleManager {
    pub fn new(config: Config) -> Self {
        RuleManager {
            paths: PathCache::new(config.path_cache_capacity),
            config,
            layers: Layers::default(),
            actions: Vec::new(),
            state: ManagerState::Idle,
            snapshot: None,
            zone: None,
            triggered: HashMap::new(),
            last_moveto: None,
            auto_action_due: None,
            reported_title: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    /// Replace `layer` with `defs`, inserting it at `index` in tier order
    ///
    /// Every rejected rule yields one error; the others are still loaded.
    pub fn load(&mut self, layer: &str, index: Option<usize>, defs: &[RuleDef]) -> Vec<Error> {
        self.layers.insert(layer, index);
        let mut errors = Vec::new();
        for def in defs {
            match Rule::load(layer, def, &self.paths) {
                Ok(rule) => self.layers.add_rule(rule),
                Err(err) => {
                    warn!(layer, rule = %def.name, error = %err, "rule rejected");
                    errors.push(err);
                }
            }
        }
        debug!(layer, rules = defs.len() - errors.len(), "layer loaded");
        errors
    }

    /// [`load`](Self::load) from the host's JSON array of rule definitions
    pub fn load_json(&mut self, layer: &str, index: Option<usize>, json: &str) -> Result<Vec<Error>> {
        let defs: Vec<RuleDef> = serde_json::from_str(json)?;
        Ok(self.load(layer, index, &defs))
    }

    pub fn unload(&mut self, layer: &str) -> bool {
        self.layers.remove(layer)
    }

    /// Add or replace a rule, creating its layer on top when missing
    pub fn add_rule(&mut self, layer: &str, def: &RuleDef) -> Result<()> {
        let rule = Rule::load(layer, def, &self.paths)?;
        self.layers.add_rule(rule);
        Ok(())
    }

    pub fn remove_rule(&mut self, layer: &str, name: &str) -> bool {
        self.layers.remove_rule(layer, name).is_some()
    }

    pub fn dump(&self, layer: &str) -> Option<Vec<RuleDef>> {
        let layer = self.layers.get(layer)?;
        Some(layer.rules().iter().map(|rule| rule.dump()).collect())
    }

    pub fn get_rule(&self, name: &str, layer: Option<&str>) -> Option<Arc<Rule>> {
        self.layers.rule(name, layer).cloned()
    }

    /// Rules of `layer`, or of every layer in tier order
    pub fn rules(&self, layer: Option<&str>) -> Vec<Arc<Rule>> {
        match layer {
            Some(layer) => self
                .layers
                .get(layer)
                .map(|l| l.rules().to_vec())
                .unwrap_or_default(),
            None => self.layers.rules().cloned().collect(),
        }
    }

    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    pub fn register_action(&mut self, action: &str) {
        if !self.is_action(action) {
            self.actions.push(action.to_string());
        }
    }

    /// Built-in then registered action ids
    pub fn actions(&self) -> Vec<&str> {
        BUILTIN_ACTIONS
            .iter()
            .copied()
            .chain(self.actions.iter().map(String::as_str))
            .collect()
    }

    fn is_action(&self, action: &str) -> bool {
        BUILTIN_ACTIONS.contains(&action) || self.actions.iter().any(|a| a == action)
    }

    // ------------------------------------------------------------------
    // Update cycle
    // ------------------------------------------------------------------

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ManagerState::Ready
    }

    /// Last committed snapshot, even when a newer update is pending
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.clone()
    }

    fn ready_snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref().filter(|_| self.is_ready())
    }

    /// Evaluate every rule against `doc` and commit the new snapshot
    ///
    /// Fails with [`Error::StaleGeneration`] when `seq` moved past the change
    /// the document was built from; the caller requests a fresh rebuild.
    pub fn update(
        &mut self,
        doc: Document,
        seq: &ChangeSeq,
        window_title: Option<&str>,
    ) -> Result<Arc<Snapshot>> {
        self.state = ManagerState::Evaluating;
        self.auto_action_due = None;

        let (results, page_title) =
            Evaluator::new(&doc, &self.layers, &self.config, window_title).evaluate_all();

        let current = seq.current();
        if current != doc.change_seq() {
            self.state = ManagerState::Stale;
            warn!(
                expected = current,
                found = doc.change_seq(),
                "evaluated a superseded tree"
            );
            return Err(Error::StaleGeneration {
                expected: current,
                found: doc.change_seq(),
            });
        }

        let nodes = doc.node_count();
        let snapshot = Arc::new(Snapshot::new(Arc::new(doc), results, page_title));
        if let Some(zone) = self.zone.as_mut() {
            let (name, layer) = (zone.rule_name.clone(), zone.layer.clone());
            if !zone.update(snapshot.results_by_name(&name, Some(&layer))) {
                debug!(zone = %name, "zone lost");
                self.zone = None;
            }
        }
        debug!(
            generation = snapshot.generation(),
            nodes,
            results = snapshot.results().len(),
            mutated = snapshot.mutated_controls().len(),
            "rules updated"
        );
        self.snapshot = Some(Arc::clone(&snapshot));
        self.state = ManagerState::Ready;
        self.auto_action_due = Some(Instant::now() + self.config.auto_action_delay());
        Ok(snapshot)
    }

    /// Drop every result and all per-page state
    pub fn terminate(&mut self) {
        self.state = ManagerState::Idle;
        self.snapshot = None;
        self.zone = None;
        self.triggered.clear();
        self.last_moveto = None;
        self.auto_action_due = None;
        self.reported_title = None;
    }

    // ------------------------------------------------------------------
    // Auto actions and page title
    // ------------------------------------------------------------------

    /// When the next auto-action sweep is due
    pub fn auto_action_deadline(&self) -> Option<Instant> {
        self.auto_action_due
    }

    /// Sweep results for auto actions whose text changed since last seen
    ///
    /// At most one `moveto` is returned, last, and only for a control seen
    /// for the first time outside the cooldown of its rule.
    pub fn check_auto_action(&mut self, now: Instant) -> Vec<AutoAction> {
        self.auto_action_due = None;
        let Some(snapshot) = self.ready_snapshot().cloned() else {
            return Vec::new();
        };
        let doc = snapshot.doc();
        let prefix = self.config.auto_action_text_prefix;
        let cooldown = self.config.moveto_cooldown();

        let mut actions = Vec::new();
        let mut moveto: Option<AutoAction> = None;
        for result in snapshot.results() {
            let Some(action) = result.properties().text(PropertyKey::AutoAction) else {
                continue;
            };
            let Ok(node) = doc.resolve(result.node) else {
                continue;
            };
            let text: String = doc.text_of(node).chars().take(prefix).collect();
            let last = self.triggered.insert(result.control_id, text.clone());
            if last.as_deref() == Some(text.as_str()) {
                continue;
            }
            if action == MOVETO {
                if last.is_some() || moveto.is_some() {
                    continue;
                }
                let cooling = self.last_moveto.as_ref().is_some_and(|(rule, at)| {
                    rule == result.name() && now.saturating_duration_since(*at) < cooldown
                });
                if cooling {
                    debug!(rule = result.name(), "moveto suppressed during cooldown");
                    continue;
                }
                moveto = Some(AutoAction::new(result, action));
            } else if self.is_action(action) {
                actions.push(AutoAction::new(result, action));
            } else {
                warn!(rule = result.name(), action, "unknown auto action");
            }
        }
        if let Some(moveto) = moveto {
            self.last_moveto = Some((moveto.rule.clone(), now));
            actions.push(moveto);
        }
        actions
    }

    /// The page title when it changed since last reported
    pub fn check_page_title(&mut self) -> Option<String> {
        let title = self.ready_snapshot()?.page_title().to_string();
        if self.reported_title.as_deref() == Some(title.as_str()) {
            return None;
        }
        self.reported_title = Some(title.clone());
        Some(title)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn results(&self) -> &[RuleResult] {
        self.ready_snapshot()
            .map(|s| s.results())
            .unwrap_or_default()
    }

    pub fn results_by_name(&self, name: &str, layer: Option<&str>) -> Vec<RuleResult> {
        self.ready_snapshot()
            .map(|s| s.results_by_name(name, layer).cloned().collect())
            .unwrap_or_default()
    }

    /// Results containing `offset`, innermost first
    pub fn results_at(&self, offset: u32) -> Vec<RuleResult> {
        self.ready_snapshot()
            .map(|s| s.results_at(offset).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn result_at(&self, offset: u32, types: &[RuleType]) -> Option<RuleResult> {
        self.ready_snapshot()?.result_at(offset, types).cloned()
    }

    pub fn mutated_control(&self, control_id: u64) -> Option<&MutatedControl> {
        self.ready_snapshot()?.mutated_control(control_id)
    }

    pub fn iter_mutated_controls(
        &self,
        direction: Direction,
        offset: Option<u32>,
    ) -> Vec<&MutatedControl> {
        self.ready_snapshot()
            .map(|s| s.iter_mutated_controls(direction, offset).collect())
            .unwrap_or_default()
    }

    pub fn page_title(&self) -> Option<&str> {
        self.ready_snapshot().map(|s| s.page_title())
    }

    pub fn page_types(&self) -> &[String] {
        self.ready_snapshot()
            .map(|s| s.page_types())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    pub fn zone(&self) -> Option<&Zone> {
        self.zone.as_ref()
    }

    pub fn clear_zone(&mut self) {
        self.zone = None;
    }

    /// Track the zone for a caret moved onto `result`
    ///
    /// A zone result becomes the active zone; otherwise the innermost zone
    /// enclosing the result does, or none.
    pub fn move_to(&mut self, result: &RuleResult) -> Option<&Zone> {
        let snapshot = self.ready_snapshot()?.clone();
        if result.rule_type() == RuleType::Zone {
            self.zone = snapshot.rank_of(result).map(|rank| Zone::new(result, rank));
            return self.zone.as_ref();
        }
        let enclosing = snapshot
            .results()
            .iter()
            .rev()
            .filter(|r| r.rule_type() == RuleType::Zone)
            .find_map(|r| {
                let zone = Zone::new(r, snapshot.rank_of(r)?);
                zone.contains_result(result).then_some(zone)
            });
        match enclosing {
            Some(zone) if self.zone.as_ref() == Some(&zone) => {}
            other => self.zone = other,
        }
        self.zone.as_ref()
    }

    /// Nearest result after (or before) the caret
    ///
    /// With `cycle`, a failed search is retried from the first (or last)
    /// result.
    pub fn quick_nav(&self, nav: &QuickNav<'_>) -> Option<NavHit> {
        let snapshot = self.ready_snapshot()?;
        let caret = nav.position..nav.position.saturating_add(1);
        let skipped: Vec<Zone> = if nav.honour_skip {
            snapshot
                .results()
                .iter()
                .filter(|r| r.rule_type() == RuleType::Zone && r.properties().flag(PropertyKey::Skip))
                .map(|r| Zone::new(r, r.index))
                .filter(|zone| !zone.contains_range(&caret))
                .collect()
        } else {
            Vec::new()
        };
        let passes: &[bool] = if nav.cycle { &[true, false] } else { &[true] };
        for &relative in passes {
            let mut ordered: Box<dyn Iterator<Item = &RuleResult>> = if nav.previous {
                Box::new(snapshot.results().iter().rev())
            } else {
                Box::new(snapshot.results().iter())
            };
            if let Some(result) = ordered.find(|r| self.accepts(nav, relative, &skipped, r)) {
                return Some(NavHit {
                    result: result.clone(),
                    wrapped: !relative,
                });
            }
        }
        None
    }

    fn accepts(&self, nav: &QuickNav<'_>, relative: bool, skipped: &[Zone], result: &RuleResult) -> bool {
        if !nav.types.is_empty() && !nav.types.contains(&result.rule_type()) {
            return false;
        }
        match nav.name {
            Some(name) if result.name() != name => return false,
            Some(_) => {}
            None if nav.honour_skip => {
                if result.properties().flag(PropertyKey::Skip)
                    || skipped.iter().any(|zone| zone.contains_result(result))
                {
                    return false;
                }
            }
            None => {}
        }
        if relative {
            let ahead = if nav.previous {
                result.start < nav.position
            } else {
                result.start > nav.position
            };
            if !ahead {
                return false;
            }
        }
        if nav.respect_zone || (nav.previous && relative) {
            if let Some(zone) = self.zone.as_ref().filter(|zone| zone.is_valid()) {
                if nav.respect_zone && !zone.contains_result(result) {
                    return false;
                }
                // Never land on the active zone itself
                if zone.rule_name == result.name() && zone.is_at_start(result.start) {
                    return false;
                }
            }
        }
        true
    }

    /// Resolve a gesture to the action of the first result binding it
    ///
    /// Layers are searched from the highest tier down.
    pub fn resolve_gesture(&self, gesture: &str) -> Option<GestureTarget> {
        let results = self.results();
        for layer in self.layers.iter().rev() {
            let hit = results.iter().filter(|r| r.layer() == layer.name).find_map(|r| {
                r.criteria()
                    .gestures
                    .get(gesture)
                    .or_else(|| r.rule().gestures.get(gesture))
                    .map(|action| (r, action))
            });
            if let Some((result, action)) = hit {
                return Some(GestureTarget::Action {
                    result: result.clone(),
                    action: action.clone(),
                });
            }
        }
        self.layers
            .iter()
            .rev()
            .flat_map(|layer| layer.rules().iter())
            .find(|rule| rule.gesture_action(gesture).is_some())
            .map(|rule| GestureTarget::NotFound {
                rule: rule.name.clone(),
                layer: rule.layer.clone(),
            })
    }
}

impl Default for RuleManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
