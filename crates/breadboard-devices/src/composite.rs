//! A nested network of devices behind a single element.
//!
//! A composite is built from a [`CompositeModel`]: a small netlist of parts
//! wired by model-local node ids, plus the ordered list of local nodes
//! exposed as external terminals. Internally every local node becomes a
//! slot — external slots first, in the declared order, then the remaining
//! local nodes in first-seen order, then one extra slot per child internal
//! node. The parent analyzer numbers those slots like any other element's
//! terminals and internal nodes, so the composite solves identically to
//! the flattened equivalent circuit.

use indexmap::IndexMap;
use log::debug;

use breadboard_core::{
    Element, Error, LinearSystem, Link, Persist, Result, SourceRecord, StepInfo, TokenReader,
    TokenWriter,
};

use crate::device_from_tokens;

/// One internal device of a composite: its persisted kind tag, the
/// model-local node per terminal, and its parameter record.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositePart {
    pub kind: String,
    pub nodes: Vec<usize>,
    pub params: String,
}

/// Description a [`Composite`] is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeModel {
    /// Local nodes exposed as terminals, in terminal order.
    pub external: Vec<usize>,
    pub parts: Vec<CompositePart>,
}

impl CompositeModel {
    pub fn new(external: &[usize]) -> Self {
        Self {
            external: external.to_vec(),
            parts: Vec::new(),
        }
    }

    /// Add a part by kind tag, local nodes and parameter record.
    pub fn with_part(mut self, kind: &str, nodes: &[usize], params: &str) -> Self {
        self.parts.push(CompositePart {
            kind: kind.into(),
            nodes: nodes.to_vec(),
            params: params.into(),
        });
        self
    }
}

/// An element implemented as an internal sub-network.
#[derive(Debug)]
pub struct Composite {
    model: CompositeModel,
    children: Vec<Box<dyn Element>>,
    /// Child terminals riding on each slot. `Link::element` indexes
    /// `children`, not the parent arena.
    links: Vec<Vec<Link>>,
    /// Slot per child terminal/internal index, the reverse of `links`.
    child_slots: Vec<Vec<usize>>,
    /// Child voltage sources in enumeration order.
    sources: Vec<SourceRecord>,
    nodes: Vec<usize>,
    volts: Vec<f64>,
}

impl Composite {
    /// Build the sub-network described by `model`.
    ///
    /// Fails if a part's kind or parameters are malformed, a part lists
    /// the wrong number of nodes, or an external node never appears among
    /// the parts — a composite must not come up partially wired.
    pub fn new(model: CompositeModel) -> Result<Self> {
        let mut children: Vec<Box<dyn Element>> = Vec::with_capacity(model.parts.len());
        for part in &model.parts {
            let mut r = TokenReader::new(&part.params);
            let child = device_from_tokens(&part.kind, &mut r)?;
            r.expect_end()?;
            if part.nodes.len() != child.term_count() {
                return Err(Error::InvalidCircuit(format!(
                    "part '{}' lists {} nodes for {} terminals",
                    part.kind,
                    part.nodes.len(),
                    child.term_count()
                )));
            }
            children.push(child);
        }

        let mut slot_of: IndexMap<usize, usize> = IndexMap::new();
        for &ext in &model.external {
            if slot_of.insert(ext, slot_of.len()).is_some() {
                return Err(Error::InvalidCircuit(format!(
                    "external node {ext} listed twice"
                )));
            }
        }

        let mut links: Vec<Vec<Link>> = vec![Vec::new(); slot_of.len()];
        let mut child_slots: Vec<Vec<usize>> = Vec::with_capacity(children.len());
        for (c, part) in model.parts.iter().enumerate() {
            let mut slots = Vec::with_capacity(part.nodes.len());
            for (t, &local) in part.nodes.iter().enumerate() {
                let slot = match slot_of.get(&local) {
                    Some(&s) => s,
                    None => {
                        let s = links.len();
                        slot_of.insert(local, s);
                        links.push(Vec::new());
                        s
                    }
                };
                links[slot].push(Link {
                    element: c,
                    terminal: t,
                });
                slots.push(slot);
            }
            child_slots.push(slots);
        }

        for (i, &ext) in model.external.iter().enumerate() {
            if links[i].is_empty() {
                return Err(Error::NodeNotFound(format!(
                    "external node {ext} does not appear in any part"
                )));
            }
        }

        // Child internal nodes get slots of their own after all the
        // model's nodes.
        for (c, child) in children.iter().enumerate() {
            let base = child.term_count();
            for j in 0..child.internal_node_count() {
                let s = links.len();
                links.push(vec![Link {
                    element: c,
                    terminal: base + j,
                }]);
                child_slots[c].push(s);
            }
        }

        let mut sources = Vec::new();
        for (c, child) in children.iter().enumerate() {
            for s in 0..child.voltage_source_count() {
                sources.push(SourceRecord {
                    element: c,
                    source: s,
                });
            }
        }

        // A composite is frequently probed with only some terminals
        // connected, so children whose terminals have no internal path
        // (ideal current sources) always use the safe stamp.
        for child in &mut children {
            let tc = child.term_count();
            let isolated =
                (0..tc).any(|t1| (t1 + 1..tc).any(|t2| !child.has_connection(t1, t2)));
            if isolated {
                child.set_broken(true);
            }
        }

        debug!(
            "composite: {} parts, {} terminals, {} internal slots, {} source rows",
            children.len(),
            model.external.len(),
            links.len() - model.external.len(),
            sources.len()
        );

        let slot_count = links.len();
        Ok(Self {
            model,
            children,
            links,
            child_slots,
            sources,
            nodes: vec![0; slot_count],
            volts: vec![0.0; slot_count],
        })
    }

    /// The description this composite was built from.
    pub fn model(&self) -> &CompositeModel {
        &self.model
    }

    /// Slots with a current path from `from`, through the children.
    fn reachable_slots(&self, from: usize) -> Vec<bool> {
        let mut visited = vec![false; self.links.len()];
        let mut queue = vec![from];
        visited[from] = true;
        while let Some(slot) = queue.pop() {
            for link in &self.links[slot] {
                let child = &self.children[link.element];
                if link.terminal >= child.term_count() {
                    continue;
                }
                for t in 0..child.term_count() {
                    let next = self.child_slots[link.element][t];
                    if !visited[next]
                        && t != link.terminal
                        && child.has_connection(link.terminal, t)
                    {
                        visited[next] = true;
                        queue.push(next);
                    }
                }
            }
        }
        visited
    }
}

impl Element for Composite {
    fn term_count(&self) -> usize {
        self.model.external.len()
    }

    fn voltage_source_count(&self) -> usize {
        self.sources.len()
    }

    fn internal_node_count(&self) -> usize {
        self.links.len() - self.model.external.len()
    }

    fn nonlinear(&self) -> bool {
        self.children.iter().any(|c| c.nonlinear())
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.nodes[index] = node;
        for link in &self.links[index] {
            self.children[link.element].set_node(link.terminal, node);
        }
    }

    fn node(&self, index: usize) -> usize {
        self.nodes[index]
    }

    fn set_voltage_source(&mut self, source: usize, row: usize) {
        let rec = self.sources[source];
        self.children[rec.element].set_voltage_source(rec.source, row);
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        for child in &mut self.children {
            child.stamp(sys);
        }
    }

    fn start_iteration(&mut self, step: &StepInfo) {
        for child in &mut self.children {
            child.start_iteration(step);
        }
    }

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        for child in &mut self.children {
            child.do_iteration(sys);
        }
    }

    fn finish_iteration(&mut self, step: &StepInfo) {
        for child in &mut self.children {
            child.finish_iteration(step);
        }
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.volts[index] = volts;
        for link in &self.links[index] {
            self.children[link.element].set_voltage(link.terminal, volts);
        }
    }

    fn voltage(&self, index: usize) -> f64 {
        self.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        self.links[terminal]
            .iter()
            .map(|link| self.children[link.element].current(link.terminal))
            .sum()
    }

    fn set_current(&mut self, source: usize, amps: f64) {
        let rec = self.sources[source];
        self.children[rec.element].set_current(rec.source, amps);
    }

    fn has_connection(&self, t1: usize, t2: usize) -> bool {
        t1 == t2 || self.reachable_slots(t1)[t2]
    }

    fn has_ground_connection(&self, terminal: usize) -> bool {
        let reach = self.reachable_slots(terminal);
        self.links.iter().enumerate().any(|(slot, links)| {
            reach[slot]
                && links.iter().any(|l| {
                    let child = &self.children[l.element];
                    l.terminal < child.term_count() && child.has_ground_connection(l.terminal)
                })
        })
    }

    fn set_broken(&mut self, broken: bool) {
        // Children built with the safe stamp stay safe; only propagate a
        // parent-level loss of return path.
        if broken {
            for child in &mut self.children {
                child.set_broken(true);
            }
        }
    }
}

impl Persist for Composite {
    fn kind(&self) -> &'static str {
        "composite"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_int(self.model.external.len() as i64);
        for &e in &self.model.external {
            w.push_int(e as i64);
        }
        w.push_int(self.model.parts.len() as i64);
        for part in &self.model.parts {
            w.push_token(&part.kind);
            w.push_int(part.nodes.len() as i64);
            for &n in &part.nodes {
                w.push_int(n as i64);
            }
            w.push_str(&part.params);
        }
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        let mut model = CompositeModel::default();
        for _ in 0..r.int()? {
            model.external.push(r.int()? as usize);
        }
        for _ in 0..r.int()? {
            let kind = r.next_token()?.to_string();
            let mut nodes = Vec::new();
            for _ in 0..r.int()? {
                nodes.push(r.int()? as usize);
            }
            let params = r.string()?;
            model.parts.push(CompositePart { kind, nodes, params });
        }
        Self::new(model)
    }
}
