//! Network analysis: merging wired terminals into nodes and numbering the
//! unknowns of the system.
//!
//! Every element terminal sits on a [`Post`] assigned by the editor; a
//! [`Wire`] joins two posts with zero impedance. The analyzer unions
//! wire-connected posts, numbers the resulting nets deterministically,
//! allocates internal nodes and voltage-source rows, and records the link
//! tables the engine later uses to push solved voltages back out and to
//! aggregate wire currents. Wires never become unknowns of their own.

use indexmap::IndexMap;
use log::debug;

use crate::element::{Element, ElementIndex, Link};
use crate::error::{Error, Result};

/// Editor-assigned connection pad. Terminals sharing a post are joined.
pub type Post = u32;

/// A zero-impedance connector between two posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire {
    pub a: Post,
    pub b: Post,
}

/// An electrical net and the element terminals attached to it.
#[derive(Debug, Clone, Default)]
pub struct CircuitNode {
    pub links: Vec<Link>,
}

/// Maps a voltage-source row back to its owning element.
#[derive(Debug, Clone, Copy)]
pub struct SourceRecord {
    pub element: ElementIndex,
    /// Element-local source index.
    pub source: usize,
}

/// Display bookkeeping for one wire: the links at its first endpoint.
/// The wire's current is the signed sum of element currents there.
#[derive(Debug, Clone)]
pub struct WireInfo {
    pub node: usize,
    pub links: Vec<Link>,
}

/// Result of network analysis, consumed by the engine.
#[derive(Debug, Default)]
pub struct Analysis {
    /// Index is the node number; `nodes[0]` is ground.
    pub nodes: Vec<CircuitNode>,
    /// Voltage-source rows in assignment order.
    pub sources: Vec<SourceRecord>,
    /// Per-wire display bookkeeping, aligned with the input wire list.
    pub wires: Vec<WireInfo>,
}

impl Analysis {
    /// Non-ground node count, internal nodes included.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Union-find over dense post indices plus one synthetic ground slot.
#[derive(Debug)]
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Walk the placed elements and wires, merge electrically-identical posts,
/// and assign every independent unknown its index.
///
/// On success every element has been told its node numbers
/// ([`Element::set_node`]), its voltage-source rows
/// ([`Element::set_voltage_source`]) and whether it lacks an external
/// return path ([`Element::set_broken`]).
pub fn analyze(
    elements: &mut [Box<dyn Element>],
    posts: &[Vec<Post>],
    wires: &[Wire],
) -> Result<Analysis> {
    if elements.len() != posts.len() {
        return Err(Error::InvalidCircuit(format!(
            "{} elements but {} post lists",
            elements.len(),
            posts.len()
        )));
    }

    // Dense index per post, in deterministic first-seen order.
    let mut ids: IndexMap<Post, usize> = IndexMap::new();
    for (e, plist) in posts.iter().enumerate() {
        if plist.len() != elements[e].term_count() {
            return Err(Error::InvalidCircuit(format!(
                "element {} has {} posts for {} terminals",
                e,
                plist.len(),
                elements[e].term_count()
            )));
        }
        for &p in plist {
            if !ids.contains_key(&p) {
                ids.insert(p, ids.len());
            }
        }
    }
    for w in wires {
        for p in [w.a, w.b] {
            if !ids.contains_key(&p) {
                ids.insert(p, ids.len());
            }
        }
    }

    let mut sets = DisjointSets::new(ids.len());
    for w in wires {
        sets.union(ids[&w.a], ids[&w.b]);
    }

    // Number nets in first-seen order; node 0 stays the ground reference.
    let mut node_of_root: IndexMap<usize, usize> = IndexMap::new();
    let mut nodes: Vec<CircuitNode> = vec![CircuitNode::default()];
    let mut post_links: IndexMap<Post, Vec<Link>> = IndexMap::new();
    for e in 0..elements.len() {
        for t in 0..elements[e].term_count() {
            let post = posts[e][t];
            let root = sets.find(ids[&post]);
            let node = match node_of_root.get(&root) {
                Some(&n) => n,
                None => {
                    nodes.push(CircuitNode::default());
                    let n = nodes.len() - 1;
                    node_of_root.insert(root, n);
                    n
                }
            };
            elements[e].set_node(t, node);
            let link = Link {
                element: e,
                terminal: t,
            };
            nodes[node].links.push(link);
            post_links.entry(post).or_default().push(link);
        }
    }

    // Internal nodes come after all terminal nets.
    for e in 0..elements.len() {
        let base = elements[e].term_count();
        for j in 0..elements[e].internal_node_count() {
            nodes.push(CircuitNode {
                links: vec![Link {
                    element: e,
                    terminal: base + j,
                }],
            });
            elements[e].set_node(base + j, nodes.len() - 1);
        }
    }

    // Voltage-source rows follow the node rows.
    let mut sources = Vec::new();
    for e in 0..elements.len() {
        for s in 0..elements[e].voltage_source_count() {
            elements[e].set_voltage_source(s, sources.len());
            sources.push(SourceRecord { element: e, source: s });
        }
    }

    let wire_infos = wires
        .iter()
        .map(|w| {
            let root = sets.find(ids[&w.a]);
            WireInfo {
                node: node_of_root.get(&root).copied().unwrap_or(0),
                links: post_links.get(&w.a).cloned().unwrap_or_default(),
            }
        })
        .collect();

    // Elements that provide no path between a pair of their own terminals
    // (ideal current sources) need an external return path; without one
    // they must fall back to safe stamping.
    for e in 0..elements.len() {
        let tc = elements[e].term_count();
        let mut broken = false;
        'pairs: for t1 in 0..tc {
            for t2 in t1 + 1..tc {
                if !elements[e].has_connection(t1, t2) {
                    let n1 = elements[e].node(t1);
                    let n2 = elements[e].node(t2);
                    if !path_exists(elements, e, n1, n2, &nodes) {
                        broken = true;
                        break 'pairs;
                    }
                }
            }
        }
        elements[e].set_broken(broken);
        if broken {
            debug!("element {e} has no return path; safe stamping enabled");
        }
    }

    debug!(
        "analyzed circuit: {} elements, {} nodes, {} source rows, {} wires",
        elements.len(),
        nodes.len() - 1,
        sources.len(),
        wires.len()
    );

    Ok(Analysis {
        nodes,
        sources,
        wires: wire_infos,
    })
}

/// Breadth-first search for a current path between two nodes through every
/// element except `skip`. Ground (node 0) joins everything an element
/// reports a ground connection for.
fn path_exists(
    elements: &[Box<dyn Element>],
    skip: ElementIndex,
    from: usize,
    to: usize,
    nodes: &[CircuitNode],
) -> bool {
    if from == to {
        return true;
    }
    let mut visited = vec![false; nodes.len()];
    let mut queue = vec![from];
    visited[from] = true;
    while let Some(n) = queue.pop() {
        if n == to {
            return true;
        }
        let push = |visited: &mut Vec<bool>, queue: &mut Vec<usize>, next: usize| {
            if !visited[next] {
                visited[next] = true;
                queue.push(next);
            }
        };
        if n == 0 {
            // Entering through ground: any ground-connected terminal.
            for (e, elm) in elements.iter().enumerate() {
                if e == skip {
                    continue;
                }
                for t in 0..elm.term_count() {
                    if elm.has_ground_connection(t) {
                        push(&mut visited, &mut queue, elm.node(t));
                    }
                }
            }
            continue;
        }
        for link in &nodes[n].links {
            if link.element == skip {
                continue;
            }
            let elm = &elements[link.element];
            if elm.has_ground_connection(link.terminal) {
                push(&mut visited, &mut queue, 0);
            }
            for t in 0..elm.term_count() {
                if t != link.terminal && elm.has_connection(link.terminal, t) {
                    push(&mut visited, &mut queue, elm.node(t));
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::LinearSystem;

    /// Minimal two-terminal test element with configurable connectivity.
    #[derive(Debug)]
    struct Stub {
        nodes: Vec<usize>,
        sources: usize,
        rows: Vec<usize>,
        connected: bool,
        grounds: bool,
        broken: bool,
    }

    impl Stub {
        fn new() -> Self {
            Self {
                nodes: vec![0; 2],
                sources: 0,
                rows: Vec::new(),
                connected: true,
                grounds: false,
                broken: false,
            }
        }

        fn source() -> Self {
            Self {
                sources: 1,
                rows: vec![0],
                ..Self::new()
            }
        }

        fn isolated() -> Self {
            Self {
                connected: false,
                ..Self::new()
            }
        }

        fn grounded() -> Self {
            Self {
                grounds: true,
                ..Self::new()
            }
        }
    }

    impl Element for Stub {
        fn term_count(&self) -> usize {
            2
        }
        fn voltage_source_count(&self) -> usize {
            self.sources
        }
        fn set_node(&mut self, index: usize, node: usize) {
            self.nodes[index] = node;
        }
        fn node(&self, index: usize) -> usize {
            self.nodes[index]
        }
        fn set_voltage_source(&mut self, source: usize, row: usize) {
            self.rows[source] = row;
        }
        fn stamp(&mut self, _sys: &mut LinearSystem) {}
        fn set_voltage(&mut self, _index: usize, _volts: f64) {}
        fn voltage(&self, _index: usize) -> f64 {
            0.0
        }
        fn current(&self, _terminal: usize) -> f64 {
            0.0
        }
        fn has_connection(&self, _t1: usize, _t2: usize) -> bool {
            self.connected
        }
        fn has_ground_connection(&self, _terminal: usize) -> bool {
            self.grounds
        }
        fn set_broken(&mut self, broken: bool) {
            self.broken = broken;
        }
    }

    fn boxed(stubs: Vec<Stub>) -> Vec<Box<dyn Element>> {
        stubs.into_iter().map(|s| Box::new(s) as Box<dyn Element>).collect()
    }

    #[test]
    fn test_wire_merges_posts() {
        let mut elements = boxed(vec![Stub::new(), Stub::new()]);
        let posts = vec![vec![1, 2], vec![3, 4]];
        let wires = vec![Wire { a: 2, b: 3 }];

        let analysis = analyze(&mut elements, &posts, &wires).unwrap();

        assert_eq!(analysis.num_nodes(), 3);
        assert_eq!(elements[0].node(1), elements[1].node(0));
        // Wire endpoint a carries element 0's second terminal.
        assert_eq!(
            analysis.wires[0].links,
            vec![Link {
                element: 0,
                terminal: 1
            }]
        );
    }

    #[test]
    fn test_source_rows_sequential() {
        let mut elements = boxed(vec![Stub::source(), Stub::new(), Stub::source()]);
        let posts = vec![vec![1, 2], vec![2, 3], vec![3, 1]];

        let analysis = analyze(&mut elements, &posts, &[]).unwrap();

        assert_eq!(analysis.sources.len(), 2);
        assert_eq!(analysis.sources[0].element, 0);
        assert_eq!(analysis.sources[1].element, 2);
    }

    #[test]
    fn test_isolated_current_source_is_broken() {
        let mut elements = boxed(vec![Stub::isolated()]);
        let posts = vec![vec![1, 2]];

        analyze(&mut elements, &posts, &[]).unwrap();

        let dbg = format!("{:?}", elements[0]);
        assert!(dbg.contains("broken: true"), "{dbg}");
    }

    #[test]
    fn test_current_source_with_return_path_is_not_broken() {
        let mut elements = boxed(vec![Stub::isolated(), Stub::new()]);
        let posts = vec![vec![1, 2], vec![1, 2]];

        analyze(&mut elements, &posts, &[]).unwrap();

        let dbg = format!("{:?}", elements[0]);
        assert!(dbg.contains("broken: false"), "{dbg}");
    }

    #[test]
    fn test_ground_connections_count_as_path() {
        // Two grounded elements give the current source a return path
        // through ground even though its terminals share no net.
        let mut elements = boxed(vec![Stub::isolated(), Stub::grounded(), Stub::grounded()]);
        let posts = vec![vec![1, 2], vec![1, 3], vec![2, 4]];

        analyze(&mut elements, &posts, &[]).unwrap();

        let dbg = format!("{:?}", elements[0]);
        assert!(dbg.contains("broken: false"), "{dbg}");
    }

    #[test]
    fn test_post_count_mismatch_is_fatal() {
        let mut elements = boxed(vec![Stub::new()]);
        let posts = vec![vec![1]];

        let err = analyze(&mut elements, &posts, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidCircuit(_)));
    }
}
