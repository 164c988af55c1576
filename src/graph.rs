//! The dependency tree data model and tree-bank text import/export.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::errors::{Result, RudepError};

/// Coarse tag of the synthetic root node and relation of words attached to it.
pub const ROOT: &str = "root";

/// Placeholder written for unset fields in tree-bank text.
const UNSET: &str = "_";

/// One token of a sentence, or the synthetic root.
///
/// `id` is the 1-based position in the sentence; id 0 is the root. All other
/// fields are optional while a tree is under construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    /// Position in the sentence; 0 for the synthetic root.
    pub id: usize,
    /// Surface form.
    pub form: Option<String>,
    /// Lemma.
    pub lemma: Option<String>,
    /// Coarse part-of-speech tag.
    pub coarse_tag: Option<String>,
    /// Fine part-of-speech tag.
    pub tag: Option<String>,
    /// Morphological features.
    pub feats: Option<String>,
    /// Id of this node's head, once attached.
    pub head: Option<usize>,
    /// Relation to the head.
    pub relation: Option<String>,
    /// Children grouped by their relation; derived, rebuilt on mutation.
    pub deps: BTreeMap<String, Vec<usize>>,
    /// Trailing miscellaneous column of the 10-column layout.
    pub misc: Option<String>,
}

impl Node {
    /// Creates the synthetic root node.
    #[must_use]
    pub fn root() -> Self {
        Self {
            id: 0,
            coarse_tag: Some(ROOT.to_string()),
            ..Self::default()
        }
    }
}

/// The supported tree-bank column layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnLayout {
    /// `form tag head`
    Three,
    /// `form tag head relation`
    Four,
    /// `id form lemma coarse_tag tag feats head relation deps misc`
    Ten,
}

impl ColumnLayout {
    fn from_count(count: usize) -> Option<Self> {
        match count {
            3 => Some(Self::Three),
            4 => Some(Self::Four),
            10 => Some(Self::Ten),
            _ => None,
        }
    }
}

/// An ordered arena of [`Node`]s with a derived child index.
///
/// The root occupies index 0; word nodes follow in sentence order. Structure
/// is only ever changed through [`DependencyGraph::update_dependency`], which
/// keeps the child index consistent with the `head` fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    children: Vec<BTreeSet<usize>>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    /// Creates a graph holding only the synthetic root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
            children: vec![BTreeSet::new()],
        }
    }

    /// Builds an unattached graph from tagged tokens.
    ///
    /// # Errors
    ///
    /// [`RudepError::InvalidArgument`] when `words` and `tags` differ in
    /// length.
    pub fn from_tokens<S, T>(words: &[S], tags: &[T]) -> Result<Self>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        if words.len() != tags.len() {
            return Err(RudepError::invalid_argument(
                "words and tags must have equal length",
            ));
        }
        let mut graph = Self::new();
        for (i, (word, tag)) in words.iter().zip(tags).enumerate() {
            graph.nodes.push(Node {
                id: i + 1,
                form: Some(word.as_ref().to_string()),
                coarse_tag: Some(tag.as_ref().to_string()),
                ..Node::default()
            });
            graph.children.push(BTreeSet::new());
        }
        Ok(graph)
    }

    /// Parses one sentence block of whitespace-separated columns.
    ///
    /// The column count of the first line decides the layout; every line must
    /// agree with it.
    ///
    /// # Errors
    ///
    /// [`RudepError::Format`] on an unknown or mixed column count, a
    /// non-numeric, out-of-range, or self-referential head, or a tree in
    /// which nothing depends on the root.
    pub fn from_text(text: &str) -> Result<Self> {
        Self::parse_block(text, None)
    }

    /// Like [`DependencyGraph::from_text`] with an explicit cell separator.
    ///
    /// # Errors
    ///
    /// See [`DependencyGraph::from_text`].
    pub fn from_text_separated(text: &str, separator: char) -> Result<Self> {
        Self::parse_block(text, Some(separator))
    }

    fn parse_block(text: &str, separator: Option<char>) -> Result<Self> {
        let mut graph = Self::new();
        let mut expected = None;
        let lines = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty());
        for (index, line) in lines.enumerate() {
            let id = index + 1;
            let cells: Vec<&str> = match separator {
                Some(sep) => line.split(sep).collect(),
                None => line.split_whitespace().collect(),
            };
            let layout = match expected {
                None => {
                    let layout = ColumnLayout::from_count(cells.len()).ok_or_else(|| {
                        RudepError::format(
                            id,
                            format!("{} columns are not a supported layout", cells.len()),
                        )
                    })?;
                    expected = Some(layout);
                    layout
                }
                Some(layout) => {
                    let count = match layout {
                        ColumnLayout::Three => 3,
                        ColumnLayout::Four => 4,
                        ColumnLayout::Ten => 10,
                    };
                    if cells.len() != count {
                        return Err(RudepError::format(
                            id,
                            format!("expected {count} columns, found {}", cells.len()),
                        ));
                    }
                    layout
                }
            };
            let node = Self::node_from_cells(id, layout, &cells)?;
            graph.nodes.push(node);
            graph.children.push(BTreeSet::new());
        }

        if graph.nodes.len() == 1 {
            return Err(RudepError::format(0, "empty sentence block"));
        }
        let len = graph.nodes.len();
        let mut has_root_dependent = false;
        for node in &graph.nodes[1..] {
            // Heads were range-checked per line except against the final
            // node count, which is only known now.
            match node.head {
                Some(head) if head >= len => {
                    return Err(RudepError::format(
                        node.id,
                        format!("head {head} references a missing node"),
                    ));
                }
                Some(0) => has_root_dependent = true,
                _ => {}
            }
        }
        if !has_root_dependent {
            return Err(RudepError::format(0, "no node depends on the root"));
        }
        graph.rebuild_children();
        Ok(graph)
    }

    fn node_from_cells(id: usize, layout: ColumnLayout, cells: &[&str]) -> Result<Node> {
        let parse_head = |cell: &str| -> Result<usize> {
            let head = cell.parse::<usize>().map_err(|_| {
                RudepError::format(id, format!("head column `{cell}` is not a node id"))
            })?;
            if head == id {
                return Err(RudepError::format(id, "node names itself as its head"));
            }
            Ok(head)
        };
        let field = |cell: &str| -> Option<String> {
            (cell != UNSET).then(|| cell.to_string())
        };
        let relation = |cell: &str| -> Option<String> {
            if cell.eq_ignore_ascii_case(ROOT) {
                Some(ROOT.to_string())
            } else {
                field(cell)
            }
        };

        let mut node = Node {
            id,
            ..Node::default()
        };
        match layout {
            ColumnLayout::Three => {
                let head = parse_head(cells[2])?;
                node.form = field(cells[0]);
                node.coarse_tag = field(cells[1]);
                node.tag = field(cells[1]);
                node.head = Some(head);
                if head == 0 {
                    node.relation = Some(ROOT.to_string());
                }
            }
            ColumnLayout::Four => {
                let head = parse_head(cells[2])?;
                node.form = field(cells[0]);
                node.coarse_tag = field(cells[1]);
                node.tag = field(cells[1]);
                node.head = Some(head);
                node.relation = relation(cells[3]);
            }
            ColumnLayout::Ten => {
                // The leading id column is ignored; ids come from line order.
                let head = parse_head(cells[6])?;
                node.form = field(cells[1]);
                node.lemma = field(cells[2]);
                node.coarse_tag = field(cells[3]);
                node.tag = field(cells[4]);
                node.feats = field(cells[5]);
                node.head = Some(head);
                node.relation = relation(cells[7]);
            }
        }
        Ok(node)
    }

    /// Serializes the graph, one line per word node, `_` for unset fields.
    #[must_use]
    pub fn to_text(&self, layout: ColumnLayout) -> String {
        fn cell(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or(UNSET)
        }
        let head_cell = |head: Option<usize>| -> String {
            head.map_or_else(|| UNSET.to_string(), |h| h.to_string())
        };
        let mut out = String::new();
        for node in &self.nodes[1..] {
            match layout {
                ColumnLayout::Three => {
                    out.push_str(&format!(
                        "{}\t{}\t{}\n",
                        cell(&node.form),
                        cell(&node.coarse_tag),
                        head_cell(node.head),
                    ));
                }
                ColumnLayout::Four => {
                    out.push_str(&format!(
                        "{}\t{}\t{}\t{}\n",
                        cell(&node.form),
                        cell(&node.coarse_tag),
                        head_cell(node.head),
                        cell(&node.relation),
                    ));
                }
                ColumnLayout::Ten => {
                    out.push_str(&format!(
                        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                        node.id,
                        cell(&node.form),
                        cell(&node.lemma),
                        cell(&node.coarse_tag),
                        cell(&node.tag),
                        cell(&node.feats),
                        head_cell(node.head),
                        cell(&node.relation),
                        UNSET,
                        cell(&node.misc),
                    ));
                }
            }
        }
        out
    }

    /// Loads a tree-bank file: sentence blocks separated by blank lines.
    ///
    /// # Errors
    ///
    /// [`RudepError::Io`] on file errors, [`RudepError::Format`] on the first
    /// malformed block.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let text = fs::read_to_string(path)?;
        text.trim()
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(Self::from_text)
            .collect()
    }

    /// Writes graphs as a tree-bank file, blank lines between sentences.
    ///
    /// # Errors
    ///
    /// [`RudepError::Io`] on file errors.
    pub fn save(path: impl AsRef<Path>, graphs: &[Self], layout: ColumnLayout) -> Result<()> {
        let text: Vec<String> = graphs.iter().map(|g| g.to_text(layout)).collect();
        fs::write(path, text.join("\n"))?;
        Ok(())
    }

    /// All nodes in id order, root first.
    #[inline(always)]
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The node with the given id.
    #[inline(always)]
    #[must_use]
    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of nodes, the root included.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the graph holds nothing but the root.
    #[inline(always)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Ids of the nodes attached to `id`.
    #[must_use]
    pub fn children_of(&self, id: usize) -> Option<&BTreeSet<usize>> {
        self.children.get(id)
    }

    /// Reassigns the head of `child` and refreshes the derived indexes.
    ///
    /// Attachment to the root also sets the `root` relation.
    ///
    /// # Errors
    ///
    /// [`RudepError::InvalidArgument`] when either id is out of range, the
    /// child is the root, or the node would become its own head.
    pub fn update_dependency(&mut self, head: usize, child: usize) -> Result<()> {
        if child == 0 || child >= self.nodes.len() {
            return Err(RudepError::invalid_argument("child id out of range"));
        }
        if head >= self.nodes.len() {
            return Err(RudepError::invalid_argument("head id out of range"));
        }
        if head == child {
            return Err(RudepError::invalid_argument("a node cannot head itself"));
        }
        self.nodes[child].head = Some(head);
        if head == 0 {
            self.nodes[child].relation = Some(ROOT.to_string());
        }
        self.rebuild_children();
        Ok(())
    }

    /// Drops every attachment, keeping the nodes.
    pub fn remove_dependencies(&mut self) {
        for node in &mut self.nodes[1..] {
            node.head = None;
            node.relation = None;
        }
        self.rebuild_children();
    }

    /// Rebuilds the child index and the per-node relation maps from the
    /// `head` fields.
    fn rebuild_children(&mut self) {
        for set in &mut self.children {
            set.clear();
        }
        for node in &mut self.nodes {
            node.deps.clear();
        }
        for id in 1..self.nodes.len() {
            let Some(head) = self.nodes[id].head else {
                continue;
            };
            if head >= self.nodes.len() {
                continue;
            }
            let relation = self.nodes[id].relation.clone().unwrap_or_default();
            self.children[head].insert(id);
            self.nodes[head].deps.entry(relation).or_default().push(id);
        }
    }

    /// The words and coarse tags of the sentence, root excluded.
    #[must_use]
    pub fn pos_sequence(&self) -> (Vec<String>, Vec<String>) {
        let words = self.nodes[1..]
            .iter()
            .map(|n| n.form.clone().unwrap_or_default())
            .collect();
        let tags = self.nodes[1..]
            .iter()
            .map(|n| n.coarse_tag.clone().unwrap_or_default())
            .collect();
        (words, tags)
    }

    /// `true` when following head links from some node revisits it.
    ///
    /// A finished parse is acyclic by construction; this is a validation aid
    /// for hand-built or imported graphs.
    #[must_use]
    pub fn contains_cycle(&self) -> bool {
        for start in 1..self.nodes.len() {
            let mut current = start;
            for _ in 0..self.nodes.len() {
                match self.nodes[current].head {
                    Some(head) if head == start => return true,
                    Some(head) if head < self.nodes.len() => current = head,
                    _ => break,
                }
            }
        }
        false
    }

    /// A Graphviz rendering of the tree.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph G{\n");
        out.push_str("edge [dir=forward]\n");
        out.push_str("node [shape=plaintext]\n");
        for node in &self.nodes {
            out.push_str(&format!(
                "\n{} [label=\"{} ({})\"]",
                node.id,
                node.id,
                node.form.as_deref().unwrap_or(UNSET),
            ));
        }
        for node in &self.nodes[1..] {
            if let Some(head) = node.head {
                match &node.relation {
                    Some(rel) => {
                        out.push_str(&format!("\n{} -> {} [label=\"{}\"]", head, node.id, rel));
                    }
                    None => out.push_str(&format!("\n{} -> {}", head, node.id)),
                }
            }
        }
        out.push_str("\n}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_COL: &str = "Dog\tNOUN\t2\nsees\tVERB\t0\ncat\tNOUN\t2\n";

    const TEN_COL: &str = "\
1\tDog\tdog\tNOUN\tNN\t_\t2\tnsubj\t_\t_
2\tsees\tsee\tVERB\tVBZ\t_\t0\troot\t_\t_
3\tcat\tcat\tNOUN\tNN\t_\t2\tdobj\t_\t_
";

    #[test]
    fn test_parse_three_columns() {
        let graph = DependencyGraph::from_text(THREE_COL).unwrap();
        assert_eq!(graph.len(), 4);
        let sees = graph.node(2).unwrap();
        assert_eq!(sees.form.as_deref(), Some("sees"));
        assert_eq!(sees.head, Some(0));
        assert_eq!(sees.relation.as_deref(), Some("root"));
        let dog = graph.node(1).unwrap();
        assert_eq!(dog.head, Some(2));
        assert_eq!(dog.relation, None);
        let children: Vec<usize> = graph.children_of(2).unwrap().iter().copied().collect();
        assert_eq!(children, vec![1, 3]);
    }

    #[test]
    fn test_parse_ten_columns() {
        let graph = DependencyGraph::from_text(TEN_COL).unwrap();
        let dog = graph.node(1).unwrap();
        assert_eq!(dog.lemma.as_deref(), Some("dog"));
        assert_eq!(dog.coarse_tag.as_deref(), Some("NOUN"));
        assert_eq!(dog.tag.as_deref(), Some("NN"));
        assert_eq!(dog.feats, None);
        assert_eq!(dog.relation.as_deref(), Some("nsubj"));
    }

    #[test]
    fn test_mixed_column_counts_rejected() {
        let text = "Dog\tNOUN\t2\nsees\tVERB\t0\tpred\n";
        match DependencyGraph::from_text(text) {
            Err(RudepError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_column_count_rejected() {
        assert!(matches!(
            DependencyGraph::from_text("only two\n"),
            Err(RudepError::Format { .. })
        ));
    }

    #[test]
    fn test_head_must_be_numeric_and_in_range() {
        assert!(matches!(
            DependencyGraph::from_text("Dog\tNOUN\tx\n"),
            Err(RudepError::Format { .. })
        ));
        assert!(matches!(
            DependencyGraph::from_text("Dog\tNOUN\t7\nsees\tVERB\t0\n"),
            Err(RudepError::Format { .. })
        ));
        assert!(matches!(
            DependencyGraph::from_text("Dog\tNOUN\t1\nsees\tVERB\t0\n"),
            Err(RudepError::Format { .. })
        ));
    }

    #[test]
    fn test_tree_without_root_dependent_rejected() {
        assert!(matches!(
            DependencyGraph::from_text("Dog\tNOUN\t2\nsees\tVERB\t1\n"),
            Err(RudepError::Format { .. })
        ));
    }

    #[test]
    fn test_round_trip_three_four_ten() {
        for (text, layout) in [
            (THREE_COL, ColumnLayout::Three),
            (TEN_COL, ColumnLayout::Ten),
        ] {
            let graph = DependencyGraph::from_text(text).unwrap();
            let reparsed = DependencyGraph::from_text(&graph.to_text(layout)).unwrap();
            for (a, b) in graph.nodes().iter().zip(reparsed.nodes()) {
                assert_eq!(a.form, b.form);
                assert_eq!(a.coarse_tag, b.coarse_tag);
                assert_eq!(a.head, b.head);
            }
        }
        let graph = DependencyGraph::from_text(THREE_COL).unwrap();
        let four = DependencyGraph::from_text(&graph.to_text(ColumnLayout::Four)).unwrap();
        assert_eq!(graph, four);
    }

    #[test]
    fn test_from_tokens_builds_unattached_nodes() {
        let graph = DependencyGraph::from_tokens(&["Dog", "sees"], &["NOUN", "VERB"]).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.node(1).unwrap().head, None);
        assert!(DependencyGraph::from_tokens(&["a"], &["A", "B"]).is_err());
    }

    #[test]
    fn test_update_dependency_refreshes_children() {
        let mut graph = DependencyGraph::from_tokens(&["Dog", "sees"], &["NOUN", "VERB"]).unwrap();
        graph.update_dependency(2, 1).unwrap();
        graph.update_dependency(0, 2).unwrap();
        assert!(graph.children_of(2).unwrap().contains(&1));
        assert_eq!(graph.node(2).unwrap().relation.as_deref(), Some("root"));
        // Reassignment moves the child between index entries.
        graph.update_dependency(0, 1).unwrap();
        assert!(!graph.children_of(2).unwrap().contains(&1));
        assert!(graph.children_of(0).unwrap().contains(&1));
        assert!(graph.update_dependency(1, 1).is_err());
        assert!(graph.update_dependency(9, 1).is_err());
    }

    #[test]
    fn test_pos_sequence_skips_root() {
        let graph = DependencyGraph::from_text(THREE_COL).unwrap();
        let (words, tags) = graph.pos_sequence();
        assert_eq!(words, vec!["Dog", "sees", "cat"]);
        assert_eq!(tags, vec!["NOUN", "VERB", "NOUN"]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph =
            DependencyGraph::from_tokens(&["a", "b", "c"], &["X", "X", "X"]).unwrap();
        graph.update_dependency(2, 1).unwrap();
        graph.update_dependency(3, 2).unwrap();
        graph.update_dependency(0, 3).unwrap();
        assert!(!graph.contains_cycle());
        graph.update_dependency(1, 3).unwrap();
        assert!(graph.contains_cycle());
    }

    #[test]
    fn test_to_dot_lists_arcs() {
        let graph = DependencyGraph::from_text(THREE_COL).unwrap();
        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph G{"));
        assert!(dot.contains("2 -> 1"));
        assert!(dot.contains("0 -> 2 [label=\"root\"]"));
    }
}
