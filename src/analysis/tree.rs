//! Full-tree hierarchy builder.
//!
//! Nests grants under root > primary > secondary > tertiary section, with each
//! grant as a leaf under the deepest section it is classified into. Every node
//! carries the fund, paper count and citation total of the grants below it.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::analysis::group::admit;
use crate::config::BuildOptions;
use crate::error::{EngineError, RecordError};
use crate::records::GrantRecord;

pub const ROOT_NAME: &str = "root";

/// Serializes as `{ name, value, paper_count, citation_count, children }`;
/// `children` is omitted on grant leaves.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    pub name: String,
    #[serde(skip)]
    pub depth: u8,
    #[serde(rename = "value")]
    pub fund: f64,
    pub paper_count: u64,
    #[serde(rename = "citation_count")]
    pub citation_total: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&HierarchyNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Section nodes directly below this one, skipping grant leaves.
    pub fn sections(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.children.iter().filter(|c| !c.is_leaf())
    }

    /// Every grant leaf below this node, depth first.
    pub fn leaves(&self) -> Vec<&HierarchyNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                out.push(node);
            } else {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeBuild {
    pub root: HierarchyNode,
    pub skipped: Vec<RecordError>,
}

struct Contribution {
    fund: f64,
    papers: u64,
    citations: f64,
}

/// Mutable node used while folding; frozen into a [`HierarchyNode`].
struct NodeBuilder {
    name: String,
    depth: u8,
    fund: f64,
    papers: u64,
    citations: f64,
    children: Vec<NodeBuilder>,
    sections: HashMap<String, usize>,
}

impl NodeBuilder {
    fn new(name: &str, depth: u8) -> Self {
        Self {
            name: name.to_string(),
            depth,
            fund: 0.0,
            papers: 0,
            citations: 0.0,
            children: Vec::new(),
            sections: HashMap::new(),
        }
    }

    fn add(&mut self, c: &Contribution) {
        self.fund += c.fund;
        self.papers += c.papers;
        self.citations += c.citations;
    }

    fn section(&mut self, name: &str) -> &mut NodeBuilder {
        let slot = match self.sections.get(name) {
            Some(&slot) => slot,
            None => {
                self.sections.insert(name.to_string(), self.children.len());
                self.children.push(NodeBuilder::new(name, self.depth + 1));
                self.children.len() - 1
            }
        };
        &mut self.children[slot]
    }

    fn push_leaf(&mut self, title: &str, c: &Contribution) {
        let mut leaf = NodeBuilder::new(title, self.depth + 1);
        leaf.add(c);
        self.children.push(leaf);
    }

    fn finish(self) -> HierarchyNode {
        HierarchyNode {
            name: self.name,
            depth: self.depth,
            fund: self.fund,
            paper_count: self.papers,
            citation_total: self.citations,
            children: self.children.into_iter().map(NodeBuilder::finish).collect(),
        }
    }
}

/// Folds `records` in order into the 4-level section tree.
pub fn build_tree<'a, I>(records: I, options: &BuildOptions) -> Result<TreeBuild, EngineError>
where
    I: IntoIterator<Item = &'a GrantRecord>,
{
    let mut root = NodeBuilder::new(ROOT_NAME, 0);
    let mut skipped = Vec::new();
    let mut grants = 0usize;

    for (i, record) in records.into_iter().enumerate() {
        if !admit(i, record, options, &mut skipped)? {
            continue;
        }

        let contribution = Contribution {
            fund: record.award_amount,
            papers: record.paper_count(),
            citations: record.citation_total(),
        };

        root.add(&contribution);
        let mut node = &mut root;
        for name in record.section_path() {
            node = node.section(name);
            node.add(&contribution);
        }
        node.push_leaf(&record.title, &contribution);
        grants += 1;
    }

    debug!(grants, skipped = skipped.len(), "Built section tree");

    Ok(TreeBuild {
        root: root.finish(),
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::group::build;
    use crate::records::{GroupingKey, Product};

    fn grant(title: &str, path: &[&str], fund: f64, cites: &[Option<f64>]) -> GrantRecord {
        GrantRecord {
            title: title.into(),
            primary_section: path[0].into(),
            secondary_section: path.get(1).map(|s| s.to_string()),
            tertiary_section: path.get(2).map(|s| s.to_string()),
            award_amount: fund,
            products: cites
                .iter()
                .map(|&c| Product {
                    citation_count: c,
                    journal_title: None,
                })
                .collect(),
            start_year: 2018,
            ..Default::default()
        }
    }

    fn sample() -> Vec<GrantRecord> {
        vec![
            grant("g1", &["Physics", "Optics", "Lasers"], 300.0, &[Some(10.0), None]),
            grant("g2", &["Physics", "Optics"], 200.0, &[Some(1.0)]),
            grant("g3", &["Biology"], 50.0, &[]),
            grant("g4", &["Physics", "Plasma", "Fusion"], 120.0, &[Some(4.0), Some(0.0)]),
            grant("g5", &["Physics", "Optics", "Lasers"], 80.0, &[Some(2.0)]),
        ]
    }

    fn assert_partition(node: &HierarchyNode) {
        if node.is_leaf() {
            return;
        }
        let fund: f64 = node.children.iter().map(|c| c.fund).sum();
        let papers: u64 = node.children.iter().map(|c| c.paper_count).sum();
        let citations: f64 = node.children.iter().map(|c| c.citation_total).sum();
        assert!((node.fund - fund).abs() < 1e-9, "fund mismatch at {}", node.name);
        assert_eq!(node.paper_count, papers, "paper mismatch at {}", node.name);
        assert!((node.citation_total - citations).abs() < 1e-9);
        for child in &node.children {
            assert_eq!(child.depth, node.depth + 1);
            assert_partition(child);
        }
    }

    #[test]
    fn test_tree_shape_and_order() {
        let tree = build_tree(&sample(), &BuildOptions::default()).unwrap().root;
        assert_eq!(tree.name, ROOT_NAME);
        let primaries: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(primaries, vec!["Physics", "Biology"]);

        let physics = tree.child("Physics").unwrap();
        let optics = physics.child("Optics").unwrap();
        // the tertiary section first, then g2 as a leaf directly under Optics
        let names: Vec<_> = optics.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Lasers", "g2"]);

        let lasers = optics.child("Lasers").unwrap();
        assert_eq!(lasers.depth, 3);
        assert_eq!(lasers.fund, 380.0);
        assert_eq!(lasers.paper_count, 3);
        assert_eq!(lasers.citation_total, 12.0);
        assert_eq!(lasers.children.len(), 2);
        assert_eq!(lasers.children[0].depth, 4);

        let biology = tree.child("Biology").unwrap();
        assert_eq!(biology.children.len(), 1);
        assert_eq!(biology.children[0].name, "g3");
        assert_eq!(biology.children[0].depth, 2);
    }

    #[test]
    fn test_every_node_is_sum_of_children() {
        let tree = build_tree(&sample(), &BuildOptions::default()).unwrap().root;
        assert_partition(&tree);
    }

    #[test]
    fn test_leaves_conserve_input_totals() {
        let records = sample();
        let tree = build_tree(&records, &BuildOptions::default()).unwrap().root;
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), records.len());

        let leaf_fund: f64 = leaves.iter().map(|l| l.fund).sum();
        let input_fund: f64 = records.iter().map(|r| r.award_amount).sum();
        assert_eq!(leaf_fund, input_fund);

        let leaf_papers: u64 = leaves.iter().map(|l| l.paper_count).sum();
        assert_eq!(leaf_papers, 6);
        let leaf_citations: f64 = leaves.iter().map(|l| l.citation_total).sum();
        assert_eq!(leaf_citations, 17.0);
    }

    #[test]
    fn test_flat_primary_grouping_agrees_with_tree() {
        let records = sample();
        let options = BuildOptions::default();
        let tree = build_tree(&records, &options).unwrap().root;
        let flat = build(&records, GroupingKey::Primary, &options).unwrap();

        assert_eq!(flat.groups.len(), tree.children.len());
        for (group, node) in flat.groups.iter().zip(&tree.children) {
            assert_eq!(group.key, node.name);
            assert_eq!(group.fund, node.fund);
            assert_eq!(group.sums.papers, node.paper_count);
            assert_eq!(group.sums.citations, node.citation_total);
        }
    }

    #[test]
    fn test_duplicate_titles_stay_separate_leaves() {
        let records = vec![
            grant("same", &["Physics"], 1.0, &[]),
            grant("same", &["Physics"], 2.0, &[]),
        ];
        let tree = build_tree(&records, &BuildOptions::default()).unwrap().root;
        assert_eq!(tree.child("Physics").unwrap().children.len(), 2);
    }

    #[test]
    fn test_invalid_records_skipped_in_lenient_mode() {
        let mut records = sample();
        records[1].award_amount = -3.0;
        let build = build_tree(&records, &BuildOptions::default()).unwrap();
        assert_eq!(build.skipped.len(), 1);
        assert_eq!(build.root.fund, 550.0);
        assert_partition(&build.root);
    }

    #[test]
    fn test_build_tree_is_idempotent() {
        let records = sample();
        let a = build_tree(&records, &BuildOptions::default()).unwrap();
        let b = build_tree(&records, &BuildOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_serialized_shape() {
        let tree = build_tree(&sample(), &BuildOptions::default()).unwrap().root;
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["name"], "root");
        assert_eq!(json["value"], 750.0);
        assert_eq!(json["paper_count"], 6);
        assert_eq!(json["citation_count"], 17.0);
        assert_eq!(json["children"][0]["name"], "Physics");
        assert!(json.get("depth").is_none());
        let biology_leaf = &json["children"][1]["children"][0];
        assert_eq!(biology_leaf["name"], "g3");
        assert!(biology_leaf.get("children").is_none());
    }
}
