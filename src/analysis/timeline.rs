//! Year-by-year series per secondary review section.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::analysis::tree::{HierarchyNode, TreeBuild, build_tree};
use crate::config::BuildOptions;
use crate::error::{EngineError, RecordError};
use crate::records::GrantRecord;

/// One section tree per grant start year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTree {
    pub year: i32,
    #[serde(flatten)]
    pub tree: HierarchyNode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionTimeline {
    pub secondary_category: String,
    pub parent_category: String,
    pub value: Vec<(i32, f64)>,
    pub paper_count: Vec<(i32, u64)>,
    pub citation_count: Vec<(i32, f64)>,
}

impl SectionTimeline {
    fn new(parent: &str, name: &str) -> Self {
        Self {
            secondary_category: name.to_string(),
            parent_category: parent.to_string(),
            value: Vec::new(),
            paper_count: Vec::new(),
            citation_count: Vec::new(),
        }
    }
}

/// Builds a section tree for every start year present, in ascending year order.
pub fn yearly_trees<'a, I>(
    records: I,
    options: &BuildOptions,
) -> Result<(Vec<YearTree>, Vec<RecordError>), EngineError>
where
    I: IntoIterator<Item = &'a GrantRecord>,
{
    let mut by_year: BTreeMap<i32, Vec<&GrantRecord>> = BTreeMap::new();
    for record in records {
        by_year.entry(record.start_year).or_default().push(record);
    }

    let mut trees = Vec::with_capacity(by_year.len());
    let mut skipped = Vec::new();
    for (year, records) in by_year {
        let TreeBuild {
            root,
            skipped: year_skipped,
        } = build_tree(records, options)?;
        skipped.extend(year_skipped);
        trees.push(YearTree { year, tree: root });
    }
    Ok((trees, skipped))
}

/// Reshapes per-year trees into one series per (primary, secondary) section,
/// in first-seen order, each series sorted by year.
pub fn by_secondary_section(trees: &[YearTree]) -> Vec<SectionTimeline> {
    let mut out: Vec<SectionTimeline> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for YearTree { year, tree } in trees {
        for primary in tree.sections() {
            for secondary in primary.sections() {
                let key = (primary.name.clone(), secondary.name.clone());
                let slot = *index.entry(key).or_insert_with(|| {
                    out.push(SectionTimeline::new(&primary.name, &secondary.name));
                    out.len() - 1
                });
                let series = &mut out[slot];
                series.value.push((*year, secondary.fund));
                series.paper_count.push((*year, secondary.paper_count));
                series.citation_count.push((*year, secondary.citation_total));
            }
        }
    }

    for series in &mut out {
        series.value.sort_by_key(|(year, _)| *year);
        series.paper_count.sort_by_key(|(year, _)| *year);
        series.citation_count.sort_by_key(|(year, _)| *year);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Product;

    fn grant(year: i32, primary: &str, secondary: Option<&str>, fund: f64, papers: usize) -> GrantRecord {
        GrantRecord {
            title: format!("{primary}-{year}"),
            primary_section: primary.into(),
            secondary_section: secondary.map(str::to_string),
            award_amount: fund,
            products: vec![
                Product {
                    citation_count: Some(2.0),
                    journal_title: None,
                };
                papers
            ],
            start_year: year,
            ..Default::default()
        }
    }

    #[test]
    fn test_yearly_trees_are_sorted_by_year() {
        let records = vec![
            grant(2021, "Physics", Some("Optics"), 10.0, 1),
            grant(2019, "Physics", Some("Optics"), 20.0, 2),
            grant(2020, "Biology", None, 5.0, 0),
        ];
        let (trees, skipped) = yearly_trees(&records, &BuildOptions::default()).unwrap();
        let years: Vec<_> = trees.iter().map(|t| t.year).collect();
        assert_eq!(years, vec![2019, 2020, 2021]);
        assert!(skipped.is_empty());
        assert_eq!(trees[0].tree.fund, 20.0);
    }

    #[test]
    fn test_series_per_secondary_section() {
        let records = vec![
            grant(2021, "Physics", Some("Optics"), 10.0, 1),
            grant(2019, "Physics", Some("Optics"), 20.0, 2),
            grant(2019, "Physics", Some("Plasma"), 7.0, 1),
            grant(2020, "Biology", None, 5.0, 0),
        ];
        let (trees, _) = yearly_trees(&records, &BuildOptions::default()).unwrap();
        let series = by_secondary_section(&trees);

        // Biology has no secondary section, and its grant leaf is not one
        let names: Vec<_> = series.iter().map(|s| s.secondary_category.as_str()).collect();
        assert_eq!(names, vec!["Optics", "Plasma"]);

        let optics = &series[0];
        assert_eq!(optics.parent_category, "Physics");
        assert_eq!(optics.value, vec![(2019, 20.0), (2021, 10.0)]);
        assert_eq!(optics.paper_count, vec![(2019, 2), (2021, 1)]);
        assert_eq!(optics.citation_count, vec![(2019, 4.0), (2021, 2.0)]);
    }

    #[test]
    fn test_same_secondary_name_under_different_primaries() {
        let records = vec![
            grant(2019, "Physics", Some("Theory"), 1.0, 0),
            grant(2019, "Biology", Some("Theory"), 2.0, 0),
        ];
        let (trees, _) = yearly_trees(&records, &BuildOptions::default()).unwrap();
        let series = by_secondary_section(&trees);
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].parent_category, "Biology");
    }
}
