//! Drill-down state for exploring the section hierarchy.
//!
//! A [`NavigationState`] is a plain value: drilling down or stepping back
//! returns a new state, so a host keeps its own history (e.g. a `Vec` used as
//! a back stack).

use serde::Serialize;

use crate::records::{GrantRecord, GroupingKey};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    level: GroupingKey,
    primary: Option<String>,
    secondary: Option<String>,
    by_institution: bool,
}

impl NavigationState {
    /// Top of the hierarchy: every record, grouped by primary section.
    pub fn root() -> Self {
        Self::default()
    }

    /// Secondary sections inside `primary`.
    pub fn within_primary(primary: &str) -> Self {
        Self {
            level: GroupingKey::Secondary,
            primary: Some(primary.to_string()),
            ..Default::default()
        }
    }

    /// Tertiary sections inside `primary` > `secondary`.
    pub fn within_secondary(primary: &str, secondary: &str) -> Self {
        Self {
            level: GroupingKey::Tertiary,
            primary: Some(primary.to_string()),
            secondary: Some(secondary.to_string()),
            by_institution: false,
        }
    }

    /// Same scope, grouped by institution instead of by section.
    pub fn by_institution(&self) -> Self {
        Self {
            by_institution: true,
            ..self.clone()
        }
    }

    pub fn level(&self) -> GroupingKey {
        self.level
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn is_institution_view(&self) -> bool {
        self.by_institution
    }

    /// Key the current view groups records by.
    pub fn grouping_key(&self) -> GroupingKey {
        if self.by_institution {
            GroupingKey::Institution
        } else {
            self.level
        }
    }

    /// State after selecting the group `selected` in the current view.
    /// `None` at the tertiary level and in the institution view.
    pub fn drill_down(&self, selected: &str) -> Option<Self> {
        if self.by_institution {
            return None;
        }
        match self.level {
            GroupingKey::Primary => Some(Self::within_primary(selected)),
            GroupingKey::Secondary => {
                let primary = self.primary.as_deref()?;
                Some(Self::within_secondary(primary, selected))
            }
            GroupingKey::Tertiary | GroupingKey::Institution => None,
        }
    }

    /// State one step back. Leaving the institution view returns to the
    /// section view of the same scope.
    pub fn parent(&self) -> Option<Self> {
        if self.by_institution {
            return Some(Self {
                by_institution: false,
                ..self.clone()
            });
        }
        match self.level {
            GroupingKey::Tertiary => self.primary.as_deref().map(Self::within_primary),
            GroupingKey::Secondary => Some(Self::root()),
            GroupingKey::Primary | GroupingKey::Institution => None,
        }
    }

    /// Whether `record` falls inside the current scope.
    pub fn contains(&self, record: &GrantRecord) -> bool {
        let primary_matches = self
            .primary
            .as_deref()
            .is_none_or(|p| record.primary_section == p);
        let secondary_matches = self
            .secondary
            .as_deref()
            .is_none_or(|s| record.secondary_section.as_deref() == Some(s));
        primary_matches && secondary_matches
    }

    pub fn scope<'a>(&'a self, records: &'a [GrantRecord]) -> impl Iterator<Item = &'a GrantRecord> {
        records.iter().filter(move |r| self.contains(r))
    }

    pub fn breadcrumb(&self) -> String {
        let mut parts: Vec<&str> = self.primary.iter().chain(&self.secondary).map(String::as_str).collect();
        if parts.is_empty() {
            parts.push("All sections");
        }
        let mut crumb = parts.join(" > ");
        if self.by_institution {
            crumb.push_str(" (by institution)");
        }
        crumb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(primary: &str, secondary: Option<&str>) -> GrantRecord {
        GrantRecord {
            title: "t".into(),
            primary_section: primary.into(),
            secondary_section: secondary.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_drill_down_path() {
        let root = NavigationState::root();
        assert_eq!(root.grouping_key(), GroupingKey::Primary);

        let physics = root.drill_down("Physics").unwrap();
        assert_eq!(physics.level(), GroupingKey::Secondary);
        assert_eq!(physics.primary(), Some("Physics"));

        let optics = physics.drill_down("Optics").unwrap();
        assert_eq!(optics.level(), GroupingKey::Tertiary);
        assert_eq!(optics.secondary(), Some("Optics"));

        assert_eq!(optics.drill_down("Lasers"), None);
    }

    #[test]
    fn test_parent_walks_back_up() {
        let optics = NavigationState::within_secondary("Physics", "Optics");
        let physics = optics.parent().unwrap();
        assert_eq!(physics, NavigationState::within_primary("Physics"));
        assert_eq!(physics.parent(), Some(NavigationState::root()));
        assert_eq!(NavigationState::root().parent(), None);
    }

    #[test]
    fn test_institution_view() {
        let physics = NavigationState::within_primary("Physics");
        let by_inst = physics.by_institution();
        assert_eq!(by_inst.grouping_key(), GroupingKey::Institution);
        assert_eq!(by_inst.drill_down("Kyoto"), None);
        assert_eq!(by_inst.parent(), Some(physics));
        assert_eq!(by_inst.breadcrumb(), "Physics (by institution)");
    }

    #[test]
    fn test_scope_filters_records() {
        let records = vec![
            grant("Physics", Some("Optics")),
            grant("Physics", Some("Plasma")),
            grant("Biology", Some("Optics")),
            grant("Physics", None),
        ];

        assert_eq!(NavigationState::root().scope(&records).count(), 4);
        assert_eq!(NavigationState::within_primary("Physics").scope(&records).count(), 3);
        assert_eq!(
            NavigationState::within_secondary("Physics", "Optics")
                .scope(&records)
                .count(),
            1
        );
    }

    #[test]
    fn test_breadcrumb() {
        assert_eq!(NavigationState::root().breadcrumb(), "All sections");
        assert_eq!(
            NavigationState::within_secondary("Physics", "Optics").breadcrumb(),
            "Physics > Optics"
        );
    }
}
