//! # Group/Subtotal Tracker
//!
//! A subtotal field prints `running_total - checkpoint`, where the checkpoint
//! is the running total captured at the last break that concerns the field.
//! Checkpoints live in three kinds of maps:
//!
//! - one page map, holding every tracked key, refreshed whenever a page is
//!   created so page footers print per-page deltas;
//! - one map per group, holding the keys its head and foot track, zeroed
//!   when its detail section starts and refreshed after each of its footers;
//! - no map of its own for detail rows, which look through the groups of
//!   their section and use the innermost checkpoint.
//!
//! Which map a lookup uses is decided by the [`SubtotalScope`] the renderer
//! passes down. Exactly one scope applies to any section render.

use std::collections::BTreeMap;

use crate::model::{DataRef, ReportDefinition};

/// Captured running totals keyed by (query, column).
pub type CheckpointMap = BTreeMap<DataRef, f64>;

/// The checkpoint scope a section renders under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubtotalScope {
    /// Report head/foot and page heads: subtotals equal running totals.
    #[default]
    None,
    /// Page footers subtract the page checkpoints.
    PageFooter,
    /// A group head or foot subtracts that group's checkpoints.
    Group { section: usize, group: usize },
    /// A detail row subtracts the innermost group checkpoint of its section.
    DetailFallback { section: usize },
}

#[derive(Debug, Clone, Default)]
pub struct SubtotalTracker {
    page: CheckpointMap,
    /// Indexed by detail section, then group.
    groups: Vec<Vec<CheckpointMap>>,
}

impl SubtotalTracker {
    /// Set up zeroed checkpoints for every tracked key in `def`.
    pub fn new(def: &ReportDefinition) -> Self {
        let page = def
            .tracked_totals()
            .into_iter()
            .map(|k| (k, 0.0))
            .collect();
        let groups = def
            .sections
            .iter()
            .map(|section| {
                section
                    .groups
                    .iter()
                    .map(|g| g.tracked_totals().into_iter().map(|k| (k, 0.0)).collect())
                    .collect()
            })
            .collect();
        Self { page, groups }
    }

    /// Every tracked key, once.
    pub fn tracked_keys(&self) -> impl Iterator<Item = &DataRef> {
        self.page.keys()
    }

    fn map(&self, scope: SubtotalScope) -> Option<&CheckpointMap> {
        match scope {
            SubtotalScope::PageFooter => Some(&self.page),
            SubtotalScope::Group { section, group } => {
                self.groups.get(section).and_then(|s| s.get(group))
            }
            SubtotalScope::None | SubtotalScope::DetailFallback { .. } => None,
        }
    }

    fn map_mut(&mut self, scope: SubtotalScope) -> Option<&mut CheckpointMap> {
        match scope {
            SubtotalScope::PageFooter => Some(&mut self.page),
            SubtotalScope::Group { section, group } => {
                self.groups.get_mut(section).and_then(|s| s.get_mut(group))
            }
            SubtotalScope::None | SubtotalScope::DetailFallback { .. } => None,
        }
    }

    /// The checkpoint a subtotal field in `scope` subtracts. Zero when the
    /// scope holds none for `key`.
    pub fn resolve(&self, scope: SubtotalScope, key: &DataRef) -> f64 {
        match scope {
            SubtotalScope::None => 0.0,
            SubtotalScope::PageFooter | SubtotalScope::Group { .. } => self
                .map(scope)
                .and_then(|m| m.get(key))
                .copied()
                .unwrap_or(0.0),
            SubtotalScope::DetailFallback { section } => {
                let mut found = 0.0;
                for group in self.groups.get(section).into_iter().flatten() {
                    if let Some(v) = group.get(key) {
                        found = *v;
                    }
                }
                found
            }
        }
    }

    /// Overwrite one checkpoint. Keys the scope does not track are ignored.
    pub fn update(&mut self, scope: SubtotalScope, key: &DataRef, value: f64) {
        if let Some(v) = self.map_mut(scope).and_then(|m| m.get_mut(key)) {
            *v = value;
        }
    }

    /// Zero every checkpoint in `scope`.
    pub fn zero(&mut self, scope: SubtotalScope) {
        if let Some(m) = self.map_mut(scope) {
            m.values_mut().for_each(|v| *v = 0.0);
        }
    }

    /// Reset every checkpoint in `scope` to the current running total.
    pub fn refresh(&mut self, scope: SubtotalScope, mut running_total: impl FnMut(&DataRef) -> f64) {
        if let Some(m) = self.map_mut(scope) {
            for (key, value) in m.iter_mut() {
                *value = running_total(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        DetailSection, Element, FieldElement, Group, Key, Rect, Section,
    };

    fn total_field(query: &str, column: &str) -> Element {
        let mut f = FieldElement::new(Rect::default(), DataRef::new(query, column));
        f.track_total = true;
        f.sub_total = true;
        Element::Field(f)
    }

    fn definition() -> ReportDefinition {
        let amount = || Some(Section::new(20.0, vec![total_field("detail", "amount")]));
        ReportDefinition {
            sections: vec![DetailSection {
                key: Key {
                    query: "detail".into(),
                    column: None,
                },
                groups: vec![
                    Group {
                        name: "region".into(),
                        column: "region".into(),
                        foot: amount(),
                        ..Default::default()
                    },
                    Group {
                        name: "cust".into(),
                        column: "cust".into(),
                        foot: amount(),
                        ..Default::default()
                    },
                    Group {
                        name: "plain".into(),
                        column: "x".into(),
                        ..Default::default()
                    },
                ],
                detail: Some(Section::new(20.0, vec![])),
                ..Default::default()
            }],
            page_foot: crate::model::PageBands {
                any: Some(Section::new(20.0, vec![total_field("detail", "qty")])),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn keys_collected_from_definition() {
        let t = SubtotalTracker::new(&definition());
        let keys: Vec<&DataRef> = t.tracked_keys().collect();
        assert_eq!(
            keys,
            vec![&DataRef::new("detail", "amount"), &DataRef::new("detail", "qty")]
        );
    }

    #[test]
    fn scope_precedence() {
        let mut t = SubtotalTracker::new(&definition());
        let amount = DataRef::new("detail", "amount");
        let outer = SubtotalScope::Group {
            section: 0,
            group: 0,
        };
        let inner = SubtotalScope::Group {
            section: 0,
            group: 1,
        };
        t.update(SubtotalScope::PageFooter, &amount, 5.0);
        t.update(outer, &amount, 10.0);
        t.update(inner, &amount, 30.0);

        assert_eq!(t.resolve(SubtotalScope::PageFooter, &amount), 5.0);
        assert_eq!(t.resolve(outer, &amount), 10.0);
        assert_eq!(t.resolve(inner, &amount), 30.0);
        // innermost group that tracks the key wins
        assert_eq!(t.resolve(SubtotalScope::DetailFallback { section: 0 }, &amount), 30.0);
        assert_eq!(t.resolve(SubtotalScope::None, &amount), 0.0);
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut t = SubtotalTracker::new(&definition());
        let amount = DataRef::new("detail", "amount");
        let scope = SubtotalScope::Group {
            section: 0,
            group: 1,
        };
        t.update(scope, &amount, 42.0);
        let first = t.resolve(scope, &amount);
        let second = t.resolve(scope, &amount);
        assert_eq!(first, second);
    }

    #[test]
    fn untracked_keys_and_unknown_groups() {
        let mut t = SubtotalTracker::new(&definition());
        let other = DataRef::new("detail", "other");
        let plain = SubtotalScope::Group {
            section: 0,
            group: 2,
        };
        t.update(plain, &other, 9.0);
        assert_eq!(t.resolve(plain, &other), 0.0);
        let missing = SubtotalScope::Group {
            section: 4,
            group: 0,
        };
        assert_eq!(t.resolve(missing, &other), 0.0);
        assert_eq!(t.resolve(SubtotalScope::DetailFallback { section: 4 }, &other), 0.0);
    }

    #[test]
    fn refresh_and_zero() {
        let mut t = SubtotalTracker::new(&definition());
        let amount = DataRef::new("detail", "amount");
        let qty = DataRef::new("detail", "qty");
        t.refresh(SubtotalScope::PageFooter, |k| if k.column == "qty" { 7.0 } else { 3.0 });
        assert_eq!(t.resolve(SubtotalScope::PageFooter, &qty), 7.0);
        assert_eq!(t.resolve(SubtotalScope::PageFooter, &amount), 3.0);

        let outer = SubtotalScope::Group {
            section: 0,
            group: 0,
        };
        t.refresh(outer, |_| 11.0);
        assert_eq!(t.resolve(outer, &amount), 11.0);
        t.zero(outer);
        assert_eq!(t.resolve(outer, &amount), 0.0);
    }
}
