//! # Detail Section Driver
//!
//! Walks a detail section's query row by row. Group heads print once at
//! the start and again after every key change; group feet print before the
//! change (innermost first) and once more after the last row. Each foot is
//! followed by a checkpoint refresh for its group, so the next group's
//! subtotals start from zero.
//!
//! A key change is detected one row late: the cursor has already moved to
//! the first row of the new group. The driver steps back so feet and their
//! totals see the last row of the old group, then forward again before the
//! heads of the new group print.

use super::{PageCursor, Renderer};
use crate::model::{DetailSection, GroupBreak, Section, SectionBreak};
use crate::query::Query;
use crate::subtotal::SubtotalScope;

fn group_scope(section: usize, group: usize) -> SubtotalScope {
    SubtotalScope::Group { section, group }
}

impl Renderer<'_> {
    /// Render detail section `idx`, then honour its end-of-section break.
    pub(super) fn render_detail_section(&mut self, cursor: &mut PageCursor, idx: usize) {
        let def = self.def;
        let section = &def.sections[idx];
        let name = section.key.query.as_str();

        let size = self.queries.get(name).map(|q| q.size());
        match (&section.detail, size) {
            (Some(detail), Some(rows)) if rows > 0 => {
                self.render_rows(cursor, idx, section, detail);
            }
            (Some(_), Some(_)) => log::debug!("detail query '{name}' returned no rows"),
            (Some(_), None) => log::warn!("detail query '{name}' is not available"),
            (None, _) => log::debug!("detail section '{}' has no detail band", section.name),
        }

        if section.page_break == SectionBreak::AtEnd {
            self.create_new_page(cursor);
        }
    }

    fn render_rows(
        &mut self,
        cursor: &mut PageCursor,
        idx: usize,
        section: &DetailSection,
        detail: &Section,
    ) {
        let name = section.key.query.as_str();
        let groups = &section.groups;
        self.step(name, |q| q.first());
        cursor.detail_query = Some(name.to_string());

        for g in 0..groups.len() {
            cursor.subtotals.zero(group_scope(idx, g));
        }
        let mut keys: Vec<String> = groups.iter().map(|g| self.key_value(name, &g.column)).collect();
        for (g, group) in groups.iter().enumerate() {
            if let Some(head) = &group.head {
                self.place_keeping_row(cursor, head, group_scope(idx, g));
            }
        }

        loop {
            let height = self.measure_section(cursor, detail, true);
            if self.needs_new_page(cursor, height, self.on_last_row(name)) {
                self.break_page_keeping_row(cursor);
            }
            self.render_section(cursor, detail, SubtotalScope::DetailFallback { section: idx });

            if !self.step(name, |q| q.next()) {
                break;
            }

            let changed = groups
                .iter()
                .zip(&keys)
                .position(|(g, old)| !g.column.is_empty() && self.key_value(name, &g.column) != *old);
            let Some(pos) = changed else {
                continue;
            };
            log::trace!("group '{}' changed on '{name}'", groups[pos].name);

            self.step(name, |q| q.prev());
            let mut do_break = false;
            for g in (pos..groups.len()).rev() {
                if std::mem::take(&mut do_break) {
                    self.create_new_page(cursor);
                }
                if let Some(foot) = &groups[g].foot {
                    let height = self.measure_section(cursor, foot, true);
                    if self.needs_new_page(cursor, height, false) {
                        self.create_new_page(cursor);
                    }
                    self.render_section(cursor, foot, group_scope(idx, g));
                }
                self.refresh_group(cursor, idx, g);
                do_break = groups[g].page_break == GroupBreak::AfterGroupFoot;
            }
            // Still on the old group's last row, so the closing page foot
            // totals only what it printed.
            if do_break {
                self.create_new_page(cursor);
            }
            self.step(name, |q| q.next());

            for g in pos..groups.len() {
                keys[g] = self.key_value(name, &groups[g].column);
                if let Some(head) = &groups[g].head {
                    self.place_keeping_row(cursor, head, group_scope(idx, g));
                }
            }
        }

        // Back onto the last row so trailing feet read valid values.
        if !self.queries.get(name).is_some_and(|q| q.is_valid()) {
            self.step(name, |q| q.prev());
        }
        for g in (0..groups.len()).rev() {
            if let Some(foot) = &groups[g].foot {
                let height = self.measure_section(cursor, foot, true);
                if self.needs_new_page(cursor, height, self.on_last_row(name)) {
                    self.create_new_page(cursor);
                }
                self.render_section(cursor, foot, group_scope(idx, g));
            }
            self.refresh_group(cursor, idx, g);
        }
        cursor.detail_query = None;
    }

    /// Fit-check and render a group head. A break keeps the page foot's
    /// totals at the last row already printed.
    fn place_keeping_row(&mut self, cursor: &mut PageCursor, head: &Section, scope: SubtotalScope) {
        let name = cursor.detail_query.clone().unwrap_or_default();
        let height = self.measure_section(cursor, head, true);
        if self.needs_new_page(cursor, height, self.on_last_row(&name)) {
            self.break_page_keeping_row(cursor);
        }
        self.render_section(cursor, head, scope);
    }

    fn refresh_group(&self, cursor: &mut PageCursor, section: usize, group: usize) {
        let queries = &self.queries;
        cursor
            .subtotals
            .refresh(group_scope(section, group), |key| queries.running_total(key));
    }

    fn step(&mut self, name: &str, f: impl FnOnce(&mut Box<dyn Query>) -> bool) -> bool {
        self.queries.get_mut(name).is_some_and(f)
    }

    /// Current text of a group key column. An empty column name reads as
    /// an empty key, which never changes.
    fn key_value(&self, name: &str, column: &str) -> String {
        if column.is_empty() {
            return String::new();
        }
        self.queries
            .get(name)
            .and_then(|q| q.value(column))
            .map(|d| d.as_text())
            .unwrap_or_default()
    }

    fn on_last_row(&self, name: &str) -> bool {
        self.queries
            .get(name)
            .map_or(true, |q| q.at().is_some_and(|row| row + 1 == q.size()))
    }
}
