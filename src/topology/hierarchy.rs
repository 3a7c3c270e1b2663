//! The level-by-level refinement cycle.
//!
//! # Cycle
//! 1. From the finest level down to level 0: restrict marks, then close.
//! 2. From level 0 up to the former finest level: close again (levels above
//!    0 only), unrefine (all but the former finest level), then refine.
//! 3. Drop all recycle bins and trailing empty levels.
//!
//! After a successful cycle the finest triangulation is conforming and every
//! tetra that was marked for regular refinement has eight children.

use crate::debug_invariants::{DebugInvariants, invariant_checks_enabled};
use crate::mesh_error::MeshError;
use crate::topology::multigrid::MultiGrid;
use crate::topology::refine_rule::REMOVE_MARK;
use crate::topology::simplex::{Handle, TetraHandle};

impl MultiGrid {
    fn level_tetras(&self, level: usize) -> Result<Vec<TetraHandle>, MeshError> {
        Ok(self
            .level_ref(level)?
            .tetras
            .keys()
            .map(|k| TetraHandle::new(level, k))
            .collect())
    }

    /// Run one full refinement cycle on the pending marks.
    ///
    /// Any handle obtained before the call may be invalid afterwards.
    pub fn refine(&mut self) -> Result<(), MeshError> {
        let last = self.last_level();
        log::debug!("refinement cycle over levels 0..={last}");

        for level in (0..=last).rev() {
            self.restrict_marks(level)?;
            self.close_grid(level)?;
        }

        for level in 0..=last {
            if self.level_ref(level)?.tetras.is_empty() {
                continue;
            }
            if level > 0 {
                self.close_grid(level)?;
            }
            if level != last {
                self.unrefine_grid(level)?;
            }
            self.refine_grid(level)?;
        }
        self.bins.destroy_all();

        while self.levels.len() > 1 && self.levels.last().is_some_and(|l| l.tetras.is_empty()) {
            if let Some(dropped) = self.levels.pop() {
                if !dropped.is_empty() {
                    log::warn!("dropping level {} with leftover entities", self.levels.len());
                }
            }
        }

        log::info!(
            "refinement done: {} levels, {}",
            self.num_levels(),
            self.size_info_line()
        );
        if invariant_checks_enabled(self.options.check_invariants) {
            self.validate_invariants()?;
        } else {
            self.debug_assert_invariants();
        }
        Ok(())
    }

    pub(crate) fn restrict_marks(&mut self, level: usize) -> Result<(), MeshError> {
        for t in self.level_tetras(level)? {
            self.restrict_mark(t)?;
        }
        Ok(())
    }

    /// Close every regular tetra of `level` not marked for regular refinement.
    pub(crate) fn close_grid(&mut self, level: usize) -> Result<(), MeshError> {
        for t in self.level_tetras(level)? {
            if self.is_regular(t)? && !self.tetra(t)?.is_marked_for_reg_ref() {
                self.close(t)?;
            }
        }
        log::trace!("closed level {level}");
        Ok(())
    }

    /// Remove every child of `level` that its parent's new mark no longer needs.
    pub(crate) fn unrefine_grid(&mut self, level: usize) -> Result<(), MeshError> {
        let next = level + 1;
        {
            let l = self.level_mut(next)?;
            l.vertices.values_mut().for_each(|v| v.remove_mark = true);
            l.edges.values_mut().for_each(|e| e.remove_mark = true);
            l.faces.values_mut().for_each(|f| f.remove_mark = true);
        }

        for t in self.level_tetras(level)? {
            let tet = self.tetra(t)?;
            if tet.is_unrefined() {
                continue;
            }
            if tet.is_mark_eq_rule() {
                self.clear_all_remove_marks(t)?;
                continue;
            }
            let keep_rule = !(tet.is_marked_for_no_ref() || tet.is_marked_for_removal());
            for c in tet.children().to_vec() {
                self.tetra_mut(c)?.ref_mark = REMOVE_MARK;
            }
            if keep_rule {
                self.recycle_reusables(t)?;
            }
        }

        let doomed: Vec<_> = self
            .level_ref(next)?
            .tetras
            .iter()
            .filter(|(_, t)| t.is_marked_for_removal())
            .map(|(k, _)| TetraHandle::new(next, k))
            .collect();
        for &t in &doomed {
            self.unlink_from_faces(t)?;
        }
        let l = self.level_mut(next)?;
        for t in &doomed {
            l.tetras.remove(t.key);
        }

        // midpoints that are about to go away
        let stale_mids: Vec<_> = {
            let (lower, upper) = self.levels.split_at_mut(next);
            let upper = &upper[0];
            lower[level]
                .edges
                .iter()
                .filter_map(|(k, e)| {
                    let mid = e.mid_vertex?;
                    upper
                        .vertices
                        .get(mid.key)
                        .is_none_or(|v| v.remove_mark)
                        .then_some(k)
                })
                .collect()
        };
        let lower = self.level_mut(level)?;
        for k in stale_mids {
            if let Some(e) = lower.edges.get_mut(k) {
                e.mid_vertex = None;
            }
        }

        let l = self.level_mut(next)?;
        let before = (l.vertices.len(), l.edges.len(), l.faces.len());
        l.faces.retain(|_, f| !f.remove_mark);
        l.edges.retain(|_, e| !e.remove_mark);
        l.vertices.retain(|_, v| !v.remove_mark);
        log::debug!(
            "unrefined level {level}: removed {} tetras, {} faces, {} edges, {} vertices",
            doomed.len(),
            before.2 - l.faces.len(),
            before.1 - l.edges.len(),
            before.0 - l.vertices.len()
        );
        Ok(())
    }

    /// Apply the pending marks of `level`, creating level `level + 1` if needed.
    pub(crate) fn refine_grid(&mut self, level: usize) -> Result<(), MeshError> {
        if level == self.last_level() {
            self.append_level();
        }
        let next = level + 1;

        // survivors of the next level may be shared with newly refined tetras
        let (edges, faces): (Vec<_>, Vec<_>) = {
            let l = self.level_ref(next)?;
            (
                l.edges.iter().map(|(k, e)| (e.vertices, k)).collect(),
                l.faces.iter().map(|(k, f)| (f.vertices, k)).collect(),
            )
        };
        for (v, k) in edges {
            self.bins.recycle_edge(v, Handle::new(next, k));
        }
        for (v, k) in faces {
            self.bins.recycle_face(v, Handle::new(next, k));
        }

        let mut refined = 0usize;
        for t in self.level_tetras(level)? {
            if self.tetra(t)?.is_mark_eq_rule() {
                continue;
            }
            self.refine_tetra(t)?;
            refined += 1;
        }
        self.bins.destroy_all();
        log::debug!("refined level {level}: {refined} tetras changed rule");
        Ok(())
    }
}
