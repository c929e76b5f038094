use std::collections::HashSet;

use nalgebra::Vector3;

/// Sentinel marking an empty list slot or a missing link.
pub const NIL: usize = usize::MAX;

/// Cell-list partition of the cubic box.
///
/// The box is divided into `blocks_per_side^3` cubic cells of side
/// `cell_size >= r_cut`, so every pair within the cutoff lives in the
/// same cell or in adjacent cells. Cell membership is an index-based
/// linked list: `head`/`tail` per cell point into the shared `next`
/// array (one slot per atom). Removal unlinks through the predecessor,
/// which the traversal in the drift phase already has in hand;
/// `cell_of` records each atom's current cell for queries that do not
/// traverse.
///
/// Cross-cell moves go through a staging protocol: during the drift
/// phase outgoing atoms are appended to a per-destination staging
/// sublist instead of the destination's live list, and all staged
/// sublists are spliced onto their destinations at a single commit
/// point. Between commits the staging lists are empty. The live lists
/// are therefore never mutated while the force pass reads them, and a
/// migrated atom is never drifted twice in one step.
#[derive(Debug, Clone)]
pub struct CellGrid {
    pub blocks_per_side: usize,
    pub cell_size: f64,
    box_len: f64,
    head: Vec<usize>,
    tail: Vec<usize>,
    next: Vec<usize>,
    cell_of: Vec<usize>,
    stage_head: Vec<usize>,
    stage_tail: Vec<usize>,
    /// Destinations touched since the last commit, so the commit walks
    /// only the staged cells.
    staged_cells: Vec<usize>,
    /// Unordered neighbor cell pairs, each listed exactly once.
    neighbor_pairs: Vec<(usize, usize)>,
    /// Total cross-cell migrations committed so far.
    transfers: u64,
}

impl CellGrid {
    /// Partition a cubic box of edge `box_len` into cells of side at
    /// least `r_cut`.
    ///
    /// Requires at least two cells per side: below that the minimum-image
    /// convention no longer bounds every pair to a single periodic image
    /// within the cutoff.
    pub fn new(box_len: f64, r_cut: f64, n_atoms: usize) -> Result<Self, String> {
        if r_cut <= 0.0 {
            return Err("cutoff radius must be positive".to_string());
        }
        let blocks_per_side = (box_len / r_cut).floor() as usize;
        if blocks_per_side < 2 {
            return Err(format!(
                "box edge {box_len} spans fewer than two cells of the cutoff radius {r_cut}"
            ));
        }
        let n_cells = blocks_per_side.pow(3);
        let cell_size = box_len / blocks_per_side as f64;
        let neighbor_pairs = build_neighbor_pairs(blocks_per_side);
        Ok(CellGrid {
            blocks_per_side,
            cell_size,
            box_len,
            head: vec![NIL; n_cells],
            tail: vec![NIL; n_cells],
            next: vec![NIL; n_atoms],
            cell_of: vec![NIL; n_atoms],
            stage_head: vec![NIL; n_cells],
            stage_tail: vec![NIL; n_cells],
            staged_cells: Vec::new(),
            neighbor_pairs,
            transfers: 0,
        })
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.head.len()
    }

    /// Linear index of the cell at grid coordinate (i, j, k), wrapping
    /// periodically.
    #[inline]
    pub fn cell_index(&self, i: isize, j: isize, k: isize) -> usize {
        let b = self.blocks_per_side as isize;
        let (i, j, k) = (i.rem_euclid(b), j.rem_euclid(b), k.rem_euclid(b));
        ((i * b + j) * b + k) as usize
    }

    /// Cell owning a wrapped position.
    #[inline]
    pub fn cell_of_position(&self, r: &Vector3<f64>) -> usize {
        let i = (r.x / self.cell_size).floor() as isize;
        let j = (r.y / self.cell_size).floor() as isize;
        let k = (r.z / self.cell_size).floor() as isize;
        self.cell_index(i, j, k)
    }

    /// Cell an atom currently belongs to.
    #[inline]
    pub fn cell_of(&self, atom: usize) -> usize {
        self.cell_of[atom]
    }

    #[inline]
    pub fn head(&self, cell: usize) -> usize {
        self.head[cell]
    }

    #[inline]
    pub fn next_of(&self, atom: usize) -> usize {
        self.next[atom]
    }

    pub fn transfers(&self) -> u64 {
        self.transfers
    }

    pub fn neighbor_pairs(&self) -> &[(usize, usize)] {
        &self.neighbor_pairs
    }

    /// Iterate over the atoms resident in a cell.
    pub fn cell_atoms(&self, cell: usize) -> CellAtoms<'_> {
        CellAtoms {
            cursor: self.head[cell],
            next: &self.next,
        }
    }

    /// Assign every atom to its owning cell from scratch.
    pub fn rebuild(&mut self, positions: &[Vector3<f64>]) {
        self.head.fill(NIL);
        self.tail.fill(NIL);
        self.next.fill(NIL);
        for (atom, r) in positions.iter().enumerate() {
            let cell = self.cell_of_position(r);
            self.append(cell, atom);
        }
    }

    /// O(1) append of an atom to a cell's live list.
    pub fn append(&mut self, cell: usize, atom: usize) {
        self.next[atom] = NIL;
        if self.head[cell] == NIL {
            self.head[cell] = atom;
        } else {
            self.next[self.tail[cell]] = atom;
        }
        self.tail[cell] = atom;
        self.cell_of[atom] = cell;
    }

    /// O(1) unlink of an atom given its predecessor in the list
    /// (`None` removes the head).
    pub fn remove(&mut self, cell: usize, atom: usize, prev: Option<usize>) {
        match prev {
            None => self.head[cell] = self.next[atom],
            Some(p) => self.next[p] = self.next[atom],
        }
        if self.tail[cell] == atom {
            self.tail[cell] = prev.unwrap_or(NIL);
        }
        self.next[atom] = NIL;
    }

    /// Start a migration phase. Staging lists must be empty at every
    /// step boundary.
    pub fn begin_migration(&mut self) {
        debug_assert!(self.staged_cells.is_empty());
        self.staged_cells.clear();
    }

    /// Stage an atom, already unlinked from its source cell, for splice
    /// onto `to_cell` at the next commit.
    pub fn stage_handoff(&mut self, to_cell: usize, atom: usize) {
        self.next[atom] = NIL;
        if self.stage_head[to_cell] == NIL {
            self.stage_head[to_cell] = atom;
            self.staged_cells.push(to_cell);
        } else {
            self.next[self.stage_tail[to_cell]] = atom;
        }
        self.stage_tail[to_cell] = atom;
        self.cell_of[atom] = to_cell;
        self.transfers += 1;
    }

    /// Splice every staged sublist onto its destination's live list,
    /// one O(1) splice per touched cell, and clear the staging state.
    pub fn commit_migrations(&mut self) {
        for idx in 0..self.staged_cells.len() {
            let cell = self.staged_cells[idx];
            let sub_head = self.stage_head[cell];
            let sub_tail = self.stage_tail[cell];
            if self.head[cell] == NIL {
                self.head[cell] = sub_head;
            } else {
                self.next[self.tail[cell]] = sub_head;
            }
            self.tail[cell] = sub_tail;
            self.stage_head[cell] = NIL;
            self.stage_tail[cell] = NIL;
        }
        self.staged_cells.clear();
    }

    /// Check that the cell lists partition the atom set exactly: every
    /// atom appears in exactly one list, and list membership agrees with
    /// `cell_of`. Intended for tests and debugging, not the hot path.
    pub fn validate_partition(&self, n_atoms: usize) -> Result<(), String> {
        let mut seen = vec![false; n_atoms];
        for cell in 0..self.n_cells() {
            for atom in self.cell_atoms(cell) {
                if atom >= n_atoms {
                    return Err(format!("cell {cell} links to out-of-range atom {atom}"));
                }
                if seen[atom] {
                    return Err(format!("atom {atom} appears in more than one cell list"));
                }
                seen[atom] = true;
                if self.cell_of[atom] != cell {
                    return Err(format!(
                        "atom {atom} is listed in cell {cell} but cell_of says {}",
                        self.cell_of[atom]
                    ));
                }
            }
        }
        if let Some(atom) = seen.iter().position(|&s| !s) {
            return Err(format!("atom {atom} is missing from every cell list"));
        }
        if !self.staged_cells.is_empty() {
            return Err("staging lists are not empty at a step boundary".to_string());
        }
        Ok(())
    }
}

/// Iterator over the atoms of one cell list.
#[derive(Debug, Clone)]
pub struct CellAtoms<'a> {
    cursor: usize,
    next: &'a [usize],
}

impl Iterator for CellAtoms<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == NIL {
            None
        } else {
            let atom = self.cursor;
            self.cursor = self.next[atom];
            Some(atom)
        }
    }
}

/// Enumerate every unordered pair of adjacent cells exactly once.
///
/// Each cell looks at the 13 forward neighbors of the half stencil;
/// periodic wrap at small grids can map two offsets onto the same
/// neighbor (or make a pair reachable from both sides), so the wrapped
/// pairs are deduplicated once here and the force pass just walks the
/// list.
fn build_neighbor_pairs(blocks_per_side: usize) -> Vec<(usize, usize)> {
    let b = blocks_per_side as isize;
    let linear = |i: isize, j: isize, k: isize| {
        ((i.rem_euclid(b) * b + j.rem_euclid(b)) * b + k.rem_euclid(b)) as usize
    };
    // Offsets lexicographically above (0,0,0): half of the 26 neighbors.
    let mut offsets = Vec::with_capacity(13);
    for di in 0..=1isize {
        for dj in -1..=1isize {
            for dk in -1..=1isize {
                if (di, dj, dk) > (0, 0, 0) {
                    offsets.push((di, dj, dk));
                }
            }
        }
    }
    let mut pairs = HashSet::new();
    for i in 0..b {
        for j in 0..b {
            for k in 0..b {
                let a = linear(i, j, k);
                for &(di, dj, dk) in &offsets {
                    let n = linear(i + di, j + dj, k + dk);
                    if n != a {
                        pairs.insert((a.min(n), a.max(n)));
                    }
                }
            }
        }
    }
    let mut pairs: Vec<_> = pairs.into_iter().collect();
    pairs.sort_unstable();
    pairs
}
