use crate::rows::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// Row boundary policy. Both flavors refuse to move focus past the edge
/// (there is no wrap-around); `Trapped` marks the rows that do so as an
/// explicit containment choice rather than a plain clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolicy {
    Trapped,
    Clamped,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FocusState {
    #[default]
    NoFocus,
    Focused {
        item_id: String,
        row: usize,
        col: usize,
    },
}

/// An out-of-range row/item index handed to the coordinator. This is a
/// bookkeeping defect in the caller, reported loudly; it is distinct from
/// the ordinary boundary no-op of directional input.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("focus index out of range: row {row}, item {col} (topology has {rows} rows)")]
pub struct FocusIndexError {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
}

/// Single source of truth for what has input focus on the browsing surface.
/// Views request transitions; they never mutate focus themselves.
pub struct FocusCoordinator {
    topology: Vec<RowTopology>,
    state: FocusState,
    selection_in_flight: bool,
}

struct RowTopology {
    item_ids: Vec<String>,
    edges: EdgePolicy,
}

impl Default for FocusCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusCoordinator {
    pub fn new() -> Self {
        Self {
            topology: Vec::new(),
            state: FocusState::NoFocus,
            selection_in_flight: false,
        }
    }

    pub fn state(&self) -> &FocusState {
        &self.state
    }

    pub fn focused(&self) -> Option<(usize, usize)> {
        match &self.state {
            FocusState::Focused { row, col, .. } => Some((*row, *col)),
            FocusState::NoFocus => None,
        }
    }

    pub fn focused_item_id(&self) -> Option<&str> {
        match &self.state {
            FocusState::Focused { item_id, .. } => Some(item_id),
            FocusState::NoFocus => None,
        }
    }

    /// Adopts a freshly published row sequence. Initial focus lands on the
    /// first item of the first row; republishing identical rows leaves focus
    /// where it was, and focus on an item that vanished falls back to the
    /// first item of the first row.
    pub fn on_content_loaded(&mut self, rows: &[Row]) {
        self.topology = build_topology(rows);
        self.selection_in_flight = false;

        if let FocusState::Focused { item_id, .. } = &self.state {
            if let Some((row, col)) = self.locate(item_id) {
                let item_id = item_id.clone();
                self.state = FocusState::Focused { item_id, row, col };
                return;
            }
        }

        self.state = self.first_item_focus();
    }

    /// Arbitrates one directional input. Returns whether focus moved; a
    /// boundary refusal is an ordinary `false`, not an error.
    pub fn on_directional_input(
        &mut self,
        direction: Direction,
    ) -> Result<bool, FocusIndexError> {
        let (row, col) = match self.focused() {
            Some(position) => position,
            None => return Ok(false),
        };
        self.check_position(row, col)?;

        let (target_row, target_col) = match direction {
            Direction::Left => {
                if col == 0 {
                    return Ok(false);
                }
                (row, col - 1)
            }
            Direction::Right => {
                if col + 1 >= self.topology[row].item_ids.len() {
                    return Ok(false);
                }
                (row, col + 1)
            }
            Direction::Up => {
                if row == 0 {
                    return Ok(false);
                }
                match self.nearest_in_row(row - 1, col) {
                    Some(target) => (row - 1, target),
                    None => return Ok(false),
                }
            }
            Direction::Down => {
                if row + 1 >= self.topology.len() {
                    return Ok(false);
                }
                match self.nearest_in_row(row + 1, col) {
                    Some(target) => (row + 1, target),
                    None => return Ok(false),
                }
            }
        };

        let item_id = self.topology[target_row].item_ids[target_col].clone();
        self.state = FocusState::Focused {
            item_id,
            row: target_row,
            col: target_col,
        };
        Ok(true)
    }

    /// Emits the focused item id as a selection without touching focus.
    /// A second activation for the same gesture is swallowed until the
    /// caller acknowledges the first with `selection_handled`.
    pub fn on_item_activated(&mut self) -> Option<String> {
        if self.selection_in_flight {
            return None;
        }
        let item_id = self.focused_item_id()?.to_string();
        self.selection_in_flight = true;
        Some(item_id)
    }

    pub fn selection_handled(&mut self) {
        self.selection_in_flight = false;
    }

    /// Places focus on an explicit position. Out-of-range positions are a
    /// caller defect and fail loudly.
    pub fn focus_item(&mut self, row: usize, col: usize) -> Result<(), FocusIndexError> {
        self.check_position(row, col)?;
        let item_id = self.topology[row].item_ids[col].clone();
        self.state = FocusState::Focused { item_id, row, col };
        Ok(())
    }

    pub fn edge_policy(&self, row: usize) -> Option<EdgePolicy> {
        self.topology.get(row).map(|topo| topo.edges)
    }

    fn check_position(&self, row: usize, col: usize) -> Result<(), FocusIndexError> {
        let out_of_range = self
            .topology
            .get(row)
            .map_or(true, |topo| col >= topo.item_ids.len());
        if out_of_range {
            return Err(FocusIndexError {
                row,
                col,
                rows: self.topology.len(),
            });
        }
        Ok(())
    }

    fn nearest_in_row(&self, row: usize, col: usize) -> Option<usize> {
        let len = self.topology[row].item_ids.len();
        if len == 0 {
            return None;
        }
        Some(col.min(len - 1))
    }

    fn locate(&self, item_id: &str) -> Option<(usize, usize)> {
        for (row, topo) in self.topology.iter().enumerate() {
            if let Some(col) = topo.item_ids.iter().position(|id| id == item_id) {
                return Some((row, col));
            }
        }
        None
    }

    fn first_item_focus(&self) -> FocusState {
        match self.topology.first() {
            Some(topo) if !topo.item_ids.is_empty() => FocusState::Focused {
                item_id: topo.item_ids[0].clone(),
                row: 0,
                col: 0,
            },
            _ => FocusState::NoFocus,
        }
    }
}

fn build_topology(rows: &[Row]) -> Vec<RowTopology> {
    let last = rows.len().saturating_sub(1);
    rows.iter()
        .enumerate()
        .map(|(index, row)| RowTopology {
            item_ids: row.items.iter().map(|item| item.id.clone()).collect(),
            // The outer rows trap focus so directional input cannot slide
            // off the browsing surface onto unrelated controls.
            edges: if index == 0 || index == last {
                EdgePolicy::Trapped
            } else {
                EdgePolicy::Clamped
            },
        })
        .collect()
}
