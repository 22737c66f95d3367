//! Grid geometry of layout items
//!
//! Sizes are expressed in grid columns (out of [`GRID_COLUMNS`]) and grid rows.
//! Only the `xl` size is mandatory; the smaller breakpoints fall back to an
//! implicit size derived from the `xl` width.

use serde::{Deserialize, Serialize};

use super::Item;

/// Number of columns in one grid row
pub const GRID_COLUMNS: u32 = 12;

/// Screen breakpoints, widest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScreenSize {
    Xl,
    Lg,
    Md,
    Sm,
    Xs,
}

impl ScreenSize {
    pub const ALL: [ScreenSize; 5] = [
        ScreenSize::Xl,
        ScreenSize::Lg,
        ScreenSize::Md,
        ScreenSize::Sm,
        ScreenSize::Xs,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSize {
    pub grid_width: u32,
    /// `None` lets the renderer pick a height from the widget type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_height: Option<u32>,
}

impl GridSize {
    pub fn new(grid_width: u32, grid_height: Option<u32>) -> Self {
        Self { grid_width, grid_height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSize {
    pub xl: GridSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lg: Option<GridSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md: Option<GridSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm: Option<GridSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xs: Option<GridSize>,
}

impl ItemSize {
    /// Size with only the mandatory `xl` breakpoint set
    pub fn xl(grid_width: u32, grid_height: Option<u32>) -> Self {
        Self {
            xl: GridSize::new(grid_width, grid_height),
            lg: None,
            md: None,
            sm: None,
            xs: None,
        }
    }

    fn explicit(&self, screen: ScreenSize) -> Option<GridSize> {
        match screen {
            ScreenSize::Xl => Some(self.xl),
            ScreenSize::Lg => self.lg,
            ScreenSize::Md => self.md,
            ScreenSize::Sm => self.sm,
            ScreenSize::Xs => self.xs,
        }
    }

    /// Size for `screen`: the explicit size when set, otherwise the implicit one
    pub fn for_screen(&self, screen: ScreenSize) -> GridSize {
        self.explicit(screen).unwrap_or_else(|| GridSize {
            grid_width: implicit_width(self.xl.grid_width, screen),
            grid_height: self.xl.grid_height,
        })
    }
}

/// Implicit width at `screen` for an item that is `xl_width` columns wide on xl
pub fn implicit_width(xl_width: u32, screen: ScreenSize) -> u32 {
    let (md, sm, xs) = match xl_width {
        0 => (0, 0, 0),
        1 => (2, 6, 12),
        2 => (4, 6, 12),
        3..=9 => (6, 12, 12),
        _ => (12, 12, 12),
    };
    match screen {
        ScreenSize::Xl | ScreenSize::Lg => xl_width.min(GRID_COLUMNS),
        ScreenSize::Md => md,
        ScreenSize::Sm => sm,
        ScreenSize::Xs => xs,
    }
}

/// Split items into the grid rows they occupy at `screen`.
///
/// An item that does not fit in what is left of the current row starts a new one.
/// Rows hold indices into `items`.
pub fn rendered_rows(items: &[Item], screen: ScreenSize) -> Vec<Vec<usize>> {
    let mut rows: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut used = 0;

    for (index, item) in items.iter().enumerate() {
        let width = item.size.for_screen(screen).grid_width.min(GRID_COLUMNS);
        if used + width > GRID_COLUMNS && !current.is_empty() {
            rows.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(index);
        used += width;
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}
