use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::Color;
use crate::error::{QuiltError, Result};

// ============================================================================
// LAYOUT
// ============================================================================

/// Shape of the quilt: how many squares, how many columns, pixels per side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuiltLayout {
    pub squares: usize,
    pub columns: usize,
    pub grid_size: usize,
}

impl QuiltLayout {
    /// 30 squares, 5 columns, 15×15.
    pub const fn classic() -> Self {
        Self { squares: 30, columns: 5, grid_size: 15 }
    }

    /// 36 squares, 6 columns, 16×16.
    pub const fn grid36() -> Self {
        Self { squares: 36, columns: 6, grid_size: 16 }
    }

    /// 48 squares, 6 columns, 15×15.
    pub const fn grid48() -> Self {
        Self { squares: 48, columns: 6, grid_size: 15 }
    }

    pub fn builder() -> QuiltLayoutBuilder {
        QuiltLayoutBuilder::default()
    }

    /// Look up a preset by name (`classic`, `grid36`, `grid48`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" | "grid30" => Some(Self::classic()),
            "grid36" => Some(Self::grid36()),
            "grid48" => Some(Self::grid48()),
            _ => None,
        }
    }

    /// Name of the matching preset, if any.
    pub fn preset_name(&self) -> Option<&'static str> {
        match *self {
            l if l == Self::classic() => Some("classic"),
            l if l == Self::grid36() => Some("grid36"),
            l if l == Self::grid48() => Some("grid48"),
            _ => None,
        }
    }

    pub fn rows(&self) -> usize {
        self.squares.div_ceil(self.columns)
    }

    /// Grid adjacency for the square at `index`.
    pub fn neighbors(&self, index: usize) -> Neighbors {
        let cols = self.columns;
        let total = self.squares;
        if index >= total {
            return Neighbors::default();
        }

        let top = (index >= cols).then(|| index - cols);
        let bottom = (index + cols < total).then(|| index + cols);
        let left = (index % cols != 0).then(|| index - 1);
        let right = ((index + 1) % cols != 0 && index + 1 < total).then(|| index + 1);

        Neighbors {
            top,
            bottom,
            left,
            right,
            top_left: (top.is_some() && left.is_some()).then(|| index - cols - 1),
            top_right: (top.is_some() && right.is_some()).then(|| index - cols + 1),
            bottom_left: (bottom.is_some() && left.is_some()).then(|| index + cols - 1),
            // Last row may be ragged: the diagonal must exist too
            bottom_right: (bottom.is_some() && right.is_some() && index + cols + 1 < total)
                .then(|| index + cols + 1),
        }
    }
}

impl Default for QuiltLayout {
    fn default() -> Self {
        Self::grid48()
    }
}

#[derive(Clone, Debug)]
pub struct QuiltLayoutBuilder {
    layout: QuiltLayout,
}

impl Default for QuiltLayoutBuilder {
    fn default() -> Self {
        Self { layout: QuiltLayout::default() }
    }
}

impl QuiltLayoutBuilder {
    pub fn squares(mut self, squares: usize) -> Self {
        self.layout.squares = squares;
        self
    }

    pub fn columns(mut self, columns: usize) -> Self {
        self.layout.columns = columns;
        self
    }

    pub fn grid_size(mut self, grid_size: usize) -> Self {
        self.layout.grid_size = grid_size;
        self
    }

    pub fn build(self) -> Result<QuiltLayout> {
        let l = self.layout;
        if l.squares == 0 || l.columns == 0 || l.grid_size == 0 {
            return Err(QuiltError::invalid(format!(
                "layout dimensions must be non-zero (squares={}, columns={}, grid_size={})",
                l.squares, l.columns, l.grid_size
            )));
        }
        Ok(l)
    }
}

/// Indices of the 8 surrounding squares.  Diagonals exist only when both
/// contributing orthogonal neighbors exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub top: Option<usize>,
    pub bottom: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub top_left: Option<usize>,
    pub top_right: Option<usize>,
    pub bottom_left: Option<usize>,
    pub bottom_right: Option<usize>,
}

// ============================================================================
// PIXEL GRID (one square)
// ============================================================================

/// N×N pixels, row-major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelGrid {
    size: usize,
    pixels: Vec<Color>,
}

impl PixelGrid {
    pub fn filled(size: usize, color: Color) -> Self {
        Self {
            size,
            pixels: vec![color; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.size && col < self.size
    }

    fn check(&self, row: usize, col: usize) -> Result<usize> {
        if self.in_bounds(row, col) {
            Ok(row * self.size + col)
        } else {
            Err(QuiltError::invalid(format!(
                "pixel ({}, {}) outside {}×{} grid",
                row, col, self.size, self.size
            )))
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<Color> {
        let idx = self.check(row, col)?;
        Ok(self.pixels[idx])
    }

    pub fn set(&mut self, row: usize, col: usize, color: Color) -> Result<()> {
        let idx = self.check(row, col)?;
        self.pixels[idx] = color;
        Ok(())
    }

    /// Unchecked read for callers that already iterate within bounds.
    #[inline]
    pub(crate) fn at(&self, row: usize, col: usize) -> Color {
        self.pixels[row * self.size + col]
    }

    #[inline]
    pub(crate) fn put(&mut self, row: usize, col: usize, color: Color) {
        self.pixels[row * self.size + col] = color;
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    pub fn is_uniform(&self, color: Color) -> bool {
        self.pixels.iter().all(|p| *p == color)
    }

    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Color]> {
        self.pixels.chunks(self.size)
    }

    pub fn from_rows(rows: Vec<Vec<Color>>) -> Result<Self> {
        let size = rows.len();
        let mut pixels = Vec::with_capacity(size * size);
        for (r, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(QuiltError::shape(format!(
                    "row {} has {} columns, expected {}",
                    r,
                    row.len(),
                    size
                )));
            }
            pixels.extend(row);
        }
        Ok(Self { size, pixels })
    }

    pub fn to_value(&self) -> Value {
        Value::Array(
            self.rows()
                .map(|row| Value::Array(row.iter().map(|c| Value::String(c.to_hex())).collect()))
                .collect(),
        )
    }

    /// Parse one square from its store form, reporting the square index in errors.
    pub fn from_value(value: &Value, expected: usize, square: usize) -> Result<Self> {
        let rows = value
            .as_array()
            .ok_or_else(|| QuiltError::shape(format!("Square {} is not an array", square)))?;
        if rows.len() != expected {
            return Err(QuiltError::shape(format!(
                "Square {} has {} rows, expected {}",
                square,
                rows.len(),
                expected
            )));
        }
        let mut pixels = Vec::with_capacity(expected * expected);
        for (r, row) in rows.iter().enumerate() {
            let cols = row.as_array().ok_or_else(|| {
                QuiltError::shape(format!("Square {}, row {} is not an array", square, r))
            })?;
            if cols.len() != expected {
                return Err(QuiltError::shape(format!(
                    "Square {}, row {} has {} columns, expected {}",
                    square,
                    r,
                    cols.len(),
                    expected
                )));
            }
            for (c, cell) in cols.iter().enumerate() {
                let text = cell.as_str().ok_or_else(|| {
                    QuiltError::shape(format!(
                        "Square {}, row {}, col {} is not a color string",
                        square, r, c
                    ))
                })?;
                let color = Color::parse(text).map_err(|e| {
                    QuiltError::shape(format!("Square {}, row {}, col {}: {}", square, r, c, e))
                })?;
                pixels.push(color);
            }
        }
        Ok(Self { size: expected, pixels })
    }
}

// ============================================================================
// QUILT
// ============================================================================

/// The full ordered collection of squares.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quilt {
    columns: usize,
    grid_size: usize,
    squares: Vec<PixelGrid>,
}

impl Quilt {
    /// Every square filled with the background color.
    pub fn blank(layout: QuiltLayout) -> Self {
        Self {
            columns: layout.columns,
            grid_size: layout.grid_size,
            squares: vec![PixelGrid::filled(layout.grid_size, Color::BACKGROUND); layout.squares],
        }
    }

    /// Current layout; the square count tracks the data, not the preset.
    pub fn layout(&self) -> QuiltLayout {
        QuiltLayout {
            squares: self.squares.len(),
            columns: self.columns,
            grid_size: self.grid_size,
        }
    }

    pub fn len(&self) -> usize {
        self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn squares(&self) -> &[PixelGrid] {
        &self.squares
    }

    pub fn square(&self, index: usize) -> Result<&PixelGrid> {
        self.squares.get(index).ok_or_else(|| {
            QuiltError::invalid(format!(
                "square {} out of range (quilt has {})",
                index,
                self.squares.len()
            ))
        })
    }

    pub fn neighbors(&self, index: usize) -> Neighbors {
        self.layout().neighbors(index)
    }

    /// Replace the square at `index`.  The new grid must have the quilt's size.
    pub fn replace(&mut self, index: usize, pixels: PixelGrid) -> Result<()> {
        if pixels.size() != self.grid_size {
            return Err(QuiltError::invalid(format!(
                "square is {}×{}, quilt expects {}×{}",
                pixels.size(),
                pixels.size(),
                self.grid_size,
                self.grid_size
            )));
        }
        let len = self.squares.len();
        let slot = self.squares.get_mut(index).ok_or_else(|| {
            QuiltError::invalid(format!("square {} out of range (quilt has {})", index, len))
        })?;
        *slot = pixels;
        Ok(())
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.squares.iter().map(PixelGrid::to_value).collect())
    }

    /// Structural check for quilts that did not come through `from_value`,
    /// such as a decoded cache file.
    pub fn validate(&self) -> Result<()> {
        if self.columns == 0 || self.grid_size == 0 {
            return Err(QuiltError::shape(format!(
                "quilt has {} columns of {}×{} squares",
                self.columns, self.grid_size, self.grid_size
            )));
        }
        for (i, square) in self.squares.iter().enumerate() {
            if square.size != self.grid_size {
                return Err(QuiltError::shape(format!(
                    "Square {} is {}×{}, expected {}×{}",
                    i, square.size, square.size, self.grid_size, self.grid_size
                )));
            }
            if square.pixels.len() != square.size * square.size {
                return Err(QuiltError::shape(format!(
                    "Square {} holds {} pixels, expected {}",
                    i,
                    square.pixels.len(),
                    square.size * square.size
                )));
            }
        }
        Ok(())
    }

    /// Parse the store form of `squares`, validating every square as N×N.
    pub fn from_value(value: &Value, columns: usize, grid_size: usize) -> Result<Self> {
        let list = value
            .as_array()
            .ok_or_else(|| QuiltError::shape("Data is not an array"))?;
        let squares = list
            .iter()
            .enumerate()
            .map(|(i, sq)| PixelGrid::from_value(sq, grid_size, i))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            grid_size,
            squares,
        })
    }
}

#[cfg(test)]
impl Quilt {
    /// Build a quilt without any shape checks, as a corrupt decoder would.
    pub(crate) fn from_parts_unchecked(
        columns: usize,
        grid_size: usize,
        squares: Vec<(usize, Vec<Color>)>,
    ) -> Self {
        Self {
            columns,
            grid_size,
            squares: squares
                .into_iter()
                .map(|(size, pixels)| PixelGrid { size, pixels })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn neighbors_follow_column_wrap_rules() {
        let layout = QuiltLayout::classic(); // 5 columns, 30 squares
        let n = layout.neighbors(0);
        assert_eq!(n.top, None);
        assert_eq!(n.left, None);
        assert_eq!(n.right, Some(1));
        assert_eq!(n.bottom, Some(5));
        assert_eq!(n.bottom_right, Some(6));
        assert_eq!(n.top_left, None);

        let n = layout.neighbors(4);
        assert_eq!(n.right, None, "rightmost column has no right neighbor");
        assert_eq!(n.bottom_left, Some(8));

        let n = layout.neighbors(27);
        assert_eq!(n.bottom, None);
        assert_eq!(n.top, Some(22));
        assert_eq!(n.top_left, Some(21));
        assert_eq!(n.top_right, Some(23));
    }

    #[test]
    fn builder_rejects_zero_dimensions() {
        assert!(QuiltLayout::builder().columns(0).build().is_err());
        let layout = QuiltLayout::builder().squares(12).columns(4).grid_size(8).build().unwrap();
        assert_eq!(layout.rows(), 3);
    }

    #[test]
    fn pixel_access_is_bounds_checked() {
        let mut grid = PixelGrid::filled(4, Color::BACKGROUND);
        assert!(grid.set(4, 0, Color::BLACK).is_err());
        assert!(matches!(grid.get(0, 9), Err(QuiltError::InvalidArgument { .. })));
        grid.set(3, 3, Color::BLACK).unwrap();
        assert_eq!(grid.get(3, 3).unwrap(), Color::BLACK);
    }

    #[test]
    fn store_form_round_trips_with_normalized_colors() {
        let value = json!([[["#ff0000", "rgb(0, 0, 0)"], ["#F5EFEE", "#F5EFEE"]]]);
        let quilt = Quilt::from_value(&value, 1, 2).unwrap();
        assert_eq!(quilt.square(0).unwrap().get(0, 1).unwrap(), Color::BLACK);
        assert_eq!(
            quilt.to_value(),
            json!([[["#FF0000", "#000000"], ["#F5EFEE", "#F5EFEE"]]])
        );
    }

    #[test]
    fn validation_names_square_and_row() {
        let value = json!([[["#000000", "#000000"], ["#000000"]]]);
        let err = Quilt::from_value(&value, 1, 2).unwrap_err().to_string();
        assert!(err.contains("Square 0, row 1 has 1 columns, expected 2"), "{}", err);

        let value = json!([[["#000000", "#000000"]]]);
        let err = Quilt::from_value(&value, 1, 2).unwrap_err().to_string();
        assert!(err.contains("Square 0 has 1 rows, expected 2"), "{}", err);
    }

    #[test]
    fn replace_rejects_mismatched_size() {
        let mut quilt = Quilt::blank(QuiltLayout::classic());
        assert!(quilt.replace(0, PixelGrid::filled(16, Color::BLACK)).is_err());
        assert!(quilt.replace(30, PixelGrid::filled(15, Color::BLACK)).is_err());
        quilt.replace(29, PixelGrid::filled(15, Color::BLACK)).unwrap();
        assert!(quilt.square(29).unwrap().is_uniform(Color::BLACK));
    }

    #[test]
    fn validate_catches_what_decoding_skips() {
        assert!(Quilt::blank(QuiltLayout::classic()).validate().is_ok());

        let short = Quilt::from_parts_unchecked(5, 15, vec![(15, vec![Color::BLACK; 3])]);
        let err = short.validate().unwrap_err().to_string();
        assert!(err.contains("Square 0 holds 3 pixels, expected 225"), "{}", err);

        let wrong_size = Quilt::from_parts_unchecked(5, 15, vec![(16, vec![Color::BLACK; 256])]);
        assert!(wrong_size.validate().is_err());

        let no_columns = Quilt::from_parts_unchecked(0, 15, vec![(15, vec![Color::BLACK; 225])]);
        assert!(no_columns.validate().is_err());

        let empty_squares = Quilt::from_parts_unchecked(5, 0, vec![(0, Vec::new())]);
        assert!(empty_squares.validate().is_err());
    }
}
