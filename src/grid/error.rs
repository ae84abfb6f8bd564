use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Grid has no cells")]
    Empty,

    #[error("Array '{array}' has {found} elements, expected {expected} for a {nx}x{ny} grid")]
    ShapeMismatch {
        array: &'static str,
        nx: usize,
        ny: usize,
        expected: usize,
        found: usize,
    },

    #[error("No grid cell has a usable coordinate")]
    NoValidCells,

    #[error("Grid cell at row {row}, column {col} has no wind data")]
    MissingData { row: usize, col: usize },

    #[error("Interpolation needs a grid projection, but the field has none")]
    NoProjection,

    #[error("Location ({lat}, {lon}) falls outside the grid")]
    OutsideGrid { lat: f64, lon: f64 },
}
