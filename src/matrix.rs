//! Small row-major matrix used for spectral data.
//!
//! Rows are frequency bands (lowest first), columns are time frames. Kept
//! deliberately minimal; only the operations the pipeline needs.

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn from_rows(rows_data: Vec<Vec<f64>>) -> Self {
        let rows = rows_data.len();
        let cols = rows_data.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(rows * cols);
        for row in &rows_data {
            debug_assert_eq!(row.len(), cols);
            data.extend_from_slice(row);
        }
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, f64> {
        self.data.iter_mut()
    }

    pub fn min_value(&self) -> f64 {
        self.data.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// Element-wise product with a matrix of identical shape.
    pub fn hadamard(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .collect();
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        }
    }

    /// Arithmetic mean of each row.
    pub fn row_means(&self) -> Vec<f64> {
        (0..self.rows)
            .map(|r| self.row(r).iter().sum::<f64>() / self.cols as f64)
            .collect()
    }

    /// Sample standard deviation of each row (n - 1 normalization).
    pub fn row_stddevs(&self) -> Vec<f64> {
        (0..self.rows)
            .map(|r| {
                let row = self.row(r);
                if row.len() < 2 {
                    return 0.0;
                }
                let mean = row.iter().sum::<f64>() / row.len() as f64;
                let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                    / (row.len() - 1) as f64;
                var.max(0.0).sqrt()
            })
            .collect()
    }

    /// Rectangular sub-matrix of columns [start, end] (inclusive), with
    /// columns outside the valid range filled with zeros. Negative starts are
    /// allowed so that a window may begin before the data does.
    pub fn columns_padded(&self, start: isize, end: isize) -> Matrix {
        let out_cols = (end - start + 1).max(0) as usize;
        let mut out = Matrix::zeros(self.rows, out_cols);
        for (out_col, col) in (start..=end).enumerate() {
            if col < 0 || col >= self.cols as isize {
                continue;
            }
            for row in 0..self.rows {
                out.set(row, out_col, self.get(row, col as usize));
            }
        }
        out
    }
}
