use rand::Rng;
use std::ops::{Mul, Sub};

use crate::error::{NetworkError, Result};

/// Dense row-major matrix backed by a single contiguous buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// # Panics
    /// If `rows * cols` overflows `usize`. Callers size it from matrices that
    /// already exist or from a validated `Architecture`.
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows.checked_mul(cols).expect("matrix element count overflows usize")],
        }
    }

    /// `rows * cols`, or `TooLarge` if that many `f64`s cannot be allocated.
    pub fn checked_len(rows: usize, cols: usize) -> Result<usize> {
        rows.checked_mul(cols)
            .filter(|&n| n <= isize::MAX as usize / std::mem::size_of::<f64>())
            .ok_or(NetworkError::TooLarge { rows, cols })
    }

    /// Wraps an existing row-major buffer. `data.len()` must equal `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Matrix> {
        let len = Matrix::checked_len(rows, cols)?;
        if data.len() != len {
            return Err(NetworkError::shape("matrix buffer length", len, data.len()));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a matrix from nested rows. Every row must have the length of the first.
    /// An empty outer vector yields a 0x0 matrix.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(NetworkError::shape(format!("row {i} length"), n_cols, row.len()));
        }
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            data.extend(row);
        }
        Ok(Matrix {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    /// Single-row matrix, used for bias vectors.
    pub fn row_vector(values: Vec<f64>) -> Matrix {
        Matrix {
            rows: 1,
            cols: values.len(),
            data: values,
        }
    }

    /// Xavier (Glorot) uniform initialization: every element is drawn from
    /// U(-limit, limit) with `limit = sqrt(6 / (rows + cols))`.
    ///
    /// Shape: (rows, cols) = (fan_in, fan_out).
    pub fn xavier_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Matrix> {
        let len = Matrix::checked_len(rows, cols)?;
        let limit = (6.0 / (rows as f64 + cols as f64)).sqrt();
        let data = (0..len)
            .map(|_| rng.gen_range(-limit..=limit))
            .collect();
        Ok(Matrix { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        let start = row * self.cols;
        &mut self.data[start..start + self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, and a 0-column matrix still has `rows` empty rows.
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Copies the matrix out as nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.iter_rows().map(|r| r.to_vec()).collect()
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Adds a (1, cols) row vector to every row.
    pub fn add_row_broadcast(&self, row: &Matrix) -> Matrix {
        assert_eq!(row.rows, 1, "broadcast operand must be a row vector");
        assert_eq!(row.cols, self.cols, "Matrices are of incorrect sizes");
        let mut res = self.clone();
        for r in 0..res.rows {
            for (x, b) in res.row_mut(r).iter_mut().zip(&row.data) {
                *x += b;
            }
        }
        res
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn hadamard(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.shape(), rhs.shape(), "Matrices are of incorrect sizes");
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a * b).collect(),
        }
    }

    /// Sums every column, producing a (1, cols) row vector.
    pub fn column_sum(&self) -> Matrix {
        let mut sums = vec![0.0; self.cols];
        for row in self.iter_rows() {
            for (s, x) in sums.iter_mut().zip(row) {
                *s += x;
            }
        }
        Matrix::row_vector(sums)
    }

    /// In place `self -= factor * rhs`.
    pub fn sub_scaled_assign(&mut self, rhs: &Matrix, factor: f64) {
        assert_eq!(self.shape(), rhs.shape(), "Matrices are of incorrect sizes");
        for (x, g) in self.data.iter_mut().zip(&rhs.data) {
            *x -= factor * g;
        }
    }

    /// Column index of the largest value in each row. Ties resolve to the first index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.iter_rows().map(argmax).collect()
    }
}

/// Index of the maximum element in a slice; 0 for an empty slice.
pub fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in v.iter().enumerate().skip(1) {
        if x > v[best] {
            best = i;
        }
    }
    best
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }

        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect(),
        }
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                let rhs_row = &rhs.data[k * rhs.cols..(k + 1) * rhs.cols];
                let out_row = &mut res.data[i * rhs.cols..(i + 1) * rhs.cols];
                for (o, b) in out_row.iter_mut().zip(rhs_row) {
                    *o += a * b;
                }
            }
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            NetworkError::ShapeMismatch { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn matmul_matches_hand_computation() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(vec![vec![5.0, 6.0, 7.0], vec![8.0, 9.0, 10.0]]);
        let c = &a * &b;
        assert_eq!(c.to_rows(), vec![vec![21.0, 24.0, 27.0], vec![47.0, 54.0, 61.0]]);
    }

    #[test]
    fn transpose_swaps_axes() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.to_rows(), vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
    }

    #[test]
    fn broadcast_and_column_sum() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::row_vector(vec![10.0, 20.0]);
        let c = a.add_row_broadcast(&b);
        assert_eq!(c.to_rows(), vec![vec![11.0, 22.0], vec![13.0, 24.0]]);
        assert_eq!(c.column_sum().to_rows(), vec![vec![24.0, 46.0]]);
    }

    #[test]
    fn sub_scaled_assign_updates_in_place() {
        let mut a = m(vec![vec![1.0, 1.0]]);
        a.sub_scaled_assign(&m(vec![vec![2.0, -4.0]]), 0.5);
        assert_eq!(a.as_slice(), &[0.0, 3.0]);
    }

    #[test]
    fn xavier_uniform_stays_within_limit() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = Matrix::xavier_uniform(4, 2, &mut rng).unwrap();
        let limit = (6.0_f64 / 6.0).sqrt();
        assert_eq!(w.shape(), (4, 2));
        assert!(w.as_slice().iter().all(|x| x.abs() <= limit));
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn oversized_shapes_are_errors() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            Matrix::xavier_uniform(2, 1 << 62, &mut rng),
            Err(NetworkError::TooLarge { .. })
        ));
        assert!(Matrix::checked_len(usize::MAX, 2).is_err());
        assert!(Matrix::from_vec(usize::MAX, usize::MAX, vec![]).is_err());
    }

    #[test]
    fn ragged_rows_fail_before_allocating() {
        let mut rows = vec![vec![0.0; 1_000]];
        rows.extend(std::iter::repeat(Vec::new()).take(100_000));
        assert!(matches!(
            Matrix::from_rows(rows),
            Err(NetworkError::ShapeMismatch { expected: 1_000, actual: 0, .. })
        ));
    }

    #[test]
    fn matmul_propagates_nan_through_zeros() {
        let a = m(vec![vec![0.0, 1.0]]);
        let b = m(vec![vec![f64::NAN], vec![2.0]]);
        assert!((&a * &b).get(0, 0).is_nan());
    }
}
