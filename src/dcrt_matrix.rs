/// Matrices of double-CRT polynomials
///
/// `DcrtMatrix` stores its entries row-major in a flat arena of owned slots.
/// Every entry is bound to the same `RingParams`; the shape is fixed after
/// construction and stacking or extraction always produces a new matrix.
///
/// Element access comes in three flavours:
/// - `get` borrows and returns `None` out of bounds
/// - `element` clones and fails with `IndexOutOfRange`
/// - `take` moves the entry out and leaves a zero polynomial of the same
///   format in the slot, so the matrix never holds an emptied element

use std::sync::Arc;

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use zeroize::Zeroize;

use crate::dcrt_poly::{DcrtPoly, Format};
use crate::error::{DcrtError, Result};
use crate::params::ParamsHandle;
use crate::sampling::Distribution;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DcrtMatrix {
    /// Ring shared by every entry
    params: ParamsHandle,

    /// Number of rows
    rows: usize,

    /// Number of columns
    cols: usize,

    /// Row-major entries, `rows * cols` long
    data: Vec<DcrtPoly>,
}

impl DcrtMatrix {
    /// Zero matrix with every entry in EVALUATION format.
    ///
    /// # Arguments
    /// * `params` - Ring the entries live in
    /// * `rows` - Number of rows (≥ 1)
    /// * `cols` - Number of columns (≥ 1)
    ///
    /// # Returns
    /// * `Result<Self>` - Zero matrix or `InvalidParameters` for an empty shape
    pub fn create(params: &ParamsHandle, rows: usize, cols: usize) -> Result<Self> {
        Self::zero(params, rows, cols, Format::Evaluation)
    }

    /// Zero matrix in the requested format.
    pub fn zero(params: &ParamsHandle, rows: usize, cols: usize, format: Format) -> Result<Self> {
        check_shape(rows, cols)?;
        Ok(Self {
            params: Arc::clone(params),
            rows,
            cols,
            data: vec![DcrtPoly::zero(params, format); rows * cols],
        })
    }

    /// Matrix with every entry drawn independently from `distribution`
    /// (EVALUATION format).
    pub fn sample<R: RngCore + CryptoRng>(
        params: &ParamsHandle,
        rows: usize,
        cols: usize,
        distribution: Distribution,
        rng: &mut R,
    ) -> Result<Self> {
        check_shape(rows, cols)?;
        let data = (0..rows * cols)
            .map(|_| DcrtPoly::sample(params, distribution, rng))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params: Arc::clone(params),
            rows,
            cols,
            data,
        })
    }

    /// d×d identity matrix in EVALUATION format.
    pub fn identity(params: &ParamsHandle, dimension: usize) -> Result<Self> {
        let mut matrix = Self::create(params, dimension, dimension)?;
        let one = DcrtPoly::from_constant(params, &BigUint::from(1u32));
        for i in 0..dimension {
            matrix.data[i * dimension + i] = one.clone();
        }
        Ok(matrix)
    }

    /// Builds a matrix from row-major entries.
    ///
    /// # Errors
    /// - `InvalidDimension` if `elements.len() != rows * cols`
    /// - `InvalidParameters` if an entry belongs to another ring
    pub fn from_elements(
        params: &ParamsHandle,
        rows: usize,
        cols: usize,
        elements: Vec<DcrtPoly>,
    ) -> Result<Self> {
        check_shape(rows, cols)?;
        if elements.len() != rows * cols {
            return Err(DcrtError::InvalidDimension {
                expected: rows * cols,
                got: elements.len(),
            });
        }
        for element in &elements {
            check_params(params, element.params())?;
        }
        Ok(Self {
            params: Arc::clone(params),
            rows,
            cols,
            data: elements,
        })
    }

    pub fn params(&self) -> &ParamsHandle {
        &self.params
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major view of all entries.
    pub fn elements(&self) -> &[DcrtPoly] {
        &self.data
    }

    /// Borrows entry (row, col), or `None` out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&DcrtPoly> {
        if row < self.rows && col < self.cols {
            self.data.get(row * self.cols + col)
        } else {
            None
        }
    }

    /// Copy of entry (row, col).
    pub fn element(&self, row: usize, col: usize) -> Result<DcrtPoly> {
        let index = self.index(row, col)?;
        Ok(self.data[index].clone())
    }

    /// Moves `value` into slot (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: DcrtPoly) -> Result<()> {
        let index = self.index(row, col)?;
        check_params(&self.params, value.params())?;
        self.data[index] = value;
        Ok(())
    }

    /// Moves entry (row, col) out, leaving a zero of the same format behind.
    pub fn take(&mut self, row: usize, col: usize) -> Result<DcrtPoly> {
        let index = self.index(row, col)?;
        let format = self.data[index].format();
        Ok(std::mem::replace(
            &mut self.data[index],
            DcrtPoly::zero(&self.params, format),
        ))
    }

    fn index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(DcrtError::IndexOutOfRange {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// Row `row` as a 1×cols matrix.
    pub fn extract_row(&self, row: usize) -> Result<Self> {
        self.extract_rows(row, row + 1)
    }

    /// Column `col` as a rows×1 matrix.
    pub fn extract_col(&self, col: usize) -> Result<Self> {
        self.extract_cols(col, col + 1)
    }

    /// Rows in the half-open range [start, end).
    pub fn extract_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.rows {
            return Err(DcrtError::IndexOutOfRange {
                row: end.max(start),
                col: 0,
                rows: self.rows,
                cols: self.cols,
            });
        }
        let data = self.data[start * self.cols..end * self.cols].to_vec();
        Ok(Self {
            params: Arc::clone(&self.params),
            rows: end - start,
            cols: self.cols,
            data,
        })
    }

    /// Columns in the half-open range [start, end).
    pub fn extract_cols(&self, start: usize, end: usize) -> Result<Self> {
        if start >= end || end > self.cols {
            return Err(DcrtError::IndexOutOfRange {
                row: 0,
                col: end.max(start),
                rows: self.rows,
                cols: self.cols,
            });
        }
        let data = self
            .data
            .chunks(self.cols)
            .flat_map(|row| row[start..end].iter().cloned())
            .collect();
        Ok(Self {
            params: Arc::clone(&self.params),
            rows: self.rows,
            cols: end - start,
            data,
        })
    }

    /// [self | other]; row counts must agree.
    pub fn hstack(&self, other: &Self) -> Result<Self> {
        Self::hstack_all(&[self, other])
    }

    /// Concatenates matrices left to right.
    pub fn hstack_all<M: AsRef<DcrtMatrix>>(blocks: &[M]) -> Result<Self> {
        let first: &DcrtMatrix = blocks
            .first()
            .ok_or_else(|| DcrtError::InvalidParameters("Nothing to stack".to_string()))?
            .as_ref();
        let rows = first.rows;
        let mut cols = 0;
        for block in blocks {
            let block: &DcrtMatrix = block.as_ref();
            check_params(&first.params, &block.params)?;
            if block.rows != rows {
                return Err(DcrtError::InvalidDimension {
                    expected: rows,
                    got: block.rows,
                });
            }
            cols += block.cols;
        }

        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for block in blocks {
                let block: &DcrtMatrix = block.as_ref();
                data.extend_from_slice(&block.data[r * block.cols..(r + 1) * block.cols]);
            }
        }
        Ok(Self {
            params: Arc::clone(&first.params),
            rows,
            cols,
            data,
        })
    }

    /// [self; other]; column counts must agree.
    pub fn vstack(&self, other: &Self) -> Result<Self> {
        Self::vstack_all(&[self, other])
    }

    /// Concatenates matrices top to bottom.
    pub fn vstack_all<M: AsRef<DcrtMatrix>>(blocks: &[M]) -> Result<Self> {
        let first: &DcrtMatrix = blocks
            .first()
            .ok_or_else(|| DcrtError::InvalidParameters("Nothing to stack".to_string()))?
            .as_ref();
        let cols = first.cols;
        let mut data = Vec::new();
        let mut rows = 0;
        for block in blocks {
            let block: &DcrtMatrix = block.as_ref();
            check_params(&first.params, &block.params)?;
            if block.cols != cols {
                return Err(DcrtError::InvalidDimension {
                    expected: cols,
                    got: block.cols,
                });
            }
            rows += block.rows;
            data.extend_from_slice(&block.data);
        }
        Ok(Self {
            params: Arc::clone(&first.params),
            rows,
            cols,
            data,
        })
    }

    /// Flips the format of every entry in place.
    pub fn switch_format_all(&mut self) {
        #[cfg(feature = "parallel")]
        self.data.par_iter_mut().for_each(|p| p.switch_format());

        #[cfg(not(feature = "parallel"))]
        for p in self.data.iter_mut() {
            p.switch_format();
        }
    }

    /// Moves every entry to `format`.
    pub fn set_format_all(&mut self, format: Format) {
        #[cfg(feature = "parallel")]
        self.data.par_iter_mut().for_each(|p| p.set_format(format));

        #[cfg(not(feature = "parallel"))]
        for p in self.data.iter_mut() {
            p.set_format(format);
        }
    }

    fn check_same_shape(&self, other: &Self) -> Result<()> {
        check_params(&self.params, &other.params)?;
        if self.rows != other.rows {
            return Err(DcrtError::InvalidDimension {
                expected: self.rows,
                got: other.rows,
            });
        }
        if self.cols != other.cols {
            return Err(DcrtError::InvalidDimension {
                expected: self.cols,
                got: other.cols,
            });
        }
        Ok(())
    }

    /// Entry-wise sum.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.add(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params: Arc::clone(&self.params),
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Entry-wise difference.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.check_same_shape(other)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.sub(b))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params: Arc::clone(&self.params),
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Matrix product over R_Q. Every entry of both operands must be in
    /// EVALUATION format; the product is in EVALUATION.
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        check_params(&self.params, &other.params)?;
        if self.cols != other.rows {
            return Err(DcrtError::InvalidDimension {
                expected: self.cols,
                got: other.rows,
            });
        }
        let mut data = Vec::with_capacity(self.rows * other.cols);
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut acc = DcrtPoly::zero(&self.params, Format::Evaluation);
                for l in 0..self.cols {
                    let a = &self.data[i * self.cols + l];
                    let b = &other.data[l * other.cols + j];
                    acc.add_assign(&a.multiply(b)?)?;
                }
                data.push(acc);
            }
        }
        Ok(Self {
            params: Arc::clone(&self.params),
            rows: self.rows,
            cols: other.cols,
            data,
        })
    }

    /// Entry-wise negation.
    pub fn negate(&self) -> Self {
        Self {
            params: Arc::clone(&self.params),
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(DcrtPoly::negate).collect(),
        }
    }
}

impl AsRef<DcrtMatrix> for DcrtMatrix {
    fn as_ref(&self) -> &DcrtMatrix {
        self
    }
}

impl Zeroize for DcrtMatrix {
    fn zeroize(&mut self) {
        for p in self.data.iter_mut() {
            p.zeroize();
        }
    }
}

fn check_shape(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 {
        return Err(DcrtError::InvalidParameters(format!(
            "Matrix shape must be non-empty, got {}x{}",
            rows, cols
        )));
    }
    Ok(())
}

fn check_params(expected: &ParamsHandle, found: &ParamsHandle) -> Result<()> {
    if Arc::ptr_eq(expected, found) || **expected == **found {
        Ok(())
    } else {
        Err(DcrtError::InvalidParameters(format!(
            "Element ring {} does not match matrix ring {}",
            found, expected
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RingParams;

    fn params() -> ParamsHandle {
        RingParams::new(16, 2, 30).unwrap()
    }

    fn constant(params: &ParamsHandle, v: u32) -> DcrtPoly {
        DcrtPoly::from_constant(params, &BigUint::from(v))
    }

    /// rows×cols matrix whose entry (i, j) is the constant 10·i + j.
    fn numbered(params: &ParamsHandle, rows: usize, cols: usize) -> DcrtMatrix {
        let elements = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (10 * i + j) as u32))
            .map(|v| constant(params, v))
            .collect();
        DcrtMatrix::from_elements(params, rows, cols, elements).unwrap()
    }

    #[test]
    fn test_create_is_zero_evaluation() {
        let params = params();
        let m = DcrtMatrix::create(&params, 2, 3).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert!(m
            .elements()
            .iter()
            .all(|p| p.is_zero() && p.format() == Format::Evaluation));
        assert!(DcrtMatrix::create(&params, 0, 3).is_err());
    }

    #[test]
    fn test_get_set_take() {
        let params = params();
        let mut m = DcrtMatrix::create(&params, 2, 2).unwrap();
        m.set(1, 0, constant(&params, 5)).unwrap();
        assert_eq!(m.get(1, 0).unwrap(), &constant(&params, 5));
        assert!(m.get(2, 0).is_none());
        assert!(matches!(
            m.element(0, 2),
            Err(DcrtError::IndexOutOfRange { row: 0, col: 2, rows: 2, cols: 2 })
        ));

        let taken = m.take(1, 0).unwrap();
        assert_eq!(taken, constant(&params, 5));
        let slot = m.get(1, 0).unwrap();
        assert!(slot.is_zero());
        assert_eq!(slot.format(), Format::Evaluation);
    }

    #[test]
    fn test_set_rejects_foreign_ring() {
        let params = params();
        let other = RingParams::new(16, 1, 30).unwrap();
        let mut m = DcrtMatrix::create(&params, 1, 1).unwrap();
        assert!(matches!(
            m.set(0, 0, DcrtPoly::zero(&other, Format::Evaluation)),
            Err(DcrtError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_extract_shapes() {
        let params = params();
        let m = numbered(&params, 3, 4);

        let row = m.extract_row(1).unwrap();
        assert_eq!(row.shape(), (1, 4));
        assert_eq!(row.get(0, 2).unwrap(), &constant(&params, 12));

        let col = m.extract_col(3).unwrap();
        assert_eq!(col.shape(), (3, 1));
        assert_eq!(col.get(2, 0).unwrap(), &constant(&params, 23));

        let rows = m.extract_rows(1, 3).unwrap();
        assert_eq!(rows.shape(), (2, 4));
        assert_eq!(rows.get(0, 0).unwrap(), &constant(&params, 10));

        let cols = m.extract_cols(1, 3).unwrap();
        assert_eq!(cols.shape(), (3, 2));
        assert_eq!(cols.get(2, 1).unwrap(), &constant(&params, 22));

        assert!(m.extract_row(3).is_err());
        assert!(m.extract_cols(2, 2).is_err());
        assert!(m.extract_cols(1, 5).is_err());
    }

    #[test]
    fn test_hstack_columns() {
        let params = params();
        let m = numbered(&params, 3, 4);
        let cols: Vec<DcrtMatrix> = (0..4).map(|j| m.extract_col(j).unwrap()).collect();
        let stacked = DcrtMatrix::hstack_all(&cols).unwrap();
        assert_eq!(stacked.shape(), (3, 4));
        assert_eq!(stacked, m);

        let wide = m.hstack(&m).unwrap();
        assert_eq!(wide.shape(), (3, 8));
        assert_eq!(wide.get(2, 5).unwrap(), &constant(&params, 21));
    }

    #[test]
    fn test_vstack() {
        let params = params();
        let m = numbered(&params, 2, 3);
        let tall = m.vstack(&m).unwrap();
        assert_eq!(tall.shape(), (4, 3));
        assert_eq!(tall.get(3, 2).unwrap(), &constant(&params, 12));
        let narrow = numbered(&params, 2, 2);
        assert!(matches!(
            m.vstack(&narrow),
            Err(DcrtError::InvalidDimension { expected: 3, got: 2 })
        ));
        assert!(matches!(
            m.hstack(&numbered(&params, 3, 3)),
            Err(DcrtError::InvalidDimension { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_switch_format_all() {
        let params = params();
        let original = numbered(&params, 2, 2);
        let mut m = original.clone();
        m.switch_format_all();
        assert!(m.elements().iter().all(|p| p.format() == Format::Coefficient));
        assert_eq!(m.get(1, 1).unwrap().coefficient_strings()[0], "11");
        m.switch_format_all();
        assert_eq!(m, original);
        m.set_format_all(Format::Coefficient);
        m.set_format_all(Format::Coefficient);
        assert!(m.elements().iter().all(|p| p.format() == Format::Coefficient));
    }

    #[test]
    fn test_multiply_identity_and_values() {
        let params = params();
        let m = numbered(&params, 2, 2);
        let id = DcrtMatrix::identity(&params, 2).unwrap();
        assert_eq!(id.multiply(&m).unwrap(), m);

        // [[0, 1], [10, 11]]^2 = [[10, 11], [110, 131]]
        let sq = m.multiply(&m).unwrap();
        assert_eq!(sq.get(0, 0).unwrap(), &constant(&params, 10));
        assert_eq!(sq.get(0, 1).unwrap(), &constant(&params, 11));
        assert_eq!(sq.get(1, 0).unwrap(), &constant(&params, 110));
        assert_eq!(sq.get(1, 1).unwrap(), &constant(&params, 131));

        let col = m.extract_col(0).unwrap();
        assert!(col.multiply(&m).is_err());
    }

    #[test]
    fn test_sample_ternary_matrix() {
        let params = params();
        let mut rng = crate::sampling::seeded_rng(8);
        let m = DcrtMatrix::sample(&params, 2, 3, Distribution::Ternary, &mut rng).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert!(m
            .elements()
            .iter()
            .all(|p| p.format() == Format::Evaluation && p.infinity_norm() <= BigUint::from(1u32)));
    }

    #[test]
    fn test_add_sub_negate() {
        let params = params();
        let m = numbered(&params, 2, 3);
        let doubled = m.add(&m).unwrap();
        assert_eq!(doubled.get(1, 2).unwrap(), &constant(&params, 24));
        let zero = m.add(&m.negate()).unwrap();
        assert!(zero.elements().iter().all(DcrtPoly::is_zero));
        assert_eq!(doubled.sub(&m).unwrap(), m);
    }

    #[test]
    fn test_zeroize_keeps_shape_and_ring() {
        let params = params();
        let mut rng = crate::sampling::seeded_rng(12);
        let mut m = DcrtMatrix::sample(&params, 2, 3, Distribution::Uniform, &mut rng).unwrap();
        m.zeroize();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m, DcrtMatrix::zero(&params, 2, 3, Format::Evaluation).unwrap());

        m.switch_format_all();
        assert!(m.elements().iter().all(|p| p.coefficients().len() == 16 && p.is_zero()));
    }
}
