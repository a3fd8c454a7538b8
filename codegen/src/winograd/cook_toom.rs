//! Cook–Toom construction of Winograd minimal-filtering transforms.
//!
//! For `F(m, r)` with `α = m + r - 1` the construction evaluates at `α - 1`
//! finite points plus the point at infinity and yields
//!
//! ```text
//! y = Aᵀ [ (G g) ⊙ (Bᵀ d) ]
//! ```
//!
//! for a filter `g` of length `r` and an input tile `d` of length `α`. The 2-D
//! transforms nest the 1-D ones: `Y = Aᵀ [ (G g Gᵀ) ⊙ (Bᵀ d B) ] A`.

use super::rational::Rational;

/// Row-major dense matrix of exact coefficients.
pub type Matrix = Vec<Vec<Rational>>;

/// Finite interpolation points in the order they are consumed.
const POINTS: [(i64, i64); 11] = [(0, 1), (1, 1), (-1, 1), (2, 1), (-2, 1), (1, 2), (-1, 2), (3, 1), (-3, 1), (1, 3), (-1, 3)];

/// Largest input tile the point set supports.
pub const MAX_INPUT_BLOCK: usize = POINTS.len() + 1;

/// Transform matrices of one `F(m, r)` instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinogradMatrices {
    /// Output transform, `m x α`.
    pub at: Matrix,
    /// Filter transform, `α x r`.
    pub g: Matrix,
    /// Input transform, `α x α`.
    pub bt: Matrix,
}

fn transpose(m: &Matrix) -> Matrix {
    if m.is_empty() {
        return Vec::new();
    }
    (0..m[0].len()).map(|j| m.iter().map(|row| row[j]).collect()).collect()
}

fn matmul(a: &Matrix, b: &Matrix) -> Matrix {
    a.iter()
        .map(|row| {
            (0..b[0].len()).map(|j| row.iter().zip(b).fold(Rational::ZERO, |acc, (&x, brow)| acc + x * brow[j])).collect()
        })
        .collect()
}

fn poly_mul(a: &[Rational], b: &[Rational]) -> Vec<Rational> {
    let mut out = vec![Rational::ZERO; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] = out[i + j] + x * y;
        }
    }
    out
}

impl WinogradMatrices {
    /// Build the transforms for `F(output_block, kernel_size)`.
    ///
    /// Callers validate the parameters; see `WinogradStrategy::new`.
    pub fn new(output_block: usize, kernel_size: usize) -> Self {
        let alpha = output_block + kernel_size - 1;
        let n = alpha - 1;
        let points: Vec<Rational> = POINTS[..n].iter().map(|&(num, den)| Rational::new(num, den)).collect();

        let f: Vec<Rational> = (0..n)
            .map(|i| (0..n).filter(|&k| k != i).fold(Rational::ONE, |acc, k| acc * (points[i] - points[k])))
            .collect();

        // Vandermonde rows on the finite points, unit row for infinity.
        let vandermonde = |cols: usize| -> Matrix {
            let mut rows: Matrix = points.iter().map(|&p| (0..cols).map(|j| p.pow(j)).collect()).collect();
            rows.push((0..cols).map(|j| if j == cols - 1 { Rational::ONE } else { Rational::ZERO }).collect());
            rows
        };

        let mut scale = f.clone();
        scale.push(Rational::ONE);
        if scale[0].is_negative() {
            scale[0] = -scale[0];
        }

        let at = transpose(&vandermonde(output_block));
        let g: Matrix = vandermonde(kernel_size)
            .into_iter()
            .zip(&scale)
            .map(|(row, &s)| row.into_iter().map(|x| x / s).collect())
            .collect();

        // Lagrange basis coefficients, row j holds the x^j coefficients.
        let basis: Matrix = (0..n)
            .map(|i| {
                let poly = (0..n)
                    .filter(|&k| k != i)
                    .fold(vec![Rational::ONE], |acc, k| poly_mul(&acc, &[-points[k], Rational::ONE]));
                poly.into_iter().map(|c| c / f[i]).collect()
            })
            .collect();
        let lagrange = transpose(&basis);
        let t: Matrix = (0..n)
            .map(|i| {
                let mut row: Vec<Rational> = (0..n).map(|j| if i == j { Rational::ONE } else { Rational::ZERO }).collect();
                row.push(-points[i].pow(n));
                row
            })
            .collect();

        let mut b = matmul(&lagrange, &t);
        b.push((0..alpha).map(|j| if j == n { Rational::ONE } else { Rational::ZERO }).collect());
        let bt: Matrix = transpose(&b).into_iter().zip(&scale).map(|(row, &s)| row.into_iter().map(|x| x * s).collect()).collect();

        Self { at, g, bt }
    }

    pub fn output_block(&self) -> usize {
        self.at.len()
    }

    pub fn kernel_size(&self) -> usize {
        self.g.first().map_or(0, Vec::len)
    }

    pub fn input_block(&self) -> usize {
        self.bt.len()
    }

    /// 1-D correlation of `filter` over `input` through the transforms.
    pub fn correlate(&self, input: &[Rational], filter: &[Rational]) -> Vec<Rational> {
        let dot = |row: &[Rational], v: &[Rational]| row.iter().zip(v).fold(Rational::ZERO, |acc, (&a, &b)| acc + a * b);
        let u: Vec<Rational> = self.g.iter().map(|row| dot(row, filter)).collect();
        let v: Vec<Rational> = self.bt.iter().map(|row| dot(row, input)).collect();
        let m: Vec<Rational> = u.iter().zip(&v).map(|(&a, &b)| a * b).collect();
        self.at.iter().map(|row| dot(row, &m)).collect()
    }
}
