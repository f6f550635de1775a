//! Radial basis function warping between meshes.
//!
//! A [`WarpField`] maps points near one mesh into the space of another. It is
//! fitted on landmarks, vertex indices that correspond between the two meshes.
//! The field interpolates the landmark displacements `y_j - x_j` with the
//! Hardy multiquadric kernel
//!
//! ```text
//! h_j(x) = sqrt(|x - x_j|^2 + s_j^2)
//! ```
//!
//! where `s_j^2` is the squared distance from landmark `j` to its nearest
//! neighbour, plus an affine part `[1 x y z]`. Kernel and affine weights come
//! from one SVD least-squares solve of the augmented system, one column per
//! axis. Affine landmark maps, the identity included, are reproduced exactly
//! everywhere.
//!
//! Warping a morph moves each displaced source vertex through the field and
//! re-expresses the result relative to the matching target vertex.

use std::collections::BTreeMap;

use glam::Vec3;
use morphkit_core::{MorphError, Result, WarpOptions};
use nalgebra::{DMatrix, DVector, Vector3};

use crate::mesh::VertexId;

fn to_vector(v: Vec3) -> Vector3<f64> {
    Vector3::new(f64::from(v.x), f64::from(v.y), f64::from(v.z))
}

/// `points x terms` matrix of `[1 x y z]` rows, truncated to `terms` columns.
fn polynomial_rows(points: &[Vector3<f64>], terms: usize) -> DMatrix<f64> {
    DMatrix::from_fn(points.len(), terms, |i, k| {
        if k == 0 {
            1.0
        } else {
            points[i][k - 1]
        }
    })
}

/// A fitted multiquadric RBF field.
#[derive(Debug, Clone)]
pub struct WarpField {
    centers: Vec<Vector3<f64>>,
    regularizers: DVector<f64>,
    kernel: DMatrix<f64>,
    weights: DMatrix<f64>,
    affine: DMatrix<f64>,
}

impl WarpField {
    /// Fits a field mapping each `source` landmark onto the matching `target` one.
    pub fn fit(source: &[Vec3], target: &[Vec3], options: &WarpOptions) -> Result<Self> {
        if source.is_empty() {
            return Err(MorphError::NoLandmarks);
        }
        if source.len() != target.len() {
            return Err(MorphError::LandmarkOutOfRange {
                index: source.len().min(target.len()),
                source_len: source.len(),
                target_len: target.len(),
            });
        }
        if source.iter().chain(target).any(|p| !p.is_finite()) {
            return Err(MorphError::WarpSolveFailed(
                "landmark coordinates are not finite".to_string(),
            ));
        }

        let centers: Vec<Vector3<f64>> = source.iter().copied().map(to_vector).collect();
        let n = centers.len();
        let regularizers = if n == 1 {
            DVector::from_element(1, options.singleton_regularizer)
        } else {
            DVector::from_fn(n, |i, _| {
                let mut nearest = f64::INFINITY;
                for (j, other) in centers.iter().enumerate() {
                    let d2 = (centers[i] - other).norm_squared();
                    if j != i && d2 < nearest {
                        nearest = d2;
                    }
                }
                nearest
            })
        };

        let kernel = DMatrix::from_fn(n, n, |i, j| {
            ((centers[i] - centers[j]).norm_squared() + regularizers[j]).sqrt()
        });

        // A single landmark only pins a translation
        let terms = if n == 1 { 1 } else { 4 };
        let polynomial = polynomial_rows(&centers, terms);
        let size = n + terms;
        let mut system = DMatrix::<f64>::zeros(size, size);
        system.view_mut((0, 0), (n, n)).copy_from(&kernel);
        system.view_mut((0, n), (n, terms)).copy_from(&polynomial);
        system
            .view_mut((n, 0), (terms, n))
            .copy_from(&polynomial.transpose());

        let mut rhs = DMatrix::<f64>::zeros(size, 3);
        for (i, (s, t)) in source.iter().zip(target).enumerate() {
            for axis in 0..3 {
                rhs[(i, axis)] = f64::from(t[axis]) - f64::from(s[axis]);
            }
        }

        let svd = system.clone().svd(true, true);
        let solution = svd
            .solve(&rhs, options.svd_epsilon)
            .map_err(|e| MorphError::WarpSolveFailed(format!("SVD solve failed: {e}")))?;
        if solution.iter().any(|w| !w.is_finite()) {
            return Err(MorphError::WarpSolveFailed(
                "weights are not finite".to_string(),
            ));
        }

        let residual = (&system * &solution - &rhs).amax();
        let tolerance = options.residual_tolerance * rhs.amax().max(1.0);
        if residual > tolerance {
            return Err(MorphError::WarpSolveFailed(format!(
                "landmark residual {residual:.3e} exceeds {tolerance:.3e}"
            )));
        }
        log::debug!("fitted warp on {n} landmarks (residual {residual:.3e})");

        Ok(Self {
            centers,
            regularizers,
            kernel,
            weights: solution.rows(0, n).into_owned(),
            affine: solution.rows(n, terms).into_owned(),
        })
    }

    /// Fits a field on the landmark vertices of two position arrays.
    pub fn from_positions(
        source: &[Vec3],
        target: &[Vec3],
        landmarks: &[VertexId],
        options: &WarpOptions,
    ) -> Result<Self> {
        if landmarks.is_empty() {
            return Err(MorphError::NoLandmarks);
        }
        let mut source_landmarks = Vec::with_capacity(landmarks.len());
        let mut target_landmarks = Vec::with_capacity(landmarks.len());
        for &index in landmarks {
            match (source.get(index), target.get(index)) {
                (Some(&s), Some(&t)) => {
                    source_landmarks.push(s);
                    target_landmarks.push(t);
                }
                _ => {
                    return Err(MorphError::LandmarkOutOfRange {
                        index,
                        source_len: source.len(),
                        target_len: target.len(),
                    });
                }
            }
        }
        Self::fit(&source_landmarks, &target_landmarks, options)
    }

    /// Returns the number of landmarks.
    pub fn len(&self) -> usize {
        self.centers.len()
    }

    /// Returns true if the field has no landmarks. Never true for a fitted field.
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Returns the squared regularizer `s_j^2` of each landmark.
    pub fn regularizers(&self) -> &DVector<f64> {
        &self.regularizers
    }

    /// Returns the landmark x landmark kernel matrix.
    pub fn kernel_matrix(&self) -> &DMatrix<f64> {
        &self.kernel
    }

    /// Returns the `landmarks x 3` kernel weight matrix.
    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Returns the affine coefficients, one row per `[1 x y z]` term.
    ///
    /// A single-landmark field has only the constant row.
    pub fn affine(&self) -> &DMatrix<f64> {
        &self.affine
    }

    /// Returns the `points x landmarks` kernel matrix for arbitrary points.
    pub fn kernel_rows(&self, points: &[Vector3<f64>]) -> DMatrix<f64> {
        DMatrix::from_fn(points.len(), self.centers.len(), |i, j| {
            ((points[i] - self.centers[j]).norm_squared() + self.regularizers[j]).sqrt()
        })
    }

    fn evaluate(&self, points: &[Vector3<f64>]) -> DMatrix<f64> {
        let mut warped = self.kernel_rows(points) * &self.weights
            + polynomial_rows(points, self.affine.nrows()) * &self.affine;
        for (i, p) in points.iter().enumerate() {
            for axis in 0..3 {
                warped[(i, axis)] += p[axis];
            }
        }
        warped
    }

    /// Maps a batch of points through the field.
    pub fn warp_points(&self, points: &[Vec3]) -> Vec<Vec3> {
        let points: Vec<Vector3<f64>> = points.iter().copied().map(to_vector).collect();
        let warped = self.evaluate(&points);
        warped
            .row_iter()
            .map(|row| Vec3::new(row[0] as f32, row[1] as f32, row[2] as f32))
            .collect()
    }

    /// Maps a single point through the field.
    pub fn warp_point(&self, point: Vec3) -> Vec3 {
        self.warp_points(&[point])
            .first()
            .copied()
            .unwrap_or(point)
    }

    /// Re-expresses a morph defined on `source` as a morph on `target`.
    ///
    /// Each displaced vertex `n` is moved to `source[n] + d`, warped, and
    /// stored as its offset from `target[n]`. All vertices are evaluated in
    /// one kernel product.
    pub fn warp_morph(
        &self,
        morph: &BTreeMap<VertexId, Vec3>,
        source: &[Vec3],
        target: &[Vec3],
    ) -> Result<BTreeMap<VertexId, Vec3>> {
        let vertex_count = source.len().min(target.len());
        if let Some(&index) = morph.keys().find(|&&v| v >= vertex_count) {
            return Err(MorphError::VertexOutOfRange {
                index,
                vertex_count,
            });
        }

        let moved: Vec<Vector3<f64>> = morph
            .iter()
            .map(|(&v, &d)| to_vector(source[v]) + to_vector(d))
            .collect();
        let warped = self.evaluate(&moved);

        Ok(morph
            .keys()
            .zip(warped.row_iter())
            .map(|(&v, row)| {
                let rest = to_vector(target[v]);
                let offset = Vector3::new(row[0] - rest.x, row[1] - rest.y, row[2] - rest.z);
                (v, Vec3::new(offset.x as f32, offset.y as f32, offset.z as f32))
            })
            .collect())
    }
}

/// Fits a field on `landmarks` and warps `morph` from `source` to `target` space.
pub fn warp_target(
    morph: &BTreeMap<VertexId, Vec3>,
    source: &[Vec3],
    target: &[Vec3],
    landmarks: &[VertexId],
    options: &WarpOptions,
) -> Result<BTreeMap<VertexId, Vec3>> {
    let field = WarpField::from_positions(source, target, landmarks, options)?;
    field.warp_morph(morph, source, target)
}
