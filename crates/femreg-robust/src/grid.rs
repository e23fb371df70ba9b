use faer::prelude::SpSolver;
use femreg_mesh::Mesh;

use crate::error::RobustSolverError;

/// A rectangular block of grid indices: the start index and the number of cells per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRegion<const D: usize> {
    /// Index of the first cell.
    pub index: [i64; D],
    /// Number of cells along each axis.
    pub size: [usize; D],
}

impl<const D: usize> GridRegion<D> {
    /// Total number of cells.
    pub fn num_cells(&self) -> usize {
        self.size.iter().product()
    }

    /// Whether an index lies inside the region.
    pub fn contains(&self, index: &[i64; D]) -> bool {
        (0..D).all(|d| {
            index[d] >= self.index[d] && index[d] < self.index[d] + self.size[d] as i64
        })
    }

    /// Row-major offset of an index inside the region, the first axis varying fastest.
    pub fn offset(&self, index: &[i64; D]) -> Option<usize> {
        if !self.contains(index) {
            return None;
        }
        let mut offset = 0;
        let mut stride = 1;
        for d in 0..D {
            offset += (index[d] - self.index[d]) as usize * stride;
            stride *= self.size[d];
        }
        Some(offset)
    }

    /// Iterate over all indices of the region in offset order.
    pub fn indices(&self) -> IndexBox<D> {
        let hi = std::array::from_fn(|d| self.index[d] + self.size[d] as i64 - 1);
        IndexBox::new(self.index, hi)
    }
}

/// Iterator over the indices of an inclusive index box, the first axis varying fastest.
#[derive(Debug, Clone)]
pub struct IndexBox<const D: usize> {
    lo: [i64; D],
    hi: [i64; D],
    next: Option<[i64; D]>,
}

impl<const D: usize> IndexBox<D> {
    /// Create the box `lo..=hi`. The box is empty if `lo > hi` along any axis.
    pub fn new(lo: [i64; D], hi: [i64; D]) -> Self {
        let empty = (0..D).any(|d| lo[d] > hi[d]);
        Self {
            lo,
            hi,
            next: (!empty).then_some(lo),
        }
    }
}

impl<const D: usize> Iterator for IndexBox<D> {
    type Item = [i64; D];

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        let mut following = current;
        let mut carry = true;
        for d in 0..D {
            if following[d] < self.hi[d] {
                following[d] += 1;
                carry = false;
                break;
            }
            following[d] = self.lo[d];
        }
        self.next = (!carry).then_some(following);

        Some(current)
    }
}

/// Geometry of a regular grid: region, physical origin, spacing and direction cosines.
///
/// The physical point of index `i` is `origin + direction * diag(spacing) * i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry<const D: usize> {
    /// The indices covered by the grid.
    pub region: GridRegion<D>,
    /// Physical position of index zero.
    pub origin: [f64; D],
    /// Physical distance between neighbouring cells.
    pub spacing: [f64; D],
    /// Direction cosines, column `d` is the physical direction of axis `d`.
    pub direction: [[f64; D]; D],
}

impl<const D: usize> GridGeometry<D> {
    /// An axis aligned grid starting at index zero.
    pub fn axis_aligned(size: [usize; D], origin: [f64; D], spacing: [f64; D]) -> Self {
        Self {
            region: GridRegion {
                index: [0; D],
                size,
            },
            origin,
            spacing,
            direction: std::array::from_fn(|i| std::array::from_fn(|j| (i == j) as u8 as f64)),
        }
    }

    /// Check the geometry and compute the index/physical transforms.
    pub fn transform(&self) -> Result<GridTransform<D>, RobustSolverError> {
        if let Some(axis) = self.region.size.iter().position(|s| *s == 0) {
            return Err(RobustSolverError::EmptyGridRegion { axis });
        }
        if let Some(s) = self.spacing.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(RobustSolverError::InvalidGridSpacing(*s));
        }

        let m = faer::Mat::<f64>::from_fn(D, D, |i, j| self.direction[i][j] * self.spacing[j]);
        let det = m.determinant();
        if !(det.is_finite() && det.abs() > f64::EPSILON) {
            return Err(RobustSolverError::SingularGridDirection);
        }
        let inv = m
            .partial_piv_lu()
            .solve(faer::Mat::<f64>::identity(D, D).as_ref());

        Ok(GridTransform {
            geometry: *self,
            index_to_physical: std::array::from_fn(|i| std::array::from_fn(|j| m.read(i, j))),
            physical_to_index: std::array::from_fn(|i| std::array::from_fn(|j| inv.read(i, j))),
        })
    }
}

/// A validated [`GridGeometry`] with its forward and inverse index transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransform<const D: usize> {
    geometry: GridGeometry<D>,
    index_to_physical: [[f64; D]; D],
    physical_to_index: [[f64; D]; D],
}

impl<const D: usize> GridTransform<D> {
    /// The underlying geometry.
    pub fn geometry(&self) -> &GridGeometry<D> {
        &self.geometry
    }

    /// Physical point of a grid index.
    pub fn index_to_point(&self, index: &[i64; D]) -> [f64; D] {
        std::array::from_fn(|i| {
            self.geometry.origin[i]
                + (0..D)
                    .map(|j| self.index_to_physical[i][j] * index[j] as f64)
                    .sum::<f64>()
        })
    }

    /// Nearest grid index of a physical point, or `None` if it falls outside the region.
    pub fn point_to_index(&self, point: &[f64; D]) -> Option<[i64; D]> {
        let index: [i64; D] = std::array::from_fn(|i| {
            let c: f64 = (0..D)
                .map(|j| self.physical_to_index[i][j] * (point[j] - self.geometry.origin[j]))
                .sum();
            c.round() as i64
        });
        self.geometry.region.contains(&index).then_some(index)
    }
}

/// A regular grid mapping each cell to the mesh element containing its center.
///
/// Built once from the element bounding boxes, it answers point location queries with an
/// index transform and a single lookup. Cells covered by several elements keep the last
/// element in mesh order.
#[derive(Debug, Clone)]
pub struct InterpolationGrid<const D: usize> {
    transform: GridTransform<D>,
    cells: Vec<Option<usize>>,
}

impl<const D: usize> InterpolationGrid<D> {
    /// Rasterize the elements of `mesh` into the grid described by `geometry`.
    ///
    /// Elements whose bounding box corners fall outside the grid region are skipped and can
    /// not be located through the grid.
    pub fn build(geometry: &GridGeometry<D>, mesh: &Mesh<D>) -> Result<Self, RobustSolverError> {
        let transform = geometry.transform()?;
        let mut cells = vec![None; geometry.region.num_cells()];
        let mut skipped = 0;

        for (element_index, element) in mesh.elements().iter().enumerate() {
            let coords = mesh.element_coordinates(element_index)?;
            let (min, max) = mesh.element_bounds(element_index)?;

            let (Some(i1), Some(i2)) = (
                transform.point_to_index(&min),
                transform.point_to_index(&max),
            ) else {
                skipped += 1;
                continue;
            };

            // the corners may swap with a flipped direction
            let lo = std::array::from_fn(|d| i1[d].min(i2[d]));
            let hi = std::array::from_fn(|d| i1[d].max(i2[d]));

            for index in IndexBox::new(lo, hi) {
                let point = transform.index_to_point(&index);
                if element.local_from_global(&coords, &point).is_some() {
                    if let Some(offset) = geometry.region.offset(&index) {
                        cells[offset] = Some(element_index);
                    }
                }
            }
        }

        if skipped > 0 {
            log::warn!(
                "{} of {} elements lie outside of the interpolation grid",
                skipped,
                mesh.num_elements()
            );
        }

        Ok(Self { transform, cells })
    }

    /// The grid transform.
    pub fn transform(&self) -> &GridTransform<D> {
        &self.transform
    }

    /// Element stored at the cell nearest to `point`, if any.
    pub fn locate(&self, point: &[f64; D]) -> Option<usize> {
        let index = self.transform.point_to_index(point)?;
        let offset = self.transform.geometry().region.offset(&index)?;
        self.cells[offset]
    }

    /// Element stored at a grid index, if any.
    pub fn element_at_index(&self, index: &[i64; D]) -> Option<usize> {
        let offset = self.transform.geometry().region.offset(index)?;
        self.cells[offset]
    }

    /// Number of cells referencing an element.
    pub fn num_located_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}
