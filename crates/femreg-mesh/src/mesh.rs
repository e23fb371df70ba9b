use crate::element::Element;
use crate::error::MeshError;
use crate::material::LinearElasticMaterial;
use crate::quad4::Quad4;
use crate::tet4::Tet4;
use crate::tri3::Tri3;

/// A finite-element mesh: node coordinates and the elements connecting them.
///
/// The mesh owns no degrees of freedom numbering of its own; component `c` of node `n`
/// maps to the global degree of freedom `n * D + c`.
#[derive(Debug, Default)]
pub struct Mesh<const D: usize> {
    nodes: Vec<[f64; D]>,
    elements: Vec<Box<dyn Element<D>>>,
}

impl<const D: usize> Mesh<D> {
    /// Create a mesh from node coordinates and elements.
    ///
    /// Node references are not checked here, see [`Mesh::validate`].
    pub fn new(nodes: Vec<[f64; D]>, elements: Vec<Box<dyn Element<D>>>) -> Self {
        Self { nodes, elements }
    }

    /// Append a node and return its id.
    pub fn add_node(&mut self, coords: [f64; D]) -> usize {
        self.nodes.push(coords);
        self.nodes.len() - 1
    }

    /// Append an element and return its index.
    pub fn add_element(&mut self, element: Box<dyn Element<D>>) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    /// The node coordinates.
    pub fn nodes(&self) -> &[[f64; D]] {
        &self.nodes
    }

    /// The elements of the mesh.
    pub fn elements(&self) -> &[Box<dyn Element<D>>] {
        &self.elements
    }

    /// Get an element by index.
    pub fn element(&self, index: usize) -> Option<&dyn Element<D>> {
        self.elements.get(index).map(|e| e.as_ref())
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Number of global degrees of freedom.
    pub fn num_dofs(&self) -> usize {
        self.nodes.len() * D
    }

    /// Check that every element references existing nodes.
    pub fn validate(&self) -> Result<(), MeshError> {
        (0..self.elements.len()).try_for_each(|i| self.element_coordinates(i).map(|_| ()))
    }

    /// Global coordinates of the nodes of an element, in local order.
    ///
    /// # Panics
    ///
    /// Panics if `element_index` is out of range.
    pub fn element_coordinates(&self, element_index: usize) -> Result<Vec<[f64; D]>, MeshError> {
        self.elements[element_index]
            .node_ids()
            .iter()
            .map(|&node| {
                self.nodes
                    .get(node)
                    .copied()
                    .ok_or(MeshError::NodeOutOfRange {
                        element: element_index,
                        node,
                        num_nodes: self.nodes.len(),
                    })
            })
            .collect()
    }

    /// Axis-aligned bounding box `(min, max)` of an element.
    pub fn element_bounds(&self, element_index: usize) -> Result<([f64; D], [f64; D]), MeshError> {
        Ok(bounds(&self.element_coordinates(element_index)?))
    }
}

fn bounds<const D: usize>(points: &[[f64; D]]) -> ([f64; D], [f64; D]) {
    let mut min = [f64::INFINITY; D];
    let mut max = [f64::NEG_INFINITY; D];
    for p in points.iter() {
        for d in 0..D {
            min[d] = min[d].min(p[d]);
            max[d] = max[d].max(p[d]);
        }
    }
    (min, max)
}

fn check_generator_input<const D: usize>(
    element_size: &[f64; D],
    counts: &[usize; D],
) -> Result<(), MeshError> {
    if counts.iter().any(|c| *c == 0) {
        return Err(MeshError::InvalidGeneratorInput(format!(
            "element counts must be positive, got {counts:?}"
        )));
    }
    if element_size.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(MeshError::InvalidGeneratorInput(format!(
            "element sizes must be positive, got {element_size:?}"
        )));
    }
    Ok(())
}

// nodes of a regular lattice, x varying fastest
fn lattice_nodes<const D: usize>(
    origin: &[f64; D],
    element_size: &[f64; D],
    counts: &[usize; D],
) -> Vec<[f64; D]> {
    let total: usize = counts.iter().map(|c| c + 1).product();
    (0..total)
        .map(|mut id| {
            let mut p = [0.0; D];
            for d in 0..D {
                let i = id % (counts[d] + 1);
                id /= counts[d] + 1;
                p[d] = origin[d] + i as f64 * element_size[d];
            }
            p
        })
        .collect()
}

impl Mesh<2> {
    /// Generate a rectangle of `counts[0] x counts[1]` bilinear quadrilaterals.
    ///
    /// Node `(i, j)` has id `i + (counts[0] + 1) * j`.
    pub fn rectilinear_quads(
        origin: [f64; 2],
        element_size: [f64; 2],
        counts: [usize; 2],
        material: LinearElasticMaterial,
    ) -> Result<Self, MeshError> {
        check_generator_input(&element_size, &counts)?;
        material.validate()?;

        let nodes = lattice_nodes(&origin, &element_size, &counts);
        let id = |i: usize, j: usize| i + (counts[0] + 1) * j;

        let mut elements: Vec<Box<dyn Element<2>>> = Vec::with_capacity(counts[0] * counts[1]);
        for j in 0..counts[1] {
            for i in 0..counts[0] {
                elements.push(Box::new(Quad4::new(
                    [id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1)],
                    material,
                )));
            }
        }

        Ok(Self::new(nodes, elements))
    }

    /// Generate a rectangle of cells, each split into two linear triangles.
    pub fn rectilinear_triangles(
        origin: [f64; 2],
        element_size: [f64; 2],
        counts: [usize; 2],
        material: LinearElasticMaterial,
    ) -> Result<Self, MeshError> {
        check_generator_input(&element_size, &counts)?;
        material.validate()?;

        let nodes = lattice_nodes(&origin, &element_size, &counts);
        let id = |i: usize, j: usize| i + (counts[0] + 1) * j;

        let mut elements: Vec<Box<dyn Element<2>>> =
            Vec::with_capacity(2 * counts[0] * counts[1]);
        for j in 0..counts[1] {
            for i in 0..counts[0] {
                let (n00, n10, n11, n01) = (id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1));
                elements.push(Box::new(Tri3::new([n00, n10, n11], material)));
                elements.push(Box::new(Tri3::new([n00, n11, n01], material)));
            }
        }

        Ok(Self::new(nodes, elements))
    }
}

impl Mesh<3> {
    /// Generate a box of hexahedral cells, each split into six linear tetrahedra.
    ///
    /// Node `(i, j, k)` has id `i + (counts[0] + 1) * (j + (counts[1] + 1) * k)`.
    pub fn rectilinear_tets(
        origin: [f64; 3],
        element_size: [f64; 3],
        counts: [usize; 3],
        material: LinearElasticMaterial,
    ) -> Result<Self, MeshError> {
        check_generator_input(&element_size, &counts)?;
        material.validate()?;

        // all six share the main diagonal of the cell
        const CELL_TETS: [[usize; 4]; 6] = [
            [0, 1, 2, 6],
            [0, 2, 3, 6],
            [0, 3, 7, 6],
            [0, 7, 4, 6],
            [0, 4, 5, 6],
            [0, 5, 1, 6],
        ];

        let nodes = lattice_nodes(&origin, &element_size, &counts);
        let id = |i: usize, j: usize, k: usize| i + (counts[0] + 1) * (j + (counts[1] + 1) * k);

        let mut elements: Vec<Box<dyn Element<3>>> =
            Vec::with_capacity(6 * counts[0] * counts[1] * counts[2]);
        for k in 0..counts[2] {
            for j in 0..counts[1] {
                for i in 0..counts[0] {
                    let corners = [
                        id(i, j, k),
                        id(i + 1, j, k),
                        id(i + 1, j + 1, k),
                        id(i, j + 1, k),
                        id(i, j, k + 1),
                        id(i + 1, j, k + 1),
                        id(i + 1, j + 1, k + 1),
                        id(i, j + 1, k + 1),
                    ];
                    for tet in CELL_TETS.iter() {
                        elements.push(Box::new(Tet4::new(tet.map(|c| corners[c]), material)));
                    }
                }
            }
        }

        Ok(Self::new(nodes, elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rectilinear_quads() -> Result<(), MeshError> {
        let mesh = Mesh::rectilinear_quads(
            [1.0, 2.0],
            [0.5, 2.0],
            [4, 2],
            LinearElasticMaterial::default(),
        )?;
        assert_eq!(mesh.num_nodes(), 15);
        assert_eq!(mesh.num_elements(), 8);
        assert_eq!(mesh.num_dofs(), 30);
        assert_eq!(mesh.nodes()[6], [1.5, 4.0]);
        assert_eq!(mesh.elements()[5].node_ids(), &[6, 7, 12, 11]);
        assert_eq!(mesh.element_bounds(0)?, ([1.0, 2.0], [1.5, 4.0]));
        mesh.validate()?;
        Ok(())
    }

    #[test]
    fn test_rectilinear_triangles_cover_area() -> Result<(), MeshError> {
        let mesh = Mesh::rectilinear_triangles(
            [0.0, 0.0],
            [1.0, 1.0],
            [3, 3],
            LinearElasticMaterial::default(),
        )?;
        assert_eq!(mesh.num_elements(), 18);

        // every interior sample lies in at least one triangle
        for p in [[0.2, 0.7], [1.5, 1.5], [2.9, 0.1], [0.0, 3.0]].iter() {
            let found = (0..mesh.num_elements()).any(|i| {
                let coords = mesh.element_coordinates(i).unwrap();
                mesh.elements()[i].local_from_global(&coords, p).is_some()
            });
            assert!(found, "{p:?} not covered");
        }
        Ok(())
    }

    #[test]
    fn test_rectilinear_tets_volume() -> Result<(), MeshError> {
        let mesh = Mesh::rectilinear_tets(
            [0.0, 0.0, 0.0],
            [1.0, 2.0, 0.5],
            [2, 1, 2],
            LinearElasticMaterial::default(),
        )?;
        assert_eq!(mesh.num_nodes(), 18);
        assert_eq!(mesh.num_elements(), 24);

        // sum of the signed tet volumes equals the box volume
        let mut volume = 0.0;
        for i in 0..mesh.num_elements() {
            let c = mesh.element_coordinates(i)?;
            let e: [[f64; 3]; 3] =
                std::array::from_fn(|a| std::array::from_fn(|b| c[b + 1][a] - c[0][a]));
            volume += crate::linalg::det_mat33(&e) / 6.0;
        }
        assert_relative_eq!(volume, 4.0, epsilon = 1e-12);
        Ok(())
    }

    #[test]
    fn test_generator_input() {
        let m = LinearElasticMaterial::default();
        assert!(matches!(
            Mesh::rectilinear_quads([0.0; 2], [1.0; 2], [0, 2], m),
            Err(MeshError::InvalidGeneratorInput(_))
        ));
        assert!(matches!(
            Mesh::rectilinear_tets([0.0; 3], [1.0, -1.0, 1.0], [1; 3], m),
            Err(MeshError::InvalidGeneratorInput(_))
        ));
    }

    #[test]
    fn test_node_out_of_range() {
        let mut mesh = Mesh::<2>::default();
        mesh.add_node([0.0, 0.0]);
        mesh.add_node([1.0, 0.0]);
        mesh.add_element(Box::new(Tri3::new(
            [0, 1, 5],
            LinearElasticMaterial::default(),
        )));
        assert_eq!(
            mesh.validate(),
            Err(MeshError::NodeOutOfRange {
                element: 0,
                node: 5,
                num_nodes: 2
            })
        );
    }
}
