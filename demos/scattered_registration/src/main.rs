use argh::FromArgs;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::path::PathBuf;

use femreg::linalg::{
    ConjugateGradientParams, DenseLinearSystem, LinearSystem, SparseLinearSystem, SparseSolver,
};
use femreg::mesh::{LinearElasticMaterial, Mesh};
use femreg::robust::{GridGeometry, Landmark, RobustSolver, RobustSolverParams};

#[derive(FromArgs)]
/// Register a rectilinear mesh to synthetic landmarks corrupted with outliers
struct Args {
    /// number of cells along each axis
    #[argh(option, short = 'c', default = "8")]
    cells: usize,

    /// number of landmarks
    #[argh(option, short = 'n', default = "200")]
    num_landmarks: usize,

    /// fraction of landmarks with a random displacement
    #[argh(option, default = "0.1")]
    outlier_fraction: f64,

    /// seed of the landmark generator
    #[argh(option, default = "42")]
    seed: u64,

    /// path to a json file with the solver parameters
    #[argh(option, short = 'p')]
    params: Option<PathBuf>,

    /// use the sparse backend with a cholesky factorization
    #[argh(switch)]
    sparse: bool,

    /// with --sparse, solve with a preconditioned conjugate gradient instead
    #[argh(switch)]
    cg: bool,

    /// register a tetrahedral mesh in 3d instead of quadrilaterals in 2d
    #[argh(switch)]
    volume: bool,
}

#[derive(Serialize)]
struct Summary {
    nodes: usize,
    elements: usize,
    landmarks: usize,
    out_of_mesh: usize,
    rejected: usize,
    rejected_corrupted: usize,
    corrupted: usize,
    iterations: usize,
    final_ponderation: f64,
    mean_node_error: f64,
    max_node_error: f64,
}

// smooth affine deformation, reproduced exactly by linear elements
fn ground_truth<const D: usize>(x: &[f64; D]) -> [f64; D] {
    std::array::from_fn(|d| 0.3 - 0.1 * d as f64 + 0.05 * x[(d + 1) % D])
}

fn synthetic_landmarks<const D: usize>(
    rng: &mut StdRng,
    extent: f64,
    count: usize,
    outlier_fraction: f64,
) -> Vec<Landmark<D>> {
    (0..count)
        .map(|_| {
            let source: [f64; D] = std::array::from_fn(|_| rng.random_range(0.0..extent));
            let displacement = if rng.random_bool(outlier_fraction) {
                std::array::from_fn(|_| rng.random_range(-5.0..5.0))
            } else {
                let truth = ground_truth(&source);
                std::array::from_fn(|d| truth[d] + rng.random_range(-0.01..0.01))
            };
            Landmark::new(source, displacement, 1.0)
        })
        .collect()
}

fn register<const D: usize, L: LinearSystem>(
    mesh: &Mesh<D>,
    landmarks: Vec<Landmark<D>>,
    cells: usize,
    params: &RobustSolverParams,
    ls: L,
) -> Result<Summary, Box<dyn std::error::Error>> {
    let num_landmarks = landmarks.len();
    let is_corrupted = |l: &Landmark<D>| {
        let truth = ground_truth(l.source());
        (0..D).any(|d| (truth[d] - l.real_displacement()[d]).abs() > 0.05)
    };
    let corrupted = landmarks.iter().filter(|l| is_corrupted(l)).count();

    let geometry = GridGeometry::axis_aligned([2 * cells + 1; D], [0.0; D], [0.5; D]);
    let mut solver = RobustSolver::initialize(mesh, landmarks, &geometry, true, ls)?;
    let displacements = solver.run_solver(params)?;

    let errors: Vec<f64> = mesh
        .nodes()
        .iter()
        .zip(displacements.iter())
        .map(|(x, u)| {
            let truth = ground_truth(x);
            (0..D)
                .map(|d| (truth[d] - u[d]).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();

    Ok(Summary {
        nodes: mesh.num_nodes(),
        elements: mesh.num_elements(),
        landmarks: num_landmarks,
        out_of_mesh: solver.out_of_mesh_landmarks().len(),
        rejected: solver.rejected_landmarks().len(),
        rejected_corrupted: solver
            .rejected_landmarks()
            .iter()
            .filter(|l| is_corrupted(l))
            .count(),
        corrupted,
        iterations: solver.iterations(),
        final_ponderation: solver.ponderation()?,
        mean_node_error: errors.iter().sum::<f64>() / errors.len().max(1) as f64,
        max_node_error: errors.iter().cloned().fold(0.0, f64::max),
    })
}

fn run<const D: usize>(
    mesh: &Mesh<D>,
    args: &Args,
    params: &RobustSolverParams,
) -> Result<Summary, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let landmarks = synthetic_landmarks(
        &mut rng,
        args.cells as f64,
        args.num_landmarks,
        args.outlier_fraction.clamp(0.0, 1.0),
    );

    if args.sparse {
        let solver = if args.cg {
            SparseSolver::ConjugateGradient(ConjugateGradientParams::default())
        } else {
            SparseSolver::Cholesky
        };
        register(mesh, landmarks, args.cells, params, SparseLinearSystem::new(solver))
    } else {
        register(mesh, landmarks, args.cells, params, DenseLinearSystem::default())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let params = match &args.params {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => RobustSolverParams {
            approximation_steps: 20,
            fraction_error_rejected: args.outlier_fraction.min(0.9),
            ..Default::default()
        },
    };
    log::info!("solver parameters: {:?}", params);

    let material = LinearElasticMaterial::default();
    let summary = if args.volume {
        let mesh = Mesh::rectilinear_tets([0.0; 3], [1.0; 3], [args.cells; 3], material)?;
        run(&mesh, &args, &params)?
    } else {
        let mesh = Mesh::rectilinear_quads([0.0; 2], [1.0; 2], [args.cells; 2], material)?;
        run(&mesh, &args, &params)?
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
