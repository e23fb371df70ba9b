use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use femreg_linalg::{
    ConjugateGradientParams, DenseLinearSystem, LinearSystem, SparseLinearSystem, SparseSolver,
    SystemLayout,
};

// 1d laplacian plus a mass term, symmetric positive definite
fn fill_system<L: LinearSystem>(ls: &mut L, order: usize) {
    ls.set_layout(SystemLayout {
        order,
        matrices: 1,
        vectors: 1,
        solutions: 1,
    });
    for i in 0..order {
        ls.add_matrix_value(i, i, 2.5, 0);
        if i + 1 < order {
            ls.add_matrix_value(i, i + 1, -1.0, 0);
            ls.add_matrix_value(i + 1, i, -1.0, 0);
        }
        ls.set_vector_value(i, (i % 7) as f64 - 3.0, 0);
    }
}

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve");

    for order in [64, 256, 1024].iter() {
        group.throughput(criterion::Throughput::Elements(*order as u64));
        let parameter_string = format!("{}", order);

        group.bench_with_input(
            BenchmarkId::new("dense_lu", &parameter_string),
            order,
            |b, &order| {
                let mut ls = DenseLinearSystem::default();
                fill_system(&mut ls, order);
                b.iter(|| {
                    ls.solve().unwrap();
                    black_box(());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("sparse_cholesky", &parameter_string),
            order,
            |b, &order| {
                let mut ls = SparseLinearSystem::default();
                fill_system(&mut ls, order);
                b.iter(|| {
                    ls.solve().unwrap();
                    black_box(());
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("sparse_cg", &parameter_string),
            order,
            |b, &order| {
                let mut ls = SparseLinearSystem::new(SparseSolver::ConjugateGradient(
                    ConjugateGradientParams::default(),
                ));
                fill_system(&mut ls, order);
                b.iter(|| {
                    ls.initialize_solution(0);
                    ls.solve().unwrap();
                    black_box(());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
