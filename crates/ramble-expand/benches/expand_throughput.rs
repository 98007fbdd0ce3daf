use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ramble_core::variable_env;
use ramble_expand::{parse_expression, Expander};

fn expand_bench(c: &mut Criterion) {
    let expander = Expander::new(variable_env([
        ("n_ranks", "{processes_per_node}*{n_nodes}"),
        ("processes_per_node", "16"),
        ("n_nodes", "4"),
        ("exe", "{application_run_dir}/bin/xhpl"),
        ("application_run_dir", "/scratch/experiments/hpl"),
        ("command", "mpirun -n {n_ranks} --ppn {processes_per_node} {exe} > {log}"),
        ("log", "{application_run_dir}/run_{n_nodes:03d}.out"),
    ]));
    c.bench_function("expand_command", |b| {
        b.iter(|| {
            let out = expander.expand_var_name("command").unwrap();
            black_box(out);
        });
    });
}

fn parse_bench(c: &mut Criterion) {
    c.bench_function("parse_expression", |b| {
        b.iter(|| {
            let expr = parse_expression("max(ceil(64 / 3) * 2, 4) >= 2 ** 5 and 1 in [1, 2, 3]").unwrap();
            black_box(expr);
        });
    });
}

criterion_group!(benches, expand_bench, parse_bench);
criterion_main!(benches);
