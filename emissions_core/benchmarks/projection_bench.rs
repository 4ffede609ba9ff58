use emissions_core::{EmissionsModel, ScenarioInputs, ScenarioKind};
use emissions_schema::{
    BiofuelSettings, ElectricVehicleSettings, PolicySpec, RetrofitSettings, ScenarioRequest,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

const COUNTRIES: [&str; 5] = ["Ireland", "Germany", "Sweden", "Finland", "Poland"];

fn policy_request(country: &str) -> ScenarioRequest {
    let mut policy = PolicySpec::new(2030, 210_000.0);
    policy.new_floor_area = 250_000.0;
    policy.levers.efficiency_retrofit = Some(RetrofitSettings { scaler: 0.3 });
    policy.levers.biofuel = Some(BiofuelSettings { scaler: 0.2 });
    policy.levers.electric_vehicles = Some(ElectricVehicleSettings { scaler: 0.5 });
    ScenarioRequest::baseline(country, 2022, 200_000.0).with_policy(policy)
}

fn bench_single_projection(c: &mut Criterion) {
    let model = EmissionsModel::builtin();
    let mut group = c.benchmark_group("projection");

    group.bench_function("baseline", |b| {
        b.iter(|| {
            model
                .calculate(
                    ScenarioInputs::new("Ireland", 2020, 195_000.0),
                    ScenarioKind::Baseline,
                )
                .expect("baseline run")
        })
    });

    let request = policy_request("Ireland");
    group.bench_function("policy", |b| {
        b.iter(|| model.run(&request).expect("policy run"))
    });

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let model = EmissionsModel::builtin();
    let mut group = c.benchmark_group("batch");

    for size in [10usize, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    (0..size)
                        .map(|idx| policy_request(COUNTRIES[idx % COUNTRIES.len()]))
                        .collect::<Vec<_>>()
                },
                |requests| model.run_batch(&requests),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_single_projection, bench_batch);
criterion_main!(benches);
