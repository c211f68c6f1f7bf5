use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pendulum_control::controller::{Gains, PidController, SharedController};
use pendulum_control::plant::{CartParams, CartPole, Plant, SimParams};

fn tuned() -> PidController {
    PidController::new(Gains::new(150.0, 50.0, 4000.0), 0.01).unwrap()
}

fn benchmark_pid_control(c: &mut Criterion) {
    let mut pid = tuned();
    c.bench_function("pid_compute", |b| b.iter(|| pid.compute(black_box(0.05))));
}

fn benchmark_shared_pid_control(c: &mut Criterion) {
    let shared = SharedController::new(tuned());
    c.bench_function("shared_pid_compute", |b| {
        b.iter(|| shared.compute(black_box(0.05)))
    });
}

fn benchmark_control_tick(c: &mut Criterion) {
    let shared = SharedController::new(tuned());
    let mut model = CartPole::new(SimParams::default(), CartParams::default());
    c.bench_function("control_tick", |b| {
        b.iter(|| {
            let output = shared.compute(model.control_error());
            model.apply(output, 0.01);
        })
    });
}

criterion_group!(
    benches,
    benchmark_pid_control,
    benchmark_shared_pid_control,
    benchmark_control_tick
);
criterion_main!(benches);
