use divan::Bencher;
use std::ops::ControlFlow;

use copc_validator::copc::Bounds;
use copc_validator::las::PointRecord;
use copc_validator::scanner::{NodeContext, RuleEvaluator};
use copc_validator::{Status, Suite};

fn main() {
    divan::main();
}

fn context() -> NodeContext {
    NodeContext {
        has_rgb: true,
        bounds: Bounds {
            min: [0.0; 3],
            max: [100.0; 3],
        },
        tolerance: [0.01; 3],
        gps_time_range: [0.0, 1e9],
    }
}

/// Points that keep every rule open, so the whole node is evaluated
fn points(count: usize) -> Vec<PointRecord> {
    (0..count)
        .map(|i| PointRecord {
            x: (i % 100) as f64,
            y: 50.0,
            z: 50.0,
            intensity: 100,
            return_number: 1,
            number_of_returns: 1,
            gps_time: i as f64,
            rgb: Some([10, 20, 30]),
        })
        .collect()
}

#[divan::bench(args = [1_000, 100_000])]
fn evaluate_node(bencher: Bencher, count: usize) {
    let points = points(count);
    bencher.bench_local(move || {
        let mut evaluator = RuleEvaluator::new(context());
        for point in &points {
            if evaluator.observe(point) == ControlFlow::Break(()) {
                break;
            }
        }
        evaluator.finish()
    });
}

#[divan::bench(args = [10, 100])]
fn invoke_suite(bencher: Bencher, checks: usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("Failed to build runtime");

    bencher.bench_local(move || {
        let mut suite: Suite<u64> = Suite::new();
        for i in 0..checks {
            suite = suite.check(&format!("check{}", i), move |value| {
                Status::from(*value % (i as u64 + 1) == 0)
            });
        }
        runtime.block_on(suite.with_source(42).invoke())
    });
}
