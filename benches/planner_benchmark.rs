//! Performance benchmarks for BatchPlan
//!
//! Run with: cargo bench

use batchplan::cluster::RemoteCluster;
use batchplan::planner::{ArchitectureOptimizer, ResourcePlanner, ResourceRequest};
use batchplan::queue::protocol::{parse_job_servers, parse_queue_entries};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_plan_optimizers(c: &mut Criterion) {
    let planner = ResourcePlanner::new("s1234");
    let mut group = c.benchmark_group("plan");

    for optimizer in [
        ArchitectureOptimizer::Cost,
        ArchitectureOptimizer::Cores,
        ArchitectureOptimizer::QueueTime,
    ] {
        let mut request = ResourceRequest::new(4.0, 1.0, 6.0);
        request.optimizer = optimizer;
        group.bench_with_input(
            BenchmarkId::from_parameter(optimizer.name()),
            &request,
            |b, request| {
                b.iter(|| black_box(planner.plan(request, 10_000, RemoteCluster::Nas)));
            },
        );
    }
    group.finish();

    c.bench_function("plan_aws_cost", |b| {
        let request = ResourceRequest::new(8.0, 0.5, 12.0);
        b.iter(|| black_box(planner.plan(&request, 2_500, RemoteCluster::Aws)));
    });
}

fn bench_queue_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("qstat_parse");

    for count in [100usize, 1_000, 10_000] {
        let listing: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    "{}.pbspl1 user low    100-200-tps.{}    5   5 04:00 R 02:33  254%",
                    1_000_000 + i,
                    i
                )
            })
            .collect();
        let dump: Vec<String> = (0..count)
            .flat_map(|i| {
                [
                    format!("Job: {}.pbspl1", 1_000_000 + i),
                    "    Job_Owner = user@pfe21.nas.nasa.gov".to_string(),
                ]
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("listing", count), &listing, |b, lines| {
            b.iter(|| black_box(parse_queue_entries(lines)));
        });
        group.bench_with_input(BenchmarkId::new("owners", count), &dump, |b, lines| {
            b.iter(|| black_box(parse_job_servers(lines)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan_optimizers, bench_queue_parsing);

criterion_main!(benches);
