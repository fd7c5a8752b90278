//! # Desk Benchmarks
//!
//! Throughput of the allocation cycle, occupancy accounting and snapshot
//! encoding.
//!
//! Run with: `cargo bench -p assetdesk-core`

use assetdesk_core::room::Occupancy;
use assetdesk_core::{
    ActionContext, AllocationKind, AssetClass, ChecklistKind, Desk, HolderInput, NewAsset, UserId,
    registry_from_bytes,
};
use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn ctx() -> ActionContext {
    let now = Utc
        .with_ymd_and_hms(2026, 1, 5, 8, 0, 0)
        .single()
        .expect("timestamp");
    ActionContext::new(UserId(1), now)
}

/// A desk with `size` validated IT assets and one employee per asset.
fn stocked_desk(size: usize) -> Desk {
    let mut desk = Desk::new();
    for i in 0..size {
        let asset = desk
            .add_asset(NewAsset {
                name: format!("Laptop {}", i),
                class: AssetClass::It,
                cost_cents: 100_000,
                ..NewAsset::default()
            })
            .expect("asset");
        desk.validate_asset(asset).expect("validate");
        desk.add_employee(&format!("Employee {}", i), None, false)
            .expect("employee");
    }
    desk
}

/// Create, check in and allocate one allocation per asset.
fn allocate_all(desk: &mut Desk) {
    let ctx = ctx();
    let assets: Vec<_> = desk.registry().assets.keys().copied().collect();
    let employees: Vec<_> = desk.registry().employees.keys().copied().collect();
    for (asset, employee) in assets.into_iter().zip(employees) {
        let id = desk
            .create_allocation(
                &ctx,
                AllocationKind::It,
                HolderInput {
                    employee: Some(employee),
                    ..HolderInput::default()
                },
            )
            .expect("allocation");
        desk.add_allocation_asset(id, asset).expect("line");
        let checklist = desk
            .open_checklist(&ctx, id, ChecklistKind::CheckIn)
            .expect("checklist");
        desk.attach_document(&ctx, checklist, "signed.pdf", vec![1])
            .expect("document");
        desk.verify_checklist(&ctx, checklist).expect("verify");
        desk.allocate(&ctx, id).expect("allocate");
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_allocation_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_cycle");

    for size in [10, 50, 200].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter_batched(
                || stocked_desk(size),
                |mut desk| {
                    allocate_all(&mut desk);
                    black_box(desk)
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_occupancy(c: &mut Criterion) {
    c.bench_function("occupancy_compute", |b| {
        b.iter(|| {
            for capacity in 1u32..64 {
                black_box(Occupancy::compute(capacity, None, 12, 3));
            }
        });
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_decode");

    for size in [100, 1000].iter() {
        let mut desk = stocked_desk(*size);
        allocate_all(&mut desk);
        let bytes = desk.export_bytes().expect("export");

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(registry_from_bytes(bytes)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_allocation_cycle, bench_occupancy, bench_snapshot);
criterion_main!(benches);
