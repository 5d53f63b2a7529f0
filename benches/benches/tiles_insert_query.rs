// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_tiles::{Grid, GridConfig, GridData, QueryKind, Region, TilingScheme};

const WORLD: f64 = 1024.0;

fn region(x0: f64, y0: f64, x1: f64, y1: f64) -> Region<f64> {
    Region::new(&[x0, y0], &[x1, y1]).unwrap()
}

fn gen_grid_rects(n: usize, cell: f64) -> Vec<Region<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push(region(x0, y0, x0 + cell * 0.8, y0 + cell * 0.8));
        }
    }
    out
}

fn build(rects: &[Region<f64>], capacity: usize, tiling: TilingScheme) -> Grid<f64, usize> {
    let config = GridConfig::new(region(0.0, 0.0, WORLD, WORLD), capacity).with_tiling(tiling);
    let mut grid = Grid::with_config(config).unwrap();
    for (i, r) in rects.iter().enumerate() {
        grid.insert_data(i, r, i as i64).unwrap();
    }
    grid
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiles_insert");
    for n in [32_usize, 64] {
        let rects = gen_grid_rects(n, WORLD / n as f64);
        group.throughput(Throughput::Elements((n * n) as u64));
        for (name, tiling) in [
            ("balanced", TilingScheme::Balanced),
            ("proportional", TilingScheme::Proportional),
        ] {
            group.bench_function(format!("{name}_{n}x{n}"), |b| {
                b.iter_batched(
                    || rects.clone(),
                    |rects| black_box(build(&rects, 256, tiling)),
                    BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("tiles_query");
    let rects = gen_grid_rects(64, WORLD / 64.0);
    for capacity in [16_usize, 256, 4096] {
        let grid = build(&rects, capacity, TilingScheme::Balanced);
        let view = region(300.0, 300.0, 420.0, 420.0);
        group.bench_function(format!("intersect_view_cap{capacity}"), |b| {
            b.iter(|| {
                let mut hits = 0_usize;
                let mut count = |_: &GridData<f64, usize>| hits += 1;
                grid.query(&view, QueryKind::Intersection, &mut count)
                    .unwrap();
                black_box(hits)
            });
        });
        group.bench_function(format!("lazy_view_cap{capacity}"), |b| {
            b.iter(|| black_box(grid.query_intersecting(&view).unwrap().count()));
        });
        group.bench_function(format!("collect_view_cap{capacity}"), |b| {
            b.iter(|| black_box(grid.collect_intersecting(&view).unwrap().len()));
        });
    }
    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    let rects = gen_grid_rects(32, WORLD / 32.0);
    c.bench_function("tiles_delete_all_32x32", |b| {
        b.iter_batched(
            || build(&rects, 256, TilingScheme::Balanced),
            |mut grid| {
                for (i, r) in rects.iter().enumerate() {
                    grid.delete_data(r, i as i64).unwrap();
                }
                black_box(grid.len())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_insert, bench_query, bench_delete);
criterion_main!(benches);
