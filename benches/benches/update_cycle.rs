// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_element` update cycles.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

use understory_element::Element;
use understory_property::{
    Property, PropertyDeclarationBuilder, PropertyRegistry, PropertyRegistryBuilder, TypeHint,
};

fn counter() -> (Arc<PropertyRegistry>, Property<i32>, Property<String>) {
    let mut builder = PropertyRegistryBuilder::new("Counter");
    let count = builder
        .declare(
            "count",
            PropertyDeclarationBuilder::new(0_i32)
                .type_hint(TypeHint::Number)
                .reflect(true),
        )
        .unwrap();
    let label = builder
        .declare("label", PropertyDeclarationBuilder::new(String::new()))
        .unwrap();
    (builder.finalize(), count, label)
}

fn connected(registry: &Arc<PropertyRegistry>) -> Element<()> {
    let mut element = Element::new(Arc::clone(registry), ());
    element.connected();
    element.flush();
    element
}

fn bench_cycles(c: &mut Criterion) {
    let (registry, count, label) = counter();
    let mut group = c.benchmark_group("element/cycle");

    for writes in [1_i32, 8, 64] {
        group.bench_function(BenchmarkId::new("batched_writes", writes), |b| {
            let mut element = connected(&registry);
            let mut base = 0;
            b.iter(|| {
                for i in 0..writes {
                    element.set(count, base + i + 1);
                }
                base += writes;
                black_box(element.flush())
            });
        });
    }

    group.bench_function("unchanged_write", |b| {
        let mut element = connected(&registry);
        element.set(label, String::from("steady"));
        element.flush();
        b.iter(|| black_box(element.set(label, String::from("steady"))));
    });

    group.bench_function("attribute_to_property", |b| {
        b.iter_batched(
            || connected(&registry),
            |mut element| {
                element.set_attribute("count", "17").unwrap();
                black_box(element.flush())
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("new_and_first_cycle", |b| {
        b.iter(|| black_box(connected(&registry)));
    });
    group.finish();
}

criterion_group!(benches, bench_cycles);
criterion_main!(benches);
