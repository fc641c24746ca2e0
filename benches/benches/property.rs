// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_property`.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::{Arc, Once};

use understory_property::{
    Property, PropertyDeclarationBuilder, PropertyRegistry, PropertyRegistryBuilder, ShadowStore,
    TypeHint,
};

fn registry(count: u16) -> (Arc<PropertyRegistry>, Vec<Property<f64>>) {
    let mut builder = PropertyRegistryBuilder::new("Bench");
    let keys: Vec<&'static str> = (0..count)
        .map(|i| &*Box::leak(format!("prop{i}").into_boxed_str()))
        .collect();
    let properties = keys
        .into_iter()
        .map(|key| {
            builder
                .declare(
                    key,
                    PropertyDeclarationBuilder::new(0.0_f64)
                        .type_hint(TypeHint::Number)
                        .reflect(true),
                )
                .unwrap()
        })
        .collect();
    (builder.finalize(), properties)
}

fn bench_store(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: ShadowStore={} ErasedValue={}",
            size_of::<ShadowStore>(),
            size_of::<understory_property::ErasedValue>(),
        );
    });

    let mut group = c.benchmark_group("property/store");
    for count in [4_u16, 16, 64] {
        let (registry, properties) = registry(count);
        let last = properties[properties.len() - 1];

        group.bench_function(BenchmarkId::new("get_initial", count), |b| {
            let store = ShadowStore::new();
            b.iter(|| black_box(*store.get_or_initial(last, &registry)));
        });

        group.bench_function(BenchmarkId::new("get_written", count), |b| {
            let mut store = ShadowStore::new();
            for property in &properties {
                store.set(*property, 1.0);
            }
            b.iter(|| black_box(*store.get_or_initial(last, &registry)));
        });

        group.bench_function(BenchmarkId::new("set", count), |b| {
            let mut store = ShadowStore::new();
            let mut value = 0.0;
            b.iter(|| {
                value += 1.0;
                black_box(store.set(last, value))
            });
        });
    }
    group.finish();
}

fn bench_conversion(c: &mut Criterion) {
    let (registry, properties) = registry(1);
    let declaration = registry.declaration(properties[0]).unwrap();

    let mut group = c.benchmark_group("property/convert");
    group.bench_function("to_attribute", |b| {
        b.iter(|| black_box(declaration.to_attribute(black_box(&42.5))));
    });
    group.bench_function("from_attribute", |b| {
        b.iter(|| black_box(declaration.from_attribute(black_box(Some("42.5")))));
    });
    group.bench_function("finalize_64", |b| {
        b.iter(|| black_box(registry_len(64)));
    });
    group.finish();
}

fn registry_len(count: u16) -> usize {
    registry(count).0.len()
}

criterion_group!(benches, bench_store, bench_conversion);
criterion_main!(benches);
