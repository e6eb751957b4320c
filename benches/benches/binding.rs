// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_binding`.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::string::String;
use std::sync::Once;

use understory_binding::{
    BindingObject, BindingObjectExt, BindingPriority, ErasedValue, Property, Subject, ValueStore,
};

struct Elem {
    bindings: ValueStore<u32>,
}

impl Elem {
    fn new(key: u32) -> Self {
        Self {
            bindings: ValueStore::new(key),
        }
    }
}

impl BindingObject<u32> for Elem {
    fn binding_store(&self) -> &ValueStore<u32> {
        &self.bindings
    }

    fn binding_store_mut(&mut self) -> &mut ValueStore<u32> {
        &mut self.bindings
    }
}

/// Applies a style, a template, and local values to `props` properties, the
/// way a control is built up.
fn build(element: &mut Elem, props: u16, style: &Subject<f64>) {
    for index in 0..props {
        let property: Property<f64> = Property::new(index);
        element.bind(property, style.clone(), BindingPriority::Style);
        element.bind(property, style.clone(), BindingPriority::Template);
        element.set_local(property, f64::from(index));
    }
}

fn bench_binding(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: ValueStore<u32>={} Elem={} ErasedValue={}",
            core::mem::size_of::<ValueStore<u32>>(),
            core::mem::size_of::<Elem>(),
            core::mem::size_of::<ErasedValue>(),
        );
    });

    let mut group = c.benchmark_group("binding/construct");

    for props in [4_u16, 16, 64] {
        group.bench_function(BenchmarkId::new("live", props), |b| {
            let style = Subject::new();
            b.iter_batched(
                || Elem::new(1),
                |mut element| {
                    build(&mut element, props, &style);
                    black_box(element)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(BenchmarkId::new("deferred", props), |b| {
            let style = Subject::new();
            b.iter_batched(
                || Elem::new(1),
                |mut element| {
                    element.with_init(|element| build(element, props, &style));
                    black_box(element)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();

    let mut group = c.benchmark_group("binding/read");
    let width: Property<f64> = Property::new(3);
    let text: Property<String> = Property::new(4);

    group.bench_function("f64", |b| {
        let mut element = Elem::new(1);
        let style = Subject::new();
        build(&mut element, 16, &style);
        b.iter(|| black_box(element.get(width)))
    });

    group.bench_function("string_clone", |b| {
        let mut element = Elem::new(1);
        element.set_local(text, String::from("hello world hello world hello world"));
        b.iter(|| black_box(element.get(text)))
    });

    group.finish();

    let mut group = c.benchmark_group("binding/push");

    group.bench_function("subject_next", |b| {
        let mut element = Elem::new(1);
        let animated = Subject::new();
        element.bind(width, animated.clone(), BindingPriority::Animation);
        let mut value = 0.0_f64;
        b.iter(|| {
            value += 1.0;
            animated.next(black_box(value));
        })
    });

    group.bench_function("supersede_and_restore", |b| {
        let mut element = Elem::new(1);
        let local = Subject::new();
        element.bind(width, local.clone(), BindingPriority::LocalValue);
        b.iter(|| {
            let store = element.binding_store_mut();
            let handle = store.set_value(width, 1.0, BindingPriority::Animation);
            black_box(store.remove_binding(handle))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_binding);
criterion_main!(benches);
