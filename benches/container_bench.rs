//! Benchmarks for the service container

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use service_container::{ComponentDescriptor, Container, Lifestyle, ServiceType};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct Config {
    value: i32,
}

#[allow(dead_code)]
struct Repository {
    config: Arc<Config>,
}

#[allow(dead_code)]
struct Service {
    config: Arc<Config>,
    repository: Arc<Repository>,
}

struct RepositoryDef;

#[allow(dead_code)]
struct Generic {
    entity: ServiceType,
}

fn config() -> ComponentDescriptor {
    ComponentDescriptor::builder::<Config>()
        .constructor([], |_| Ok(Config { value: 42 }))
        .build()
}

fn repository() -> ComponentDescriptor {
    ComponentDescriptor::builder::<Repository>()
        .constructor([ServiceType::of::<Config>()], |args| {
            Ok(Repository {
                config: args.get(0)?,
            })
        })
        .build()
}

fn service() -> ComponentDescriptor {
    ComponentDescriptor::builder::<Service>()
        .constructor([ServiceType::of::<Config>()], |args| {
            let config = args.get::<Config>(0)?;
            Ok(Service {
                repository: Arc::new(Repository {
                    config: Arc::clone(&config),
                }),
                config,
            })
        })
        .constructor(
            [ServiceType::of::<Config>(), ServiceType::of::<Repository>()],
            |args| {
                Ok(Service {
                    config: args.get(0)?,
                    repository: args.get(1)?,
                })
            },
        )
        .build()
}

fn populated(lifestyle: Lifestyle) -> Container {
    let container = Container::new();
    container.register_self("config", config(), Lifestyle::Singleton).unwrap();
    container.register_self("repository", repository(), lifestyle).unwrap();
    container.register_self("service", service(), lifestyle).unwrap();
    container
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("register_type", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register_self("config", config(), Lifestyle::Singleton).unwrap();
            black_box(container)
        })
    });

    group.bench_function("register_instance", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .register_instance(
                    "config",
                    ServiceType::of::<Config>(),
                    service_container::Instance::new(Config { value: 1 }),
                )
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("three_components", |b| {
        b.iter(|| black_box(populated(Lifestyle::Singleton)))
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = populated(Lifestyle::Singleton);
    let service_type = ServiceType::of::<Service>();
    let missing = ServiceType::of::<String>();

    group.bench_function("cached_singleton", |b| {
        b.iter(|| black_box(container.resolve(&service_type).unwrap()))
    });

    group.bench_function("typed_get", |b| {
        b.iter(|| black_box(container.get::<Service>(&service_type).unwrap()))
    });

    group.bench_function("contains_check", |b| {
        b.iter(|| black_box(container.contains(&service_type)))
    });

    group.bench_function("not_found", |b| {
        b.iter(|| black_box(container.resolve(&missing).is_err()))
    });

    group.bench_function("resolve_key", |b| {
        let key = ServiceType::of::<Service>().full_name();
        b.iter(|| black_box(container.resolve_key(&key).unwrap()))
    });

    group.finish();
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");
    group.throughput(Throughput::Elements(1));

    let container = populated(Lifestyle::Transient);
    let service_type = ServiceType::of::<Service>();

    group.bench_function("transient_graph", |b| {
        b.iter(|| black_box(container.resolve(&service_type).unwrap()))
    });

    let generic = Container::new();
    let definition = ServiceType::definition::<RepositoryDef>(1);
    generic
        .register_type(
            "repository",
            definition.clone(),
            ComponentDescriptor::open_generic(definition.clone(), |arguments| {
                let entity = arguments[0].clone();
                Ok(ComponentDescriptor::builder::<Generic>()
                    .constructor([], move |_| {
                        Ok(Generic {
                            entity: entity.clone(),
                        })
                    })
                    .build())
            }),
            Lifestyle::Transient,
        )
        .unwrap();
    let bound = definition.bind([ServiceType::of::<Config>()]).unwrap();

    group.bench_function("open_generic_transient", |b| {
        b.iter(|| black_box(generic.resolve(&bound).unwrap()))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = populated(Lifestyle::Singleton);
        let service_type = ServiceType::of::<Service>();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    let service_type = service_type.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.resolve(&service_type).unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_construction,
    bench_concurrent,
);

criterion_main!(benches);
