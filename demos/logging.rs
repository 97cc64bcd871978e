//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use service_container::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

// Example services
#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
}

struct RepositoryDef;

#[allow(dead_code)]
struct Repository {
    entity: ServiceType,
}

struct Indexer {
    running: AtomicBool,
}

impl AutoStart for Indexer {
    fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn main() -> Result<()> {
    // Initialize logging - uses JSON if logging-json feature enabled,
    // pretty if logging-pretty enabled
    #[cfg(feature = "logging")]
    {
        service_container::logging::init();
    }

    println!("\n=== service-container Logging Demo ===\n");

    let container = Container::new();

    println!("--- Registering Services ---");
    container.register_instance(
        "config.url",
        ServiceType::of::<String>(),
        Instance::new("postgres://localhost/app".to_string()),
    )?;

    container.register_self(
        "db",
        ComponentDescriptor::builder::<Database>()
            .constructor([ServiceType::of::<String>()], |args| {
                let url = args.get::<String>(0)?;
                Ok(Database {
                    url: url.as_ref().clone(),
                })
            })
            .build(),
        Lifestyle::Singleton,
    )?;

    container.register_self(
        "users",
        ComponentDescriptor::builder::<UserService>()
            .constructor([ServiceType::of::<Database>()], |args| {
                Ok(UserService { db: args.get(0)? })
            })
            .build(),
        Lifestyle::Transient,
    )?;

    let definition = ServiceType::definition::<RepositoryDef>(1);
    container.register_type(
        "repository",
        definition.clone(),
        ComponentDescriptor::open_generic(definition.clone(), |arguments| {
            let entity = arguments[0].clone();
            Ok(ComponentDescriptor::builder::<Repository>()
                .constructor([], move |_| {
                    Ok(Repository {
                        entity: entity.clone(),
                    })
                })
                .build())
        }),
        Lifestyle::Singleton,
    )?;

    println!("\n--- Resolving Services ---");
    let db = container.get_concrete::<Database>()?;
    let _users = container.get_concrete::<UserService>()?;
    let _again = container.get_concrete::<Database>()?;

    let bound = definition.bind([ServiceType::of::<UserService>()])?;
    let by_name = container.resolve_key(&bound.full_name())?;
    println!("Resolved {} by name", by_name.type_name());

    println!("\n--- Missing Services ---");
    let missing = container.try_get::<Indexer>(&ServiceType::of::<Indexer>());
    println!("Indexer registered: {}", missing.is_some());

    println!("\n--- Auto-start Components ---");
    container.register_self(
        "indexer",
        ComponentDescriptor::builder::<Indexer>()
            .constructor([], |_| {
                Ok(Indexer {
                    running: AtomicBool::new(false),
                })
            })
            .auto_start()
            .build(),
        Lifestyle::Singleton,
    )?;
    container.start_all()?;
    let indexer = container.get_concrete::<Indexer>()?;
    println!("Indexer running: {}", indexer.running.load(Ordering::SeqCst));

    println!("\n--- Releasing Instances ---");
    container.release(&Instance::from_arc(db));
    let rebuilt = container.get_concrete::<Database>()?;
    println!("Rebuilt database for {}", rebuilt.url);

    println!("\n--- Shutdown ---");
    service_container::lifecycle::stop_all(&container.started_components())?;
    println!("Indexer running: {}", indexer.running.load(Ordering::SeqCst));

    println!("\n=== Demo Complete ===\n");
    Ok(())
}
