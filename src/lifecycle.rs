//! Auto-start lifecycle
//!
//! A component that implements [`AutoStart`] and declares the capability on
//! its descriptor is started by the container as soon as the container
//! constructs it for a registration or during [`Container::start_all`].
//! `stop` is never called by the container; shutdown is left to the
//! application, which can use [`stop_all`] over the instances returned by
//! [`Container::started_components`].
//!
//! [`Container::start_all`]: crate::Container::start_all
//! [`Container::started_components`]: crate::Container::started_components

use crate::{Instance, Result, ServiceType};

#[cfg(feature = "logging")]
use tracing::{debug, warn};

/// A component with a start/stop lifecycle.
pub trait AutoStart: Send + Sync {
    /// Called once the component has been constructed and cached.
    fn start(&self) -> Result<()>;

    /// Called by the application during shutdown.
    fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Invoke the start hook of `instance` if it has one.
///
/// Returns whether a hook ran.
pub(crate) fn start_instance(instance: &Instance, service: &ServiceType) -> Result<bool> {
    let Some(component) = instance.as_auto_start() else {
        return Ok(false);
    };

    #[cfg(feature = "logging")]
    debug!(
        target: "service_container",
        service = %service,
        implementation = instance.type_name(),
        "Starting auto-start component"
    );
    #[cfg(not(feature = "logging"))]
    let _ = service;

    component.start()?;
    Ok(true)
}

/// Stop lifecycle-managed instances in reverse order.
///
/// Every instance is stopped even if an earlier one fails; the first error is
/// returned.
pub fn stop_all<'a>(instances: impl IntoIterator<Item = &'a Instance>) -> Result<()> {
    let managed: Vec<&Instance> = instances
        .into_iter()
        .filter(|instance| instance.is_auto_start())
        .collect();

    let mut first_error = None;
    for instance in managed.into_iter().rev() {
        let Some(component) = instance.as_auto_start() else {
            continue;
        };
        if let Err(err) = component.stop() {
            #[cfg(feature = "logging")]
            warn!(
                target: "service_container",
                implementation = instance.type_name(),
                error = %err,
                "Auto-start component failed to stop"
            );
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContainerError;
    use std::sync::Mutex;
    use std::sync::Arc;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_stop: bool,
    }

    impl AutoStart for Recorder {
        fn start(&self) -> Result<()> {
            self.log.lock().unwrap().push(format!("start {}", self.name));
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            self.log.lock().unwrap().push(format!("stop {}", self.name));
            if self.fail_stop {
                return Err(ContainerError::Internal(format!("{} refused", self.name)));
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail_stop: bool) -> Instance {
        Instance::startable(Recorder {
            name,
            log: Arc::clone(log),
            fail_stop,
        })
    }

    #[test]
    fn test_start_instance_skips_plain_values() {
        let service = ServiceType::of::<u32>();
        assert!(!start_instance(&Instance::new(7u32), &service).unwrap());
    }

    #[test]
    fn test_start_instance_runs_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let instance = recorder("mailer", &log, false);

        assert!(start_instance(&instance, &ServiceType::of::<Recorder>()).unwrap());
        assert_eq!(*log.lock().unwrap(), vec!["start mailer"]);
    }

    #[test]
    fn test_stop_all_reverse_order_and_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let instances = vec![
            recorder("first", &log, true),
            Instance::new(1u8),
            recorder("second", &log, true),
            recorder("third", &log, false),
        ];

        let err = stop_all(&instances).unwrap_err();
        assert_eq!(err.to_string(), "Internal container error: second refused");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["stop third", "stop second", "stop first"]
        );
    }
}
