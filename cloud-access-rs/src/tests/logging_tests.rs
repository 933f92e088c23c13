//! Tests for the log events emitted by the registry and the invoker
//!
//! A counting layer is installed as the thread's default subscriber so each
//! test sees only the events it caused.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::Registry;

    use crate::backends::MemoryClientFactory;
    use crate::config::Settings;
    use crate::core::{ClientRegistry, ServiceId};
    use crate::error::{Fallback, ProviderError};
    use crate::resilience::{CallSite, ResilientInvoker, RetryPolicy};

    /// Records the level of every event raised by this crate
    #[derive(Clone, Default)]
    struct LevelCounter {
        levels: Arc<Mutex<Vec<Level>>>,
    }

    impl LevelCounter {
        fn count(&self, level: Level) -> usize {
            self.levels.lock().unwrap().iter().filter(|l| **l == level).count()
        }

        fn total(&self) -> usize {
            self.levels.lock().unwrap().len()
        }
    }

    impl<S: Subscriber> Layer<S> for LevelCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let metadata = event.metadata();
            if metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
                self.levels.lock().unwrap().push(*metadata.level());
            }
        }
    }

    fn with_counter<T>(f: impl FnOnce() -> T) -> (T, LevelCounter) {
        let counter = LevelCounter::default();
        let subscriber = Registry::default().with(counter.clone());
        let value = tracing::subscriber::with_default(subscriber, f);
        (value, counter)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_delays(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn call_site() -> CallSite {
        CallSite::new("put_item", "Table", "users")
            .with_fallback(Fallback::storage("Failed to put item to users"))
    }

    #[test]
    fn test_handle_creation_logs_once_per_key() {
        let settings = Settings::default();
        let factory = Arc::new(MemoryClientFactory::provisioned(&settings));
        let registry = ClientRegistry::new(Arc::new(settings), factory);

        let (_, counter) = with_counter(|| {
            registry.get_handle(&ServiceId::object_store()).unwrap();
            registry.get_handle(&ServiceId::object_store()).unwrap();
            registry.get_resource_handle(&ServiceId::object_store()).unwrap();
            registry.get_resource_handle(&ServiceId::object_store()).unwrap();
        });

        assert_eq!(counter.count(Level::INFO), 2);
        assert_eq!(counter.total(), 2);

        let (_, counter) = with_counter(|| {
            registry.get_handle(&ServiceId::object_store()).unwrap();
        });
        assert_eq!(counter.total(), 0);
    }

    #[test]
    fn test_retry_then_success_logs_nothing() {
        let invoker = ResilientInvoker::default();
        let mut failures = 2;

        let (result, counter) = with_counter(|| {
            invoker.run_blocking(&call_site(), &fast_policy(), || {
                if failures > 0 {
                    failures -= 1;
                    return Err(ProviderError::connection("reset"));
                }
                Ok("stored")
            })
        });

        assert_eq!(result.unwrap(), "stored");
        assert_eq!(counter.total(), 0);
    }

    #[test]
    fn test_terminal_failure_logs_one_error() {
        let invoker = ResilientInvoker::default();

        let (result, counter) = with_counter(|| {
            invoker.run_blocking(&call_site(), &fast_policy(), || {
                Err::<(), _>(ProviderError::connection("reset"))
            })
        });

        assert!(result.is_err());
        assert_eq!(counter.count(Level::ERROR), 1);
        assert_eq!(counter.total(), 1);
    }

    #[test]
    fn test_not_found_logs_one_error() {
        let invoker = ResilientInvoker::default();

        let (result, counter) = with_counter(|| {
            invoker.run_blocking(&call_site(), &fast_policy(), || {
                Err::<(), _>(ProviderError::not_found("ResourceNotFoundException", "no table"))
            })
        });

        assert!(result.is_err());
        assert_eq!(counter.count(Level::ERROR), 1);
        assert_eq!(counter.total(), 1);
    }
}
