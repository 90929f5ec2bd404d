//! Process-wide settings for the threads promises run on.
//!
//! Generators passed to [`Promise::new`](crate::Promise::new) each get their
//! own thread. Fan-in observers share one small pool. Both are configured
//! here, once, before the first promise needs them.
//!
//! ```
//! use promises::Config;
//! let _ = Config::from_env().observer_threads(2).install();
//! ```
use std::{env, num::NonZeroUsize, str::FromStr, sync::OnceLock};
use tracing::warn;

static CONFIG: OnceLock<Config> = OnceLock::new();

const OBSERVER_THREADS_VAR: &str = "PROMISES_OBSERVER_THREADS";
const THREAD_PREFIX_VAR: &str = "PROMISES_THREAD_PREFIX";
const STACK_SIZE_VAR: &str = "PROMISES_STACK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    observer_threads: usize,
    thread_name_prefix: String,
    stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            observer_threads: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            thread_name_prefix: "promises".into(),
            stack_size: None,
        }
    }
}

impl Config {
    /// Defaults overridden by `PROMISES_OBSERVER_THREADS`,
    /// `PROMISES_THREAD_PREFIX` and `PROMISES_STACK_SIZE`. Unparsable values
    /// are logged and skipped.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(threads) = parse_var::<usize>(OBSERVER_THREADS_VAR) {
            config = config.observer_threads(threads);
        }
        if let Ok(prefix) = env::var(THREAD_PREFIX_VAR) {
            config = config.thread_name_prefix(prefix);
        }
        if let Some(size) = parse_var::<usize>(STACK_SIZE_VAR) {
            config = config.stack_size(size);
        }
        config
    }

    /// Size of the observer pool. Zero is raised to one.
    pub fn observer_threads(mut self, n: usize) -> Self {
        self.observer_threads = n.max(1);
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Stack size for generator and observer threads.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn get_observer_threads(&self) -> usize {
        self.observer_threads
    }

    pub fn get_thread_name_prefix(&self) -> &str {
        &self.thread_name_prefix
    }

    pub fn get_stack_size(&self) -> Option<usize> {
        self.stack_size
    }

    /// Makes this the process-wide configuration. Fails, handing the config
    /// back, once a configuration is in place; that happens implicitly the
    /// first time a promise spawns work.
    pub fn install(self) -> Result<(), Config> {
        CONFIG.set(self)
    }
}

pub(crate) fn current() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
