//! Mock implementations for testing

use crate::context::PluginContext;
use crate::plugin::{Plugin, PluginTest};
use crate::PluginError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered log of lifecycle calls across several mock plugins
///
/// Entries have the form `"<plugin>:<hook>"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Entries for one hook, in call order, reduced to the plugin name
    pub fn plugins_for(&self, hook: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| {
                let (plugin, h) = entry.split_once(':')?;
                (h == hook).then(|| plugin.to_string())
            })
            .collect()
    }

    /// Position of an entry in the log
    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries.lock().unwrap().iter().position(|e| e == entry)
    }

    /// Check whether an entry was recorded
    pub fn contains(&self, entry: &str) -> bool {
        self.position(entry).is_some()
    }
}

/// Mock plugin recording every hook into a [`CallLog`]
#[derive(Debug)]
pub struct MockPlugin {
    name: String,
    log: CallLog,
    init_error: Option<String>,
    init_delay: Duration,
    publishes: Vec<String>,
    requires: Vec<String>,
    failing_test: bool,
}

impl MockPlugin {
    /// Create a new mock plugin logging into `log`
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
            init_error: None,
            init_delay: Duration::ZERO,
            publishes: Vec::new(),
            requires: Vec::new(),
            failing_test: false,
        }
    }

    /// Make `initialize` fail with `message`
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.init_error = Some(message.into());
        self
    }

    /// Sleep for `delay` inside `initialize`
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Publish a string object named `name` during `initialize`
    pub fn publishing(mut self, name: impl Into<String>) -> Self {
        self.publishes.push(name.into());
        self
    }

    /// Look up object `name` during `extensions_initialized`
    ///
    /// Logs `"<plugin>:found:<name>"` or `"<plugin>:missing:<name>"`.
    pub fn requiring(mut self, name: impl Into<String>) -> Self {
        self.requires.push(name.into());
        self
    }

    /// Expose a self-test that always fails
    pub fn with_failing_test(mut self) -> Self {
        self.failing_test = true;
        self
    }

    fn record(&self, hook: &str) {
        self.log.record(format!("{}:{}", self.name, hook));
    }
}

impl Plugin for MockPlugin {
    fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        if !self.init_delay.is_zero() {
            std::thread::sleep(self.init_delay);
        }
        for arg in ctx.arguments() {
            self.record(&format!("arg:{arg}"));
        }
        self.record("initialize");

        if let Some(message) = &self.init_error {
            return Err(PluginError::failed(message));
        }
        for name in &self.publishes {
            ctx.add_object(name.clone(), Arc::new(format!("{} object", self.name)));
        }
        Ok(())
    }

    fn extensions_initialized(&mut self, ctx: &mut PluginContext<'_>) {
        for name in &self.requires {
            let outcome = if ctx.object::<String>(name).is_some() {
                "found"
            } else {
                "missing"
            };
            self.record(&format!("{outcome}:{name}"));
        }
        self.record("extensionsInitialized");
    }

    fn about_to_shutdown(&mut self, _ctx: &mut PluginContext<'_>) {
        self.record("aboutToShutdown");
    }

    fn shutdown(&mut self) {
        self.record("shutdown");
    }

    fn tests(&self) -> Vec<PluginTest> {
        let mut tests = vec![PluginTest::new("smoke", || Ok(()))];
        if self.failing_test {
            tests.push(PluginTest::new("broken", || {
                Err(PluginError::failed("assertion failed"))
            }));
        }
        tests
    }
}

impl Drop for MockPlugin {
    fn drop(&mut self) {
        self.record("drop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ObjectPool;

    #[test]
    fn test_mock_records_hooks() {
        let log = CallLog::new();
        let mut pool = ObjectPool::new();
        let args = vec!["mode=fast".to_string()];

        {
            let mut plugin = MockPlugin::new("A", log.clone()).publishing("a.service");
            let mut ctx = PluginContext::new("A", &args, &mut pool);
            plugin.initialize(&mut ctx).unwrap();
            plugin.extensions_initialized(&mut ctx);
            plugin.about_to_shutdown(&mut ctx);
            plugin.shutdown();
        }

        assert_eq!(
            log.entries(),
            vec![
                "A:arg:mode=fast",
                "A:initialize",
                "A:extensionsInitialized",
                "A:aboutToShutdown",
                "A:shutdown",
                "A:drop",
            ]
        );
        assert!(pool.contains("a.service"));
    }

    #[test]
    fn test_mock_failure_and_lookup() {
        let log = CallLog::new();
        let mut pool = ObjectPool::new();

        let mut failing = MockPlugin::new("E", log.clone()).failing_with("boom");
        let mut ctx = PluginContext::new("E", &[], &mut pool);
        assert_eq!(failing.initialize(&mut ctx).unwrap_err().to_string(), "boom");

        let mut consumer = MockPlugin::new("D", log.clone()).requiring("e.service");
        let mut ctx = PluginContext::new("D", &[], &mut pool);
        consumer.extensions_initialized(&mut ctx);

        assert!(log.contains("D:missing:e.service"));
        assert_eq!(log.plugins_for("initialize"), vec!["E"]);
    }
}
