//! Core plugin trait and types

use crate::context::PluginContext;
use crate::error::Result;
use std::fmt;

/// Capability contract every loadable plugin implements
///
/// The host calls the hooks strictly in this order, each at most once:
/// `initialize`, `extensions_initialized`, `about_to_shutdown`, `shutdown`.
/// A hook is only reached if the previous one succeeded and every
/// dependency of the plugin reached the same stage.
pub trait Plugin: Send + fmt::Debug {
    /// Private setup, called in dependency order
    ///
    /// Dependencies have already been initialized. Objects other plugins are
    /// meant to consume should be published here with
    /// [`PluginContext::add_object`].
    fn initialize(&mut self, ctx: &mut PluginContext<'_>) -> Result<()>;

    /// Cross-plugin wiring, called after every plugin finished `initialize`
    ///
    /// Invoked in reverse dependency order, so dependents run before the
    /// plugins they depend on.
    fn extensions_initialized(&mut self, ctx: &mut PluginContext<'_>);

    /// Called in reverse dependency order before any plugin is shut down
    fn about_to_shutdown(&mut self, _ctx: &mut PluginContext<'_>) {}

    /// Final teardown, called right before the instance is released
    fn shutdown(&mut self) {}

    /// Self-tests run when the host is started in test mode
    fn tests(&self) -> Vec<PluginTest> {
        Vec::new()
    }
}

type TestFn = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// A named self-test exposed by a plugin
pub struct PluginTest {
    name: String,
    run: TestFn,
}

impl fmt::Debug for PluginTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginTest")
            .field("name", &self.name)
            .finish()
    }
}

impl PluginTest {
    /// Create a new test
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    /// Test name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the test
    pub fn run(&self) -> Result<()> {
        (self.run)()
    }
}
