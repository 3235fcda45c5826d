//! Seam between compilation and execution.

use crate::error::EngineError;
use crate::ir::Module;

/// Execution-side consumer of generated units.
///
/// Drivers only ever talk to one of these, so how code actually runs
/// (the bundled interpreter, or a real JIT elsewhere) stays swappable.
pub trait Backend {
    /// Load one generated unit.
    fn add_module(&mut self, module: Module);

    /// Run the named function with no arguments.
    fn invoke(&mut self, name: &str) -> Result<f64, EngineError>;

    /// Unload a unit by module name, dropping its functions.
    fn remove_unit(&mut self, name: &str);
}
