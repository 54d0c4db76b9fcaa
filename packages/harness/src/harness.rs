//! The execution harness.
//!
//! Every call to [`Harness::execute`] walks the same sequence:
//!
//! 1. **Load** - compile the module and instantiate it with no imports.
//! 2. **Validate exports** - `run: (i32, i32) -> i32` and a linear memory.
//! 3. **Prepare memory** - grow if needed, write input at the fixed offset.
//! 4. **Invoke** - call `run(offset, len)`.
//! 5. **Extract result** - read the length-prefixed output record.
//! 6. **Teardown** - drop the sandbox, on success and failure alike.
//!
//! Only the compiled-code [`Engine`] is shared between calls. Each call owns a
//! private [`Store`], instance and memory.

use std::time::Duration;

use uuid::Uuid;
use wasmtime::{
    Config, Engine, Instance, Memory, Module, Store, Trap, TypedFunc, UpdateDeadline,
};

use crate::cancel::CancellationSignal;
use crate::convention::{self, InputRegion, LinearMemory, ENTRY_POINT, MEMORY_EXPORT};
use crate::epoch::EpochTicker;
use crate::error::{ExecutionError, Result};

/// Unique identifier for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Create a new random ExecutionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// How often running sandboxes check their cancellation signal.
    pub epoch_tick: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            epoch_tick: Duration::from_millis(10),
        }
    }
}

/// Runs modules in fresh sandboxes.
///
/// A `Harness` is `Send + Sync`; share it with `Arc` and call
/// [`execute`](Self::execute) from as many threads as needed.
///
/// # Example
///
/// ```ignore
/// let harness = Harness::new(HarnessConfig::default())?;
/// let output = harness.execute(&module_bytes, b"ping", &CancellationSignal::new())?;
/// ```
pub struct Harness {
    engine: Engine,
    config: HarnessConfig,
    _ticker: EpochTicker,
}

impl Harness {
    /// Create a harness and start its epoch ticker.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        let mut wasm_config = Config::new();
        wasm_config.epoch_interruption(true);
        let engine = Engine::new(&wasm_config).map_err(|e| ExecutionError::Engine {
            message: format!("{:#}", e),
        })?;

        let ticker = EpochTicker::start(engine.clone(), config.epoch_tick).map_err(|e| {
            ExecutionError::Engine {
                message: format!("epoch ticker: {}", e),
            }
        })?;

        Ok(Self {
            engine,
            config,
            _ticker: ticker,
        })
    }

    /// The configuration this harness was built with.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `module` against `input` and return its output bytes.
    pub fn execute(
        &self,
        module: &[u8],
        input: &[u8],
        signal: &CancellationSignal,
    ) -> Result<Vec<u8>> {
        let id = ExecutionId::new();
        let span = tracing::debug_span!(
            "execute",
            %id,
            module_size = module.len(),
            input_size = input.len()
        );
        let _enter = span.enter();

        let result = self.run_sandbox(id, module, input, signal);
        match &result {
            Ok(output) => tracing::debug!(output_size = output.len(), "execution finished"),
            Err(e) => tracing::debug!(kind = %e.kind(), error = %e, "execution failed"),
        }
        result
    }

    fn run_sandbox(
        &self,
        id: ExecutionId,
        module: &[u8],
        input: &[u8],
        signal: &CancellationSignal,
    ) -> Result<Vec<u8>> {
        let mut sandbox = Sandbox::load(&self.engine, id, module, signal)?;
        let region = sandbox.prepare_memory(input)?;
        let ptr = sandbox.invoke(region, signal)?;
        sandbox.extract_result(ptr)
        // `sandbox` is dropped here on every path.
    }
}

/// Per-call state held by the Wasmtime store.
struct SandboxState {
    id: ExecutionId,
}

/// One instantiated module and everything it owns.
struct Sandbox {
    store: Store<SandboxState>,
    entry: TypedFunc<(i32, i32), i32>,
    memory: Memory,
}

impl Sandbox {
    /// Load the module and validate its exports.
    fn load(
        engine: &Engine,
        id: ExecutionId,
        bytes: &[u8],
        signal: &CancellationSignal,
    ) -> Result<Self> {
        let module = Module::from_binary(engine, bytes).map_err(|e| {
            ExecutionError::Instantiation {
                message: format!("{:#}", e),
            }
        })?;

        let mut store = Store::new(engine, SandboxState { id });
        store.set_epoch_deadline(1);
        let watched = signal.clone();
        store.epoch_deadline_callback(move |ctx| {
            if watched.is_cancelled() {
                tracing::debug!(id = %ctx.data().id, "interrupting cancelled sandbox");
                return Err(Trap::Interrupt.into());
            }
            Ok(UpdateDeadline::Continue(1))
        });

        if signal.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let instance = Instance::new(&mut store, &module, &[]).map_err(|e| {
            if is_interrupt(&e) {
                ExecutionError::Cancelled
            } else {
                ExecutionError::Instantiation {
                    message: format!("{:#}", e),
                }
            }
        })?;

        let entry = instance
            .get_func(&mut store, ENTRY_POINT)
            .ok_or_else(|| {
                ExecutionError::contract(format!("module does not export `{}`", ENTRY_POINT))
            })?
            .typed::<(i32, i32), i32>(&store)
            .map_err(|e| {
                ExecutionError::contract(format!(
                    "`{}` must have signature (i32, i32) -> i32: {:#}",
                    ENTRY_POINT, e
                ))
            })?;

        let memory = find_memory(&instance, &mut store)
            .ok_or_else(|| ExecutionError::contract("module does not export a linear memory"))?;

        Ok(Self {
            store,
            entry,
            memory,
        })
    }

    fn prepare_memory(&mut self, input: &[u8]) -> Result<InputRegion> {
        convention::place_input(&mut self.view(), input)
    }

    fn invoke(&mut self, region: InputRegion, signal: &CancellationSignal) -> Result<u32> {
        if signal.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        let ptr = self
            .entry
            .call(&mut self.store, region.as_args())
            .map_err(|e| {
                if is_interrupt(&e) {
                    ExecutionError::Cancelled
                } else {
                    ExecutionError::Trap {
                        message: format!("{:#}", e),
                    }
                }
            })?;
        Ok(ptr as u32)
    }

    fn extract_result(&mut self, ptr: u32) -> Result<Vec<u8>> {
        convention::read_output_record(&self.view(), ptr)
    }

    fn view(&mut self) -> SandboxMemory<'_> {
        SandboxMemory {
            memory: self.memory,
            store: &mut self.store,
        }
    }
}

/// The export named [`MEMORY_EXPORT`], otherwise the first exported memory.
fn find_memory(instance: &Instance, store: &mut Store<SandboxState>) -> Option<Memory> {
    if let Some(memory) = instance.get_memory(&mut *store, MEMORY_EXPORT) {
        return Some(memory);
    }
    instance
        .exports(&mut *store)
        .find_map(|export| export.into_memory())
}

fn is_interrupt(error: &wasmtime::Error) -> bool {
    matches!(error.downcast_ref::<Trap>(), Some(Trap::Interrupt))
}

/// A sandbox's memory seen through the calling convention.
struct SandboxMemory<'a> {
    memory: Memory,
    store: &'a mut Store<SandboxState>,
}

impl LinearMemory for SandboxMemory<'_> {
    fn size(&self) -> usize {
        self.memory.data_size(&*self.store)
    }

    fn grow(&mut self, pages: u64) -> std::result::Result<(), String> {
        self.memory
            .grow(&mut *self.store, pages)
            .map(|_| ())
            .map_err(|e| format!("{:#}", e))
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> std::result::Result<(), String> {
        self.memory
            .write(&mut *self.store, offset, data)
            .map_err(|e| e.to_string())
    }

    fn data(&self) -> &[u8] {
        self.memory.data(&*self.store)
    }
}
