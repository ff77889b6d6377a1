//! V8 JavaScript runtime using deno_core
//!
//! Each execution gets a fresh isolate on a blocking thread. The only capability
//! exposed to user code is a synthetic `console` that appends to an in-memory
//! buffer; `Deno` and `eval` are removed before the snippet runs.

use super::Runtime;
use crate::error::{SandboxError, SandboxResult};
use crate::language::Language;
use crate::limits::ResourceLimits;
use crate::types::ExecutionResult;
use async_trait::async_trait;
use deno_core::{op2, v8, Extension, JsRuntime, OpState, RuntimeOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Console bytes kept per execution, matching the subprocess capture cap
pub(crate) const MAX_CONSOLE_BYTES: usize = super::process::MAX_CAPTURE_BYTES;

/// Heap granted past the ceiling so a terminated script can unwind its
/// current allocation instead of hitting V8's fatal OOM handler
const HEAP_GRACE_BYTES: usize = 256 * 1024 * 1024;

/// Extra time given to the watchdog before the async backstop fires
const BACKSTOP_GRACE: Duration = Duration::from_millis(500);

struct ConsoleBuffer {
    lines: Vec<String>,
    bytes: usize,
    overflowed: bool,
    isolate: v8::IsolateHandle,
}

impl ConsoleBuffer {
    fn new(isolate: v8::IsolateHandle) -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            overflowed: false,
            isolate,
        }
    }

    /// Append a line, or stop the script once the byte cap would be crossed
    fn push(&mut self, line: &str) {
        if self.overflowed {
            return;
        }
        // +1 for the newline that joins it to the previous line
        let needed = line.len() + usize::from(!self.lines.is_empty());
        if self.bytes + needed > MAX_CONSOLE_BYTES {
            self.overflowed = true;
            self.isolate.terminate_execution();
            return;
        }
        self.bytes += needed;
        self.lines.push(line.to_string());
    }
}

#[op2(fast)]
fn op_sandbox_console(state: &mut OpState, #[string] line: &str) {
    state.borrow_mut::<ConsoleBuffer>().push(line);
}

fn console_extension() -> Extension {
    Extension {
        name: "mitra_console",
        ops: std::borrow::Cow::Owned(vec![op_sandbox_console()]),
        ..Default::default()
    }
}

/// Installs the synthetic console and strips code-generation and host access
const BOOTSTRAP_JS: &str = r#"
((ops) => {
    const write = (line) => ops.op_sandbox_console(String(line));
    const format = (args) => args.join(" ");
    globalThis.console = Object.freeze({
        log: (...args) => write(format(args)),
        info: (...args) => write(format(args)),
        warn: (...args) => write(format(args)),
        debug: (...args) => write(format(args)),
        error: (...args) => write("Error: " + format(args)),
    });
    delete globalThis.Deno;
    delete globalThis.eval;
})(Deno.core.ops);
"#;

struct HeapLimitState {
    handle: v8::IsolateHandle,
    triggered: AtomicBool,
}

extern "C" fn near_heap_limit_callback(
    data: *mut std::ffi::c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    // SAFETY: `data` points at the boxed HeapLimitState owned by `evaluate`,
    // which outlives the isolate's execution.
    let state = unsafe { &*(data as *const HeapLimitState) };
    if !state.triggered.swap(true, Ordering::SeqCst) {
        state.handle.terminate_execution();
    }
    current_heap_limit.saturating_add(current_heap_limit.max(HEAP_GRACE_BYTES))
}

/// Raw outcome of one evaluation, before normalization
struct Evaluation {
    lines: Vec<String>,
    value: Result<String, String>,
    timed_out: bool,
    heap_exceeded: bool,
    console_overflowed: bool,
}

/// V8 JavaScript runtime
pub struct V8Runtime {
    /// Resource limits for execution
    limits: ResourceLimits,
}

impl V8Runtime {
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::default())
    }

    /// Create V8 runtime with custom resource limits
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self { limits }
    }
}

impl Default for V8Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate(code: String, limits: &ResourceLimits) -> Evaluation {
    // Set initial to 10MB or 10% of max, whichever is smaller
    let max_bytes = limits.max_heap_bytes;
    let initial_bytes = (max_bytes / 10).min(10 * 1024 * 1024);
    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![console_extension()],
        create_params: Some(v8::CreateParams::default().heap_limits(initial_bytes, max_bytes)),
        ..Default::default()
    });
    let console = ConsoleBuffer::new(runtime.v8_isolate().thread_safe_handle());
    runtime.op_state().borrow_mut().put(console);

    if let Err(e) = runtime.execute_script("<sandbox-bootstrap>", BOOTSTRAP_JS) {
        return Evaluation {
            lines: Vec::new(),
            value: Err(format!("Sandbox bootstrap failed: {}", e)),
            timed_out: false,
            heap_exceeded: false,
            console_overflowed: false,
        };
    }

    let heap_state = Box::new(HeapLimitState {
        handle: runtime.v8_isolate().thread_safe_handle(),
        triggered: AtomicBool::new(false),
    });
    runtime.v8_isolate().add_near_heap_limit_callback(
        near_heap_limit_callback,
        &*heap_state as *const HeapLimitState as *mut std::ffi::c_void,
    );

    // Watchdog terminates CPU-bound loops once the budget elapses
    let watchdog_handle = runtime.v8_isolate().thread_safe_handle();
    let timed_out = Arc::new(AtomicBool::new(false));
    let watchdog_timed_out = timed_out.clone();
    let budget = limits.max_duration;
    let (cancel_tx, cancel_rx) = std::sync::mpsc::channel::<()>();
    let watchdog = std::thread::spawn(move || {
        if let Err(std::sync::mpsc::RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(budget) {
            watchdog_timed_out.store(true, Ordering::SeqCst);
            watchdog_handle.terminate_execution();
        }
    });

    let value = match runtime.execute_script("<sandbox>", code) {
        Ok(global) => {
            let scope = &mut runtime.handle_scope();
            let local = v8::Local::new(scope, global);
            if local.is_undefined() {
                Ok(String::new())
            } else {
                Ok(local.to_rust_string_lossy(scope))
            }
        }
        Err(e) => Err(js_error_message(&e.to_string())),
    };

    // The watchdog must be gone before the isolate is dropped
    let _ = cancel_tx.send(());
    let _ = watchdog.join();

    let (lines, console_overflowed) = runtime
        .op_state()
        .borrow_mut()
        .try_take::<ConsoleBuffer>()
        .map(|buffer| (buffer.lines, buffer.overflowed))
        .unwrap_or_default();

    let heap_exceeded = heap_state.triggered.load(Ordering::SeqCst);
    drop(runtime);

    Evaluation {
        lines,
        value,
        timed_out: timed_out.load(Ordering::SeqCst),
        heap_exceeded,
        console_overflowed,
    }
}

/// First line of a JsError rendering, without the "Uncaught " prefix and stack
fn js_error_message(rendered: &str) -> String {
    let first = rendered.lines().next().unwrap_or(rendered).trim();
    let message = first.strip_prefix("Uncaught ").unwrap_or(first);
    if message.is_empty() {
        "JavaScript execution failed".to_string()
    } else {
        message.to_string()
    }
}

#[async_trait]
impl Runtime for V8Runtime {
    async fn run(&self, source: &str) -> SandboxResult<ExecutionResult> {
        let code = source.to_string();
        let limits = self.limits.clone();
        let budget = limits.max_duration;
        let start = Instant::now();

        let task_handle = tokio::task::spawn_blocking(move || evaluate(code, &limits));

        let evaluation = match tokio::time::timeout(budget + BACKSTOP_GRACE, task_handle).await {
            Ok(Ok(evaluation)) => evaluation,
            Ok(Err(join_err)) => {
                return Err(SandboxError::Internal(format!("V8 task panicked: {}", join_err)))
            }
            Err(_timeout) => {
                tracing::warn!(elapsed_ms = start.elapsed().as_millis() as u64, "V8 watchdog missed its deadline");
                return Ok(ExecutionResult::timeout(
                    format!("Script execution timed out after {}s", budget.as_secs_f64()),
                    "",
                ));
            }
        };

        let output = evaluation.lines.join("\n");

        if evaluation.timed_out {
            return Ok(ExecutionResult::timeout(
                format!("Script execution timed out after {}s", budget.as_secs_f64()),
                output,
            ));
        }

        if evaluation.console_overflowed {
            return Ok(ExecutionResult::failed(
                format!("Console output limit exceeded ({} MiB)", MAX_CONSOLE_BYTES / (1024 * 1024)),
                output,
            ));
        }

        if evaluation.heap_exceeded {
            return Ok(ExecutionResult::failed("Script exceeded memory limit", output));
        }

        match evaluation.value {
            Ok(value) => Ok(ExecutionResult::succeeded(output).with_return_value(value)),
            Err(message) => Ok(ExecutionResult::failed(message, output)),
        }
    }

    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn name(&self) -> &str {
        "v8"
    }
}
