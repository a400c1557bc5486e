//! Parallel graph execution
//!
//! One task per node over a work-stealing pool. Data edges are the only
//! precedence constraint: a node is dispatched once every incoming edge has
//! been resolved by its source completing (or skipping). Conditional gating
//! and skip propagation happen inside the task body, so an inactive sub-DAG
//! drains without a second pass. The first failure wins and cancels the rest
//! cooperatively.

use crossbeam::channel;
use log::{debug, trace};
use once_cell::sync::OnceCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::config::ExecutorConfig;
use crate::errors::{GraphError, Result};
use crate::graph::{Graph, NodeExecutionState};
use crate::schedule::Schedule;
use crate::value::Value;

const PENDING: u8 = 0;
const ACTIVE: u8 = 1;
const SKIPPED: u8 = 2;
const COMPLETED: u8 = 3;

fn decode_state(raw: u8) -> NodeExecutionState {
    match raw {
        ACTIVE => NodeExecutionState::Active,
        SKIPPED => NodeExecutionState::Skipped,
        COMPLETED => NodeExecutionState::Completed,
        _ => NodeExecutionState::Pending,
    }
}

/// Shared per-run state, indexed by the schedule's dense node index
///
/// Each cell is written exactly once by its own task; other tasks read it
/// only after the data-edge precedence, so the happens-before of §5 holds.
struct RunContext {
    inputs: Vec<OnceCell<Vec<Value>>>,
    outputs: Vec<OnceCell<Vec<Value>>>,
    states: Vec<AtomicU8>,
}

impl RunContext {
    fn new(n: usize) -> Self {
        Self {
            inputs: (0..n).map(|_| OnceCell::new()).collect(),
            outputs: (0..n).map(|_| OnceCell::new()).collect(),
            states: (0..n).map(|_| AtomicU8::new(PENDING)).collect(),
        }
    }

    fn set_state(&self, idx: usize, state: u8) {
        self.states[idx].store(state, Ordering::SeqCst);
    }

    fn state(&self, idx: usize) -> u8 {
        self.states[idx].load(Ordering::SeqCst)
    }
}

pub(crate) fn run(graph: &mut Graph, config: &ExecutorConfig) -> Result<()> {
    eprintln!("DEBUG run() entry");
    // Per-run reset: type-appropriate zeros in every input slot, cleared
    // outputs, every node Pending.
    for node in graph.nodes.values_mut() {
        node.input_values = node.ty.inputs.iter().map(|tag| Value::zero(*tag)).collect();
        node.output_values.clear();
    }
    graph.states = graph
        .nodes
        .keys()
        .map(|&id| (id, NodeExecutionState::Pending))
        .collect();

    let schedule = Schedule::analyze(graph)?;
    eprintln!("DEBUG schedule analyzed, n={}", schedule.ids.len());
    let n = schedule.ids.len();
    if n == 0 {
        return Ok(());
    }

    let ctx = RunContext::new(n);
    eprintln!("DEBUG ctx created, worker_threads={:?}", config.worker_threads);
    let failed = AtomicBool::new(false);
    let first_error: Mutex<Option<GraphError>> = Mutex::new(None);

    {
        let graph = &*graph;
        let frontier = || run_frontier(graph, &schedule, &ctx, &failed, &first_error);
        match config.worker_threads {
            None => frontier(),
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| GraphError::ComputeFailed {
                        type_name: "executor".to_string(),
                        reason: format!("thread pool: {e}"),
                    })?;
                pool.install(frontier);
            }
        }
    }

    // The pool is quiescent; commit results single-threaded. Pins whose
    // producer completed stay readable even when the run failed.
    let RunContext {
        inputs,
        outputs,
        states,
    } = ctx;
    for (((&id, input), output), state) in schedule
        .ids
        .iter()
        .zip(inputs)
        .zip(outputs)
        .zip(states)
    {
        graph.states.insert(id, decode_state(state.into_inner()));
        if let Some(node) = graph.nodes.get_mut(&id) {
            if let Some(values) = input.into_inner() {
                node.input_values = values;
            }
            if let Some(values) = output.into_inner() {
                node.output_values = values;
            }
        }
    }

    match first_error
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Dispatch loop: receive ready nodes, spawn their tasks, release dependents
/// as indegrees drain to zero
fn run_frontier(
    graph: &Graph,
    schedule: &Schedule,
    ctx: &RunContext,
    failed: &AtomicBool,
    first_error: &Mutex<Option<GraphError>>,
) {
    eprintln!("DEBUG run_frontier entry");
    let n = schedule.ids.len();
    let remaining = Mutex::new(schedule.indegree.clone());
    let (ready_tx, ready_rx) = channel::unbounded::<Option<usize>>();
    for idx in 0..n {
        if schedule.indegree[idx] == 0 {
            let _ = ready_tx.send(Some(idx));
        }
    }

    eprintln!("DEBUG before rayon::scope");
    rayon::scope(|scope| {
        eprintln!("DEBUG inside rayon::scope closure");
        let remaining = &remaining;
        let mut dispatched = 0usize;
        while dispatched < n {
            eprintln!("DEBUG dispatcher waiting, dispatched={dispatched}");
            let idx = match ready_rx.recv() {
                Ok(Some(idx)) => idx,
                // A failing task wakes the dispatcher with None; the scope
                // then drains the in-flight tasks before run returns.
                Ok(None) | Err(_) => break,
            };
            eprintln!("DEBUG dispatcher got idx={idx}");
            dispatched += 1;
            let ready_tx = ready_tx.clone();
            scope.spawn(move |_| {
                eprintln!("DEBUG spawned task for idx={idx} starting");
                run_node(graph, schedule, ctx, failed, first_error, idx);
                if failed.load(Ordering::SeqCst) {
                    let _ = ready_tx.send(None);
                    return;
                }
                let mut remaining = remaining.lock().unwrap_or_else(PoisonError::into_inner);
                for &dep in &schedule.fanout[idx] {
                    remaining[dep] -= 1;
                    if remaining[dep] == 0 {
                        let _ = ready_tx.send(Some(dep));
                    }
                }
            });
        }
    });
}

fn run_node(
    graph: &Graph,
    schedule: &Schedule,
    ctx: &RunContext,
    failed: &AtomicBool,
    first_error: &Mutex<Option<GraphError>>,
    idx: usize,
) {
    if failed.load(Ordering::SeqCst) {
        return;
    }

    let id = schedule.ids[idx];
    let node = &graph.nodes[&id];
    eprintln!("DEBUG run_node start idx={idx} id={id}");

    if let Some((if_idx, required)) = schedule.gates[idx] {
        let then_value = ctx.outputs[if_idx]
            .get()
            .and_then(|outs| outs.first().and_then(Value::as_bool));
        match then_value {
            None => {
                trace!("node {id} skipped: conditional source produced no outputs");
                ctx.set_state(idx, SKIPPED);
                return;
            }
            Some(then_value) if then_value != required => {
                trace!("node {id} skipped: inactive branch");
                ctx.set_state(idx, SKIPPED);
                return;
            }
            Some(_) => {}
        }
    }

    ctx.set_state(idx, ACTIVE);

    let mut inputs = node.input_values.clone();
    for (slot, binding) in schedule.input_map[idx].iter().enumerate() {
        let Some((src_idx, from_out)) = *binding else {
            continue;
        };
        if ctx.state(src_idx) == SKIPPED {
            trace!("node {id} skipped: upstream node {} skipped", schedule.ids[src_idx]);
            ctx.set_state(idx, SKIPPED);
            return;
        }
        let source = &graph.nodes[&schedule.ids[src_idx]];
        // A control-only binding (conditional source, mismatched tags) gates
        // this node but carries no data; the slot keeps its pre-seeded zero.
        if source.ty.is_conditional() && source.ty.outputs[from_out] != node.ty.inputs[slot] {
            continue;
        }
        match ctx.outputs[src_idx]
            .get()
            .and_then(|outs| outs.get(from_out))
        {
            Some(value) => inputs[slot] = value.clone(),
            None => {
                record_failure(
                    failed,
                    first_error,
                    GraphError::DanglingEdge {
                        from: source.id,
                        port: from_out,
                    },
                );
                return;
            }
        }
    }

    let mut scratch = node.clone();
    scratch.input_values = inputs.clone();
    let outputs = match catch_unwind(AssertUnwindSafe(|| (node.ty.compute)(&scratch))) {
        Ok(Ok(outputs)) => outputs,
        Ok(Err(reason)) => {
            record_failure(
                failed,
                first_error,
                GraphError::ComputeFailed {
                    type_name: node.ty.name.to_string(),
                    reason,
                },
            );
            return;
        }
        Err(_) => {
            record_failure(
                failed,
                first_error,
                GraphError::ComputeFailed {
                    type_name: node.ty.name.to_string(),
                    reason: "panicked".to_string(),
                },
            );
            return;
        }
    };

    let _ = ctx.inputs[idx].set(inputs);
    let _ = ctx.outputs[idx].set(outputs);
    ctx.set_state(idx, COMPLETED);
    eprintln!("DEBUG run_node done idx={idx} id={id}");
}

fn record_failure(
    failed: &AtomicBool,
    first_error: &Mutex<Option<GraphError>>,
    error: GraphError,
) {
    let mut slot = first_error.lock().unwrap_or_else(PoisonError::into_inner);
    if !failed.load(Ordering::SeqCst) {
        debug!("run failed: {error}");
        *slot = Some(error);
        failed.store(true, Ordering::SeqCst);
    }
}
