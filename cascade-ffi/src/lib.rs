//! C handle API for the cascade engine
//!
//! Conventions of the boundary: graphs are opaque heap pointers created and
//! destroyed here; operations return 0 on success and a stable non-zero kind
//! code on failure, with `cascade_last_error` carrying the message; all
//! strings are nul-terminated UTF-8; returned string pointers remain valid
//! until the next string-returning call on the same thread. A graph handle
//! must not be driven from two threads at once, but independent handles may
//! run concurrently.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use cascade_core::{describe, Graph, GraphError, Value, ValueType};

mod error;
use error::{last_error_ptr, return_string, return_string_with_len, set_last_error};

/// Stable code for each error kind; the public contract is zero/non-zero
fn error_code(err: &GraphError) -> i32 {
    match err {
        GraphError::NullArg { .. } => 1,
        GraphError::UnknownType { .. } => 2,
        GraphError::UnknownNode { .. } => 3,
        GraphError::UnknownParam { .. } => 4,
        GraphError::DuplicateId { .. } => 5,
        GraphError::PortIndexOutOfRange { .. } => 6,
        GraphError::TypeMismatch { .. } | GraphError::PinTypeMismatch { .. } => 7,
        GraphError::CycleDetected { .. } => 8,
        GraphError::DanglingEdge { .. } => 9,
        GraphError::ComputeFailed { .. } => 10,
        GraphError::NotComputed { .. } => 11,
        GraphError::IndexOutOfRange { .. } => 12,
    }
}

/// Numeric tag returned by `cascade_get_output_type`
fn tag_code(tag: ValueType) -> i32 {
    match tag {
        ValueType::Number => 0,
        ValueType::String => 1,
        ValueType::Bool => 2,
    }
}

fn fail(err: GraphError) -> i32 {
    set_last_error(&err.to_string());
    error_code(&err)
}

fn fail_null(err: GraphError) -> *const c_char {
    set_last_error(&err.to_string());
    std::ptr::null()
}

unsafe fn required_str<'a>(
    ptr: *const c_char,
    what: &'static str,
) -> Result<&'a str, GraphError> {
    if ptr.is_null() {
        return Err(GraphError::NullArg { what });
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| GraphError::NullArg { what })
}

unsafe fn optional_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        None
    } else {
        CStr::from_ptr(ptr).to_str().ok()
    }
}

/// Allocate an empty graph. Destroy it with `cascade_graph_destroy`.
#[no_mangle]
pub extern "C" fn cascade_graph_create() -> *mut Graph {
    Box::into_raw(Box::new(Graph::new()))
}

/// Free a graph. Null is accepted and ignored.
///
/// # Safety
/// `graph` must be null or a pointer from `cascade_graph_create` not yet
/// destroyed.
#[no_mangle]
pub unsafe extern "C" fn cascade_graph_destroy(graph: *mut Graph) {
    if !graph.is_null() {
        drop(Box::from_raw(graph));
    }
}

/// Register a node of `type_name` under a caller-chosen id. `label` may be
/// null.
///
/// # Safety
/// `graph` must be a live handle; string arguments must be null or
/// nul-terminated.
#[no_mangle]
pub unsafe extern "C" fn cascade_add_node_with_id(
    graph: *mut Graph,
    id: i32,
    type_name: *const c_char,
    label: *const c_char,
) -> i32 {
    let Some(graph) = graph.as_mut() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    let type_name = match required_str(type_name, "type_name") {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let label = optional_str(label);
    match graph.add_node(id, type_name, label) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

/// # Safety
/// `graph` must be a live handle; `key` must be nul-terminated.
#[no_mangle]
pub unsafe extern "C" fn cascade_set_param_number(
    graph: *mut Graph,
    id: i32,
    key: *const c_char,
    value: f64,
) -> i32 {
    set_param(graph, id, key, Value::Number(value))
}

/// # Safety
/// `graph` must be a live handle; `key` and `value` must be nul-terminated.
#[no_mangle]
pub unsafe extern "C" fn cascade_set_param_string(
    graph: *mut Graph,
    id: i32,
    key: *const c_char,
    value: *const c_char,
) -> i32 {
    let value = match required_str(value, "value") {
        Ok(s) => s.to_string(),
        Err(e) => return fail(e),
    };
    set_param(graph, id, key, Value::String(value))
}

/// Non-zero `value` is true.
///
/// # Safety
/// `graph` must be a live handle; `key` must be nul-terminated.
#[no_mangle]
pub unsafe extern "C" fn cascade_set_param_bool(
    graph: *mut Graph,
    id: i32,
    key: *const c_char,
    value: i32,
) -> i32 {
    set_param(graph, id, key, Value::Bool(value != 0))
}

unsafe fn set_param(graph: *mut Graph, id: i32, key: *const c_char, value: Value) -> i32 {
    let Some(graph) = graph.as_mut() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    let key = match required_str(key, "key") {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    match graph.set_param(id, key, value) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

/// Connect an output port to an input port. Negative port indexes report out
/// of range.
///
/// # Safety
/// `graph` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn cascade_connect(
    graph: *mut Graph,
    from_id: i32,
    from_out: i32,
    to_id: i32,
    to_in: i32,
) -> i32 {
    let Some(graph) = graph.as_mut() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    // Sign extension turns a negative index into an out-of-range usize.
    match graph.connect(from_id, from_out as usize, to_id, to_in as usize) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

/// Designate output `out_idx` of node `id` as an externally readable pin.
///
/// # Safety
/// `graph` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn cascade_add_output(graph: *mut Graph, id: i32, out_idx: i32) -> i32 {
    let Some(graph) = graph.as_mut() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    match graph.add_output(id, out_idx as usize) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

/// Execute the graph. No panic crosses this boundary.
///
/// # Safety
/// `graph` must be a live handle not being driven from another thread.
#[no_mangle]
pub unsafe extern "C" fn cascade_run(graph: *mut Graph) -> i32 {
    let Some(graph) = graph.as_mut() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    match catch_unwind(AssertUnwindSafe(|| graph.run())) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => fail(e),
        Err(_) => fail(GraphError::ComputeFailed {
            type_name: "engine".to_string(),
            reason: "panicked".to_string(),
        }),
    }
}

/// Number of designated pins, or -1 on a null handle.
///
/// # Safety
/// `graph` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn cascade_get_output_count(graph: *const Graph) -> i32 {
    let Some(graph) = graph.as_ref() else {
        fail(GraphError::NullArg { what: "graph" });
        return -1;
    };
    graph.get_output_count() as i32
}

/// Type tag of a pin (0 = number, 1 = string, 2 = bool), or -1 with
/// `last_error` set.
///
/// # Safety
/// `graph` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn cascade_get_output_type(graph: *const Graph, index: i32) -> i32 {
    let Some(graph) = graph.as_ref() else {
        fail(GraphError::NullArg { what: "graph" });
        return -1;
    };
    match graph.get_output_type(index as usize) {
        Ok(tag) => tag_code(tag),
        Err(e) => {
            fail(e);
            -1
        }
    }
}

/// # Safety
/// `graph` must be a live handle; `out` must point to writable storage.
#[no_mangle]
pub unsafe extern "C" fn cascade_get_output_number(
    graph: *const Graph,
    index: i32,
    out: *mut f64,
) -> i32 {
    let Some(graph) = graph.as_ref() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    if out.is_null() {
        return fail(GraphError::NullArg { what: "out" });
    }
    match graph.get_output_number(index as usize) {
        Ok(value) => {
            *out = value;
            0
        }
        Err(e) => fail(e),
    }
}

/// Writes 1 for true, 0 for false.
///
/// # Safety
/// `graph` must be a live handle; `out` must point to writable storage.
#[no_mangle]
pub unsafe extern "C" fn cascade_get_output_bool(
    graph: *const Graph,
    index: i32,
    out: *mut i32,
) -> i32 {
    let Some(graph) = graph.as_ref() else {
        return fail(GraphError::NullArg { what: "graph" });
    };
    if out.is_null() {
        return fail(GraphError::NullArg { what: "out" });
    }
    match graph.get_output_bool(index as usize) {
        Ok(value) => {
            *out = i32::from(value);
            0
        }
        Err(e) => fail(e),
    }
}

/// String value of a pin, or null with `last_error` set. The pointer is
/// valid until the next string-returning call on this thread.
///
/// # Safety
/// `graph` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn cascade_get_output_string(
    graph: *const Graph,
    index: i32,
) -> *const c_char {
    let Some(graph) = graph.as_ref() else {
        return fail_null(GraphError::NullArg { what: "graph" });
    };
    match graph.get_output_string(index as usize) {
        Ok(value) => return_string(value),
        Err(e) => fail_null(e),
    }
}

/// Like `cascade_get_output_string`, additionally writing the byte length
/// (excluding the terminating nul) to `len_out`.
///
/// # Safety
/// `graph` must be null or a live handle; `len_out` must point to writable
/// storage.
#[no_mangle]
pub unsafe extern "C" fn cascade_get_output_string_view(
    graph: *const Graph,
    index: i32,
    len_out: *mut usize,
) -> *const c_char {
    let Some(graph) = graph.as_ref() else {
        return fail_null(GraphError::NullArg { what: "graph" });
    };
    if len_out.is_null() {
        return fail_null(GraphError::NullArg { what: "len_out" });
    }
    match graph.get_output_string(index as usize) {
        Ok(value) => {
            let (ptr, len) = return_string_with_len(value);
            *len_out = len;
            ptr
        }
        Err(e) => fail_null(e),
    }
}

/// JSON array of registered type names.
#[no_mangle]
pub extern "C" fn cascade_list_types() -> *const c_char {
    return_string(&describe::list_types_json())
}

/// JSON signature of one type, or null with `last_error` set.
///
/// # Safety
/// `name` must be null or nul-terminated.
#[no_mangle]
pub unsafe extern "C" fn cascade_describe_type(name: *const c_char) -> *const c_char {
    let name = match required_str(name, "name") {
        Ok(s) => s,
        Err(e) => return fail_null(e),
    };
    match describe::describe_type_json(name) {
        Ok(json) => return_string(&json),
        Err(e) => fail_null(e),
    }
}

/// Message of the last failing boundary operation on this thread.
#[no_mangle]
pub extern "C" fn cascade_last_error() -> *const c_char {
    last_error_ptr()
}
