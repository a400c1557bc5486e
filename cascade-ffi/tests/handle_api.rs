//! Drives the C handle API from Rust the way a foreign caller would

use std::ffi::{CStr, CString};
use std::ptr;

use cascade_ffi::*;

fn cstr(text: &str) -> CString {
    CString::new(text).unwrap()
}

unsafe fn last_error_text() -> String {
    CStr::from_ptr(cascade_last_error())
        .to_str()
        .unwrap()
        .to_string()
}

#[test]
fn test_arithmetic_graph_through_the_boundary() {
    unsafe {
        let graph = cascade_graph_create();
        assert!(!graph.is_null());

        let number = cstr("Number");
        let add = cstr("AddNumber");
        let value = cstr("value");
        assert_eq!(
            cascade_add_node_with_id(graph, 1, number.as_ptr(), ptr::null()),
            0
        );
        assert_eq!(
            cascade_add_node_with_id(graph, 2, number.as_ptr(), ptr::null()),
            0
        );
        assert_eq!(
            cascade_add_node_with_id(graph, 3, add.as_ptr(), ptr::null()),
            0
        );
        assert_eq!(cascade_set_param_number(graph, 1, value.as_ptr(), 2.0), 0);
        assert_eq!(cascade_set_param_number(graph, 2, value.as_ptr(), 3.0), 0);
        assert_eq!(cascade_connect(graph, 1, 0, 3, 0), 0);
        assert_eq!(cascade_connect(graph, 2, 0, 3, 1), 0);
        assert_eq!(cascade_add_output(graph, 3, 0), 0);

        assert_eq!(cascade_run(graph), 0);
        assert_eq!(cascade_get_output_count(graph), 1);
        assert_eq!(cascade_get_output_type(graph, 0), 0); // number tag

        let mut out = 0.0f64;
        assert_eq!(cascade_get_output_number(graph, 0, &mut out), 0);
        assert_eq!(out, 5.0);

        cascade_graph_destroy(graph);
    }
}

#[test]
fn test_string_output_and_view() {
    unsafe {
        let graph = cascade_graph_create();
        let string_ty = cstr("String");
        let text = cstr("text");
        let payload = cstr("hello");
        assert_eq!(
            cascade_add_node_with_id(graph, 1, string_ty.as_ptr(), ptr::null()),
            0
        );
        assert_eq!(
            cascade_set_param_string(graph, 1, text.as_ptr(), payload.as_ptr()),
            0
        );
        assert_eq!(cascade_add_output(graph, 1, 0), 0);
        assert_eq!(cascade_run(graph), 0);

        let ptr = cascade_get_output_string(graph, 0);
        assert!(!ptr.is_null());
        assert_eq!(CStr::from_ptr(ptr).to_str().unwrap(), "hello");

        let mut len = 0usize;
        let view = cascade_get_output_string_view(graph, 0, &mut len);
        assert!(!view.is_null());
        assert_eq!(len, 5);

        cascade_graph_destroy(graph);
    }
}

#[test]
fn test_cycle_reports_through_last_error() {
    unsafe {
        let graph = cascade_graph_create();
        let add = cstr("AddNumber");
        cascade_add_node_with_id(graph, 1, add.as_ptr(), ptr::null());
        cascade_add_node_with_id(graph, 2, add.as_ptr(), ptr::null());
        assert_eq!(cascade_connect(graph, 1, 0, 2, 0), 0);
        assert_eq!(cascade_connect(graph, 2, 0, 1, 0), 0);

        assert_ne!(cascade_run(graph), 0);
        assert!(last_error_text().contains("Cycle"));

        cascade_graph_destroy(graph);
    }
}

#[test]
fn test_error_codes_are_stable_per_kind() {
    unsafe {
        let graph = cascade_graph_create();
        let number = cstr("Number");
        let concat = cstr("Concat");
        let bogus = cstr("NoSuchType");
        cascade_add_node_with_id(graph, 1, number.as_ptr(), ptr::null());
        cascade_add_node_with_id(graph, 2, concat.as_ptr(), ptr::null());

        let duplicate = cascade_add_node_with_id(graph, 1, number.as_ptr(), ptr::null());
        let unknown = cascade_add_node_with_id(graph, 3, bogus.as_ptr(), ptr::null());
        let mismatch = cascade_connect(graph, 1, 0, 2, 0);
        let bad_port = cascade_connect(graph, 1, 5, 2, 0);
        let negative_port = cascade_connect(graph, 1, -1, 2, 0);

        for code in [duplicate, unknown, mismatch, bad_port, negative_port] {
            assert_ne!(code, 0);
        }
        assert_ne!(duplicate, unknown);
        assert_ne!(mismatch, bad_port);
        assert_eq!(bad_port, negative_port);

        // A successful call leaves the last error in place.
        let before = last_error_text();
        assert_eq!(cascade_add_output(graph, 1, 0), 0);
        assert_eq!(last_error_text(), before);

        cascade_graph_destroy(graph);
    }
}

#[test]
fn test_skipped_pin_reports_not_computed() {
    unsafe {
        let graph = cascade_graph_create();
        let bool_ty = cstr("Bool");
        let if_ty = cstr("If");
        let out_ty = cstr("OutputNumber");
        cascade_add_node_with_id(graph, 1, bool_ty.as_ptr(), ptr::null());
        cascade_add_node_with_id(graph, 2, if_ty.as_ptr(), ptr::null());
        cascade_add_node_with_id(graph, 3, out_ty.as_ptr(), ptr::null());
        assert_eq!(cascade_connect(graph, 1, 0, 2, 0), 0);
        // Then-branch of an If whose condition stays false.
        assert_eq!(cascade_connect(graph, 2, 0, 3, 0), 0);
        assert_eq!(cascade_add_output(graph, 3, 0), 0);

        assert_eq!(cascade_run(graph), 0);
        let mut out = 0.0f64;
        assert_ne!(cascade_get_output_number(graph, 0, &mut out), 0);
        assert!(last_error_text().contains("not computed"));

        cascade_graph_destroy(graph);
    }
}

#[test]
fn test_list_and_describe_serialize_the_catalog() {
    unsafe {
        let listed = cascade_list_types();
        assert!(!listed.is_null());
        let names: Vec<String> =
            serde_json::from_str(CStr::from_ptr(listed).to_str().unwrap()).unwrap();
        assert!(names.iter().any(|n| n == "If"));

        let name = cstr("ClampNumber");
        let described = cascade_describe_type(name.as_ptr());
        assert!(!described.is_null());
        let doc: serde_json::Value =
            serde_json::from_str(CStr::from_ptr(described).to_str().unwrap()).unwrap();
        assert_eq!(doc["name"], "ClampNumber");
        assert_eq!(doc["inputs"].as_array().unwrap().len(), 3);

        let bogus = cstr("NoSuchType");
        assert!(cascade_describe_type(bogus.as_ptr()).is_null());
        assert!(last_error_text().contains("NoSuchType"));
    }
}

#[test]
fn test_null_handles_are_rejected_not_crashed() {
    unsafe {
        cascade_graph_destroy(ptr::null_mut());

        let number = cstr("Number");
        assert_ne!(
            cascade_add_node_with_id(ptr::null_mut(), 1, number.as_ptr(), ptr::null()),
            0
        );
        assert_ne!(cascade_run(ptr::null_mut()), 0);
        assert_eq!(cascade_get_output_count(ptr::null()), -1);

        let graph = cascade_graph_create();
        assert_ne!(
            cascade_add_node_with_id(graph, 1, ptr::null(), ptr::null()),
            0
        );
        assert!(last_error_text().contains("type_name"));
        cascade_graph_destroy(graph);
    }
}
