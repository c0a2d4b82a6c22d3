//! Integration Tests for the Observation Engine
//!
//! These tests verify that observed objects and computations work together:
//! dependency accuracy, pruning, disposal, deep observation and nesting.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reflex_core::reactive::{
    ComputedOptions, ObserveOptions, ReactiveContext, Value, LENGTH, OBSERVED_SENTINEL,
};
use reflex_core::ReactiveError;
use serde_json::json;
use tracing::Level;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::TRACE)
        .try_init();
}

fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
    let c = Rc::new(Cell::new(0));
    (c.clone(), c)
}

fn int(value: Option<Value>) -> i64 {
    value.and_then(|v| v.as_i64()).unwrap_or_default()
}

/// Writing a different value re-runs the reader exactly once; writing the
/// same scalar does nothing.
#[test]
fn write_reruns_reader_once() {
    init_tracing();
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"count": 0})).unwrap();
    let seen = Rc::new(Cell::new(-1));

    let (s, out) = (state.clone(), seen.clone());
    let c = cx.computed(move |_| out.set(int(s.get("count"))));

    state.set("count", 5).unwrap();
    assert_eq!(seen.get(), 5);
    assert_eq!(c.run_count(), 2);

    state.set("count", 5).unwrap();
    assert_eq!(c.run_count(), 2);
}

/// An integer and its float form are the same number, so rewriting one with
/// the other is not a change.
#[test]
fn numerically_equal_write_is_not_a_change() {
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"x": 1})).unwrap();

    let s = state.clone();
    let c = cx.computed(move |_| {
        s.get("x");
    });

    state.set("x", 1.0).unwrap();
    assert_eq!(c.run_count(), 1);

    state.set("x", 1.5).unwrap();
    assert_eq!(c.run_count(), 2);
}

/// Out-of-range sequence writes fail without touching the sequence or
/// re-running its readers.
#[test]
fn out_of_range_sequence_write_is_rejected() {
    let cx = ReactiveContext::new();
    let list = cx.observe(json!([])).unwrap();

    let l = list.clone();
    let c = cx.computed(move |_| int(l.get(LENGTH)));

    assert!(matches!(
        list.set("18446744073709551615", 1),
        Err(ReactiveError::InvalidIndex(_))
    ));
    assert!(matches!(
        list.set(LENGTH, u64::MAX),
        Err(ReactiveError::InvalidLength(_))
    ));
    assert!(list.is_empty());
    assert_eq!(c.run_count(), 1);
}

/// Writing a sequence's length propagates even when it is unchanged.
#[test]
fn sequence_length_always_propagates() {
    init_tracing();
    let cx = ReactiveContext::new();
    let list = cx.observe(json!([1, 2, 3])).unwrap();

    let l = list.clone();
    let c = cx.computed(move |_| int(l.get(LENGTH)));

    list.set(LENGTH, 3).unwrap();
    assert_eq!(c.run_count(), 2);

    list.push(4).unwrap();
    assert_eq!(c.run_count(), 3);
    assert_eq!(c.run(), 4);
}

/// A dependency dropped by a later run no longer triggers the computation
/// and is pruned from the forward set by the next write.
#[test]
fn stale_dependency_is_pruned() {
    init_tracing();
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"show": true, "detail": "a"})).unwrap();

    let s = state.clone();
    let c = cx.computed(move |_| {
        if s.get("show").and_then(|v| v.as_bool()).unwrap_or(false) {
            s.get("detail");
        }
    });
    assert_eq!(cx.dependent_count(&state, "detail"), 1);

    state.set("show", false).unwrap();
    assert_eq!(c.run_count(), 2);
    // Forward edge lingers until walked.
    assert_eq!(cx.dependent_count(&state, "detail"), 1);

    state.set("detail", "b").unwrap();
    assert_eq!(c.run_count(), 2);
    assert_eq!(cx.dependent_count(&state, "detail"), 0);
}

/// Disposed computations never run again and lose their read-set.
#[test]
fn disposal_is_final() {
    init_tracing();
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"a": 1, "b": 2})).unwrap();

    let s = state.clone();
    let c = cx.computed(move |_| int(s.get("a")) + int(s.get("b")));
    assert_eq!(cx.read_set_len(c.id()), 2);

    cx.dispose(&c);
    assert!(!cx.has_read_set(c.id()));

    state.set("a", 10).unwrap();
    state.set("b", 20).unwrap();
    assert_eq!(c.run_count(), 1);
    assert_eq!(cx.dependent_count(&state, "a"), 0);
    assert_eq!(cx.dependent_count(&state, "b"), 0);
}

/// Replacing a nested object keeps tracking reads through the new one.
#[test]
fn deep_observation_follows_replaced_objects() {
    init_tracing();
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"a": {"b": 1}})).unwrap();
    let seen = Rc::new(Cell::new(0));

    let (s, out) = (state.clone(), seen.clone());
    let c = cx.computed(move |_| {
        let b = s.get_object("a").map(|a| int(a.get("b"))).unwrap_or_default();
        out.set(b);
    });

    state.set("a", json!({"b": 2})).unwrap();
    assert_eq!(seen.get(), 2);
    assert_eq!(c.run_count(), 2);

    let nested = state.get_untracked("a").and_then(Value::into_observed).unwrap();
    assert_eq!(nested.get(OBSERVED_SENTINEL), Some(Value::from(true)));
    nested.set("b", 3).unwrap();
    assert_eq!(seen.get(), 3);
    assert_eq!(c.run_count(), 3);
}

/// A computation writing its own dependency does not re-trigger itself.
#[test]
fn self_write_does_not_retrigger() {
    init_tracing();
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"count": 0})).unwrap();

    let s = state.clone();
    let c = cx.computed(move |_| {
        let n = int(s.get("count"));
        s.set("count", n + 1).unwrap();
    });

    assert_eq!(c.run_count(), 1);
    assert_eq!(int(state.get("count")), 1);

    // An outside write still triggers it.
    state.set("count", 10).unwrap();
    assert_eq!(c.run_count(), 2);
    assert_eq!(int(state.get("count")), 11);
}

/// Observing an observed object hands back the same object.
#[test]
fn observe_is_idempotent() {
    let cx = ReactiveContext::new();
    let once = cx.observe(json!({"x": 1})).unwrap();
    let twice = cx.observe(once.clone()).unwrap();
    let thrice = cx.observe_with(twice.clone(), ObserveOptions::new().shallow()).unwrap();

    assert!(once.ptr_eq(&twice));
    assert!(once.ptr_eq(&thrice));
}

/// Dependents of a write run in the order they first read the property.
#[test]
fn dependents_run_in_first_read_order() {
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"x": 0})).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let (s, log) = (state.clone(), log.clone());
        cx.computed(move |_| {
            s.get("x");
            log.borrow_mut().push(name);
        });
    }
    log.borrow_mut().clear();

    state.set("x", 1).unwrap();
    assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
}

/// A write visits the dependents present when it started. A computation that
/// first reads the property during that propagation waits for the next write.
#[test]
fn late_readers_wait_for_the_next_write() {
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"x": 0})).unwrap();

    let s = state.clone();
    let late = cx.computed_lazy(move |_| {
        s.get("x");
    });

    let (s, nested) = (state.clone(), late.clone());
    let driver = cx.computed(move |_| {
        if int(s.get("x")) > 0 {
            nested.run();
        }
    });
    assert_eq!(late.run_count(), 0);

    state.set("x", 1).unwrap();
    assert_eq!(driver.run_count(), 2);
    assert_eq!(late.run_count(), 1);
    assert_eq!(cx.dependent_count(&state, "x"), 2);

    state.set("x", 2).unwrap();
    assert_eq!(driver.run_count(), 3);
    // Once from the driver, once from the write itself.
    assert_eq!(late.run_count(), 3);
}

/// Propagation settles depth-first before the outer write returns.
#[test]
fn propagation_is_depth_first() {
    let cx = ReactiveContext::new();
    let source = cx.observe(json!({"a": 1})).unwrap();
    let derived = cx.observe(json!({"b": 0})).unwrap();
    let (runs, r) = counter();

    let (s, d) = (source.clone(), derived.clone());
    cx.computed(move |_| {
        d.set("b", int(s.get("a")) * 10).unwrap();
    });

    let d = derived.clone();
    cx.computed(move |_| {
        d.get("b");
        r.set(r.get() + 1);
    });
    assert_eq!(runs.get(), 1);

    source.set("a", 2).unwrap();
    assert_eq!(int(derived.get("b")), 20);
    assert_eq!(runs.get(), 2);
}

/// Reads made by a nested computation are credited to it alone.
#[test]
fn nested_reads_credit_innermost_only() {
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"outer": 0, "inner": 0})).unwrap();

    let s = state.clone();
    let inner = cx.computed_lazy(move |_| {
        s.get("inner");
    });

    let (s, nested) = (state.clone(), inner.clone());
    let outer = cx.computed(move |_| {
        s.get("outer");
        nested.run();
    });

    assert_eq!(cx.read_set_len(outer.id()), 1);
    assert_eq!(cx.read_set_len(inner.id()), 1);

    state.set("inner", 1).unwrap();
    assert_eq!(outer.run_count(), 1);
    assert_eq!(inner.run_count(), 2);

    state.set("outer", 1).unwrap();
    assert_eq!(outer.run_count(), 2);
    assert_eq!(inner.run_count(), 3);
}

/// Reads attributed to another computation re-run that computation.
#[test]
fn attribution_reruns_attributed_computation() {
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"x": 0})).unwrap();
    let (callback_runs, r) = counter();

    let callback = cx.computed_lazy(move |_| r.set(r.get() + 1));

    let s = state.clone();
    let reader = cx.computed_with(
        ComputedOptions::new().attributed_to(callback.id()),
        move |_| {
            s.get("x");
        },
    );
    assert_eq!(cx.read_set_len(callback.id()), 1);
    assert_eq!(cx.read_set_len(reader.id()), 0);

    state.set("x", 1).unwrap();
    assert_eq!(callback_runs.get(), 1);
    assert_eq!(reader.run_count(), 1);
}

/// Computations created without keeping the handle stay alive.
#[test]
fn forgotten_handles_keep_running() {
    let cx = ReactiveContext::new();
    let state = cx.observe(json!({"x": 0})).unwrap();
    let (runs, r) = counter();

    let s = state.clone();
    drop(cx.computed(move |_| {
        s.get("x");
        r.set(r.get() + 1);
    }));

    state.set("x", 1).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(cx.computation_count(), 1);
}

/// Pagination over a shallowly observed state, the way a list view drives it.
#[test]
fn paginated_list_scenario() {
    init_tracing();
    const PAGE_SIZE: usize = 10;

    let news: Vec<_> = (0..25).map(|i| json!({"title": format!("story {i}")})).collect();
    let cx = ReactiveContext::new();
    let state = cx
        .observe_with(
            json!({"currentPage": 0, "pageData": news, "searchTerm": ""}),
            ObserveOptions::new().shallow(),
        )
        .unwrap();

    let rendered = Rc::new(RefCell::new(Vec::<String>::new()));
    let (s, out) = (state.clone(), rendered.clone());
    let list = cx.computed(move |_| {
        let page = s.get("currentPage").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
        let data = s.get("pageData").map(|v| v.to_json()).unwrap_or_default();
        let items = data.as_array().cloned().unwrap_or_default();
        *out.borrow_mut() = items
            .iter()
            .skip(page * PAGE_SIZE)
            .take(PAGE_SIZE)
            .filter_map(|item| item["title"].as_str().map(str::to_owned))
            .collect();
    });

    let title = Rc::new(RefCell::new(String::new()));
    let (s, out) = (state.clone(), title.clone());
    let heading = cx.computed(move |_| {
        let term = s.get("searchTerm").and_then(|v| v.as_str().map(str::to_owned)).unwrap_or_default();
        *out.borrow_mut() = if term.is_empty() {
            String::new()
        } else {
            format!("Search results for {term}:")
        };
    });

    assert_eq!(rendered.borrow().len(), 10);
    assert_eq!(rendered.borrow()[0], "story 0");

    // Jump to the last page.
    let page = int(state.get("currentPage"));
    state.set("currentPage", page + 2).unwrap();
    assert_eq!(*rendered.borrow(), vec!["story 20", "story 21", "story 22", "story 23", "story 24"]);

    // Search replaces the data source and resets paging.
    state.set("searchTerm", "rust").unwrap();
    state.set("pageData", json!([{"title": "rust 1"}])).unwrap();
    state.set("currentPage", 0).unwrap();
    assert_eq!(*rendered.borrow(), vec!["rust 1"]);
    assert_eq!(*title.borrow(), "Search results for rust:");
    assert_eq!(heading.run_count(), 2);
    assert_eq!(list.run_count(), 4);
}
