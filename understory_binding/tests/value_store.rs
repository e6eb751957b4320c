// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_binding` crate.
//!
//! These exercise `ValueStore` through its public API, with a focus on when
//! sources are subscribed: live, inside a construction window, and after it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use understory_binding::{
    BindingError, BindingObserver, BindingPriority, Property, PropertyChange, Subject,
    Subscription, ValueSource, ValueStore, ValueStoreError,
};

const TITLE: Property<String> = Property::new(0);
const WIDTH: Property<f64> = Property::new(1);
const HEIGHT: Property<f64> = Property::new(2);

/// A cold source that pushes one value whenever it is subscribed and never
/// completes. Its subscription has nothing to release.
#[derive(Clone)]
struct TestSource {
    value: &'static str,
    subscribe_count: Rc<Cell<usize>>,
}

impl TestSource {
    fn new(value: &'static str) -> Self {
        Self {
            value,
            subscribe_count: Rc::default(),
        }
    }

    fn subscribe_count(&self) -> usize {
        self.subscribe_count.get()
    }
}

impl ValueSource<String> for TestSource {
    fn subscribe(&mut self, observer: BindingObserver<String>) -> Subscription {
        self.subscribe_count.set(self.subscribe_count.get() + 1);
        observer.next(self.value.to_owned());
        Subscription::empty()
    }
}

fn create_target() -> ValueStore<u32> {
    ValueStore::new(1)
}

#[test]
fn bindings_are_subscribed_before_begin_init() {
    let mut target = create_target();
    let source1 = TestSource::new("foo");
    let source2 = TestSource::new("bar");

    target.add_binding(TITLE, source1.clone(), BindingPriority::LocalValue);
    target.add_binding(TITLE, source2.clone(), BindingPriority::LocalValue);

    assert_eq!(source1.subscribe_count(), 1);
    assert_eq!(source2.subscribe_count(), 1);
    assert_eq!(target.value(TITLE).as_deref(), Some("bar"));
}

#[test]
fn non_active_binding_is_not_subscribed_before_begin_init() {
    let mut target = create_target();
    let source1 = TestSource::new("foo");
    let source2 = TestSource::new("bar");

    target.add_binding(TITLE, source1.clone(), BindingPriority::LocalValue);
    target.add_binding(TITLE, source2.clone(), BindingPriority::Style);

    assert_eq!(source1.subscribe_count(), 1);
    assert_eq!(source2.subscribe_count(), 0);
    assert_eq!(target.value(TITLE).as_deref(), Some("foo"));
}

#[test]
fn bindings_are_not_subscribed_after_begin_init() {
    let mut target = create_target();
    let source1 = TestSource::new("foo");
    let source2 = TestSource::new("bar");
    let source3 = TestSource::new("baz");

    target.begin_init();
    target.add_binding(TITLE, source1.clone(), BindingPriority::LocalValue);
    target.add_binding(TITLE, source2.clone(), BindingPriority::LocalValue);
    target.add_binding(TITLE, source3.clone(), BindingPriority::Style);

    assert_eq!(source1.subscribe_count(), 0);
    assert_eq!(source2.subscribe_count(), 0);
    assert_eq!(source3.subscribe_count(), 0);
    assert_eq!(target.subscription_count(), 0);
}

#[test]
fn active_binding_is_subscribed_after_end_init() {
    let mut target = create_target();
    let source1 = TestSource::new("foo");
    let source2 = TestSource::new("bar");
    let source3 = TestSource::new("baz");

    target.begin_init();
    target.add_binding(TITLE, source1.clone(), BindingPriority::LocalValue);
    target.add_binding(TITLE, source2.clone(), BindingPriority::LocalValue);
    target.add_binding(TITLE, source3.clone(), BindingPriority::Style);
    target.end_init().unwrap();

    assert_eq!(source1.subscribe_count(), 0);
    assert_eq!(source2.subscribe_count(), 1);
    assert_eq!(source3.subscribe_count(), 0);
    assert_eq!(target.value(TITLE).as_deref(), Some("bar"));
}

#[test]
fn completed_binding_freezes_its_value() {
    let mut target = create_target();
    let source = Subject::new();

    target.add_binding(WIDTH, source.clone(), BindingPriority::LocalValue);
    source.next(42.0);
    source.complete();

    assert_eq!(target.value(WIDTH), Some(42.0));
    assert_eq!(source.subscribe_count(), 1);
    assert!(!target.is_active(WIDTH, BindingPriority::LocalValue));

    // Nothing resubscribes it, including a later construction window.
    target.begin_init();
    target.end_init().unwrap();
    source.next(1.0);
    assert_eq!(source.subscribe_count(), 1);
    assert_eq!(target.value(WIDTH), Some(42.0));
}

#[test]
fn construction_windows_nest() {
    let mut target = create_target();
    let source = TestSource::new("foo");

    target.begin_init();
    target.begin_init();
    target.add_binding(TITLE, source.clone(), BindingPriority::Template);
    target.end_init().unwrap();
    assert!(target.is_initializing());
    assert_eq!(source.subscribe_count(), 0);

    target.end_init().unwrap();
    assert!(!target.is_initializing());
    assert_eq!(source.subscribe_count(), 1);
}

#[test]
fn unmatched_end_init_leaves_the_store_unchanged() {
    let mut target = create_target();
    let source = TestSource::new("foo");
    target.add_binding(TITLE, source.clone(), BindingPriority::LocalValue);

    assert_eq!(target.end_init(), Err(ValueStoreError::UnmatchedEndInit));
    assert!(!target.is_initializing());
    assert_eq!(source.subscribe_count(), 1);
    assert_eq!(target.value(TITLE).as_deref(), Some("foo"));

    // A later window still behaves normally.
    target.begin_init();
    assert!(target.is_initializing());
    assert_eq!(target.end_init(), Ok(()));
}

#[test]
fn only_one_binding_per_property_is_active_after_end_init() {
    let mut target = create_target();
    let style = Subject::<f64>::new();
    let template = Subject::<f64>::new();
    let animation = Subject::<f64>::new();
    let height = Subject::<f64>::new();

    target.begin_init();
    target.add_binding(WIDTH, style.clone(), BindingPriority::Style);
    target.add_binding(WIDTH, animation.clone(), BindingPriority::Animation);
    target.add_binding(WIDTH, template.clone(), BindingPriority::Template);
    target.add_binding(HEIGHT, height.clone(), BindingPriority::StyleTrigger);
    target.end_init().unwrap();

    assert_eq!(animation.observer_count(), 1);
    assert_eq!(style.subscribe_count(), 0);
    assert_eq!(template.subscribe_count(), 0);
    assert_eq!(height.observer_count(), 1);
    assert_eq!(target.subscription_count(), 2);
    assert_eq!(target.effective_priority(WIDTH), Some(BindingPriority::Animation));
    assert_eq!(target.binding_count(WIDTH), 3);
}

#[test]
fn uncovered_binding_resubscribes() {
    let mut target = create_target();
    let style = TestSource::new("styled");
    target.add_binding(TITLE, style.clone(), BindingPriority::Style);

    let local = target.set_value(TITLE, String::from("local"), BindingPriority::LocalValue);
    assert_eq!(target.value(TITLE).as_deref(), Some("local"));
    assert!(!target.is_active(TITLE, BindingPriority::Style));

    assert!(target.remove_binding(local));
    assert_eq!(style.subscribe_count(), 2);
    assert!(target.is_active(TITLE, BindingPriority::Style));
    assert_eq!(target.value(TITLE).as_deref(), Some("styled"));
}

#[test]
fn removal_during_init_waits_for_end_init() {
    let mut target = create_target();
    let style = TestSource::new("styled");
    let local = TestSource::new("local");

    target.begin_init();
    target.add_binding(TITLE, style.clone(), BindingPriority::Style);
    let handle = target.add_binding(TITLE, local.clone(), BindingPriority::LocalValue);
    assert!(target.remove_binding(handle));
    assert_eq!(style.subscribe_count(), 0);
    target.end_init().unwrap();

    assert_eq!(local.subscribe_count(), 0);
    assert_eq!(style.subscribe_count(), 1);
}

#[test]
fn late_pushes_from_a_replaced_source_are_ignored() {
    let held: Rc<RefCell<Option<BindingObserver<f64>>>> = Rc::default();
    let keep = Rc::clone(&held);
    let mut target = create_target();

    target.add_binding(
        WIDTH,
        move |observer: BindingObserver<f64>| {
            *keep.borrow_mut() = Some(observer);
            // Ignores cancellation on purpose.
            Subscription::empty()
        },
        BindingPriority::LocalValue,
    );
    target.set_value(WIDTH, 5.0, BindingPriority::LocalValue);

    let stale = held.borrow_mut().take().unwrap();
    assert!(!stale.is_live());
    stale.next(99.0);
    assert_eq!(target.value(WIDTH), Some(5.0));
}

#[test]
fn change_handler_sees_values_and_errors() {
    let log: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&log);
    let source = Subject::<f64>::new();
    let mut target = ValueStore::new(9_u32);

    target.set_change_handler(move |change: &PropertyChange<'_, u32>| {
        assert_eq!(change.owner, 9);
        let entry = match (change.change.value::<f64>(), change.change.error()) {
            (Some(value), _) => format!("{}@{}={value}", change.property, change.priority),
            (None, Some(error)) => {
                format!("{}@{}!{}", change.property, change.priority, error.message())
            }
            (None, None) => String::from("?"),
        };
        sink.borrow_mut().push(entry);
    });

    target.add_binding(WIDTH, source.clone(), BindingPriority::Style);
    source.next(1.5);
    source.error(BindingError::new("disconnected"));

    assert_eq!(
        *log.borrow(),
        [
            format!("{}@{}=1.5", WIDTH.id(), BindingPriority::Style),
            format!("{}@{}!disconnected", WIDTH.id(), BindingPriority::Style),
        ]
    );
    // The failed binding keeps its last value and stays installed.
    assert_eq!(target.value(WIDTH), Some(1.5));
    assert!(target.has_binding(WIDTH, BindingPriority::Style));
}

#[test]
fn handler_may_push_into_other_bindings() {
    let mut target = create_target();
    let width = Subject::<f64>::new();
    let height = Subject::<f64>::new();
    let mirror = height.clone();

    target.set_change_handler(move |change| {
        if change.property == WIDTH.id() {
            if let Some(value) = change.change.value::<f64>() {
                mirror.next(value * 2.0);
            }
        }
    });
    target.add_binding(WIDTH, width.clone(), BindingPriority::LocalValue);
    target.add_binding(HEIGHT, height.clone(), BindingPriority::LocalValue);

    width.next(4.0);
    assert_eq!(target.value(WIDTH), Some(4.0));
    assert_eq!(target.value(HEIGHT), Some(8.0));
}

#[test]
fn teardown_releases_every_subscription() {
    let title = Subject::<String>::new();
    let width = Subject::<f64>::new();
    let dormant = Subject::<f64>::new();
    let mut target = create_target();

    target.add_binding(TITLE, title.clone(), BindingPriority::LocalValue);
    target.add_binding(WIDTH, width.clone(), BindingPriority::Animation);
    target.add_binding(WIDTH, dormant.clone(), BindingPriority::Style);
    assert_eq!(title.observer_count() + width.observer_count(), 2);

    target.dispose();
    assert_eq!(title.observer_count(), 0);
    assert_eq!(width.observer_count(), 0);
    assert!(target.is_empty());

    // Idempotent, and dropping afterwards is fine.
    target.dispose();
    drop(target);
    assert_eq!(dormant.subscribe_count(), 0);
}

#[test]
fn init_scope_defers_like_begin_and_end() {
    let mut target = create_target();
    let source1 = TestSource::new("foo");
    let source2 = TestSource::new("bar");

    {
        let mut init = target.init_scope();
        init.add_binding(TITLE, source1.clone(), BindingPriority::LocalValue);
        init.add_binding(TITLE, source2.clone(), BindingPriority::LocalValue);
    }

    assert_eq!(source1.subscribe_count(), 0);
    assert_eq!(source2.subscribe_count(), 1);
}

#[test]
fn priorities_from_raw_ranks() {
    assert_eq!(BindingPriority::try_from(0_u8), Ok(BindingPriority::Animation));
    assert_eq!(BindingPriority::try_from(4_u8), Ok(BindingPriority::Style));
    assert_eq!(
        BindingPriority::try_from(5_u8),
        Err(ValueStoreError::InvalidPriority(5))
    );
    assert!(BindingPriority::LocalValue.outranks(BindingPriority::Style));
}
