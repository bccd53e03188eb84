use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use ripple::{
	event_to_value, filter, lift2, no_repeat, replace_unset, snapshot, value_map, value_to_event,
	value_vec, window, Event, Recompute, Source, Value,
};

#[test]
fn map_follows_source() {
	let v = Value::new(2i64);
	let doubled = v.map(|x| x * 2);
	assert_eq!(doubled.get(), Some(4));
	v.set(5).unwrap();
	assert_eq!(doubled.get(), Some(10));
	v.clear().unwrap();
	assert_eq!(doubled.get(), None);
}

#[test]
fn event_map_transforms_payloads() {
	let e: Event<i64> = Event::new();
	let doubled = e.map(|x| x * 2);
	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = seen.clone();
		doubled.on_event(move |payload| seen.borrow_mut().push(*payload));
	}
	e.emit(3).unwrap();
	e.emit(4).unwrap();
	assert_eq!(*seen.borrow(), vec![6, 8]);
}

#[test]
fn lift2_waits_for_both_inputs() {
	let a: Value<i64> = Value::unset();
	let b = Value::new(2i64);
	let sum = lift2(&a, &b, |a, b| a + b);
	assert_eq!(sum.get(), None);
	a.set(1).unwrap();
	assert_eq!(sum.get(), Some(3));
	b.set(10).unwrap();
	assert_eq!(sum.get(), Some(11));
}

#[test]
fn value_vec_tracks_members() {
	let a = Value::new("a".to_string());
	let b = Value::new("b".to_string());
	let c = Value::new("c".to_string());
	let vec = value_vec(&[a.clone(), b.clone(), c.clone()]);
	assert_eq!(
		vec.get(),
		Some(vec![
			Some("a".to_string()),
			Some("b".to_string()),
			Some("c".to_string())
		])
	);

	let notifications = Rc::new(Cell::new(0));
	{
		let notifications = notifications.clone();
		vec.on_change(move |_| notifications.set(notifications.get() + 1));
	}

	a.set("A".to_string()).unwrap();
	assert_eq!(
		vec.get(),
		Some(vec![
			Some("A".to_string()),
			Some("b".to_string()),
			Some("c".to_string())
		])
	);
	assert_eq!(notifications.get(), 1);

	b.clear().unwrap();
	assert_eq!(
		vec.get(),
		Some(vec![Some("A".to_string()), None, Some("c".to_string())])
	);
	assert_eq!(notifications.get(), 2);
}

#[test]
fn value_map_tracks_members() {
	let a = Value::new(1i64);
	let b = Value::new(2i64);
	let map = value_map(&[("a", a.clone()), ("b", b.clone())]);
	assert_eq!(
		map.get(),
		Some(HashMap::from([("a", Some(1)), ("b", Some(2))]))
	);
	b.set(20).unwrap();
	assert_eq!(
		map.get(),
		Some(HashMap::from([("a", Some(1)), ("b", Some(20))]))
	);
}

#[test]
fn value_to_event_emits_changes() {
	let v = Value::new(1i64);
	let e = value_to_event(&v);
	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = seen.clone();
		e.on_event(move |payload| seen.borrow_mut().push(*payload));
	}
	v.set(2).unwrap();
	assert_eq!(*seen.borrow(), vec![2]);
}

#[test]
fn event_to_value_latches_payloads() {
	let e: Event<i64> = Event::new();
	let v = event_to_value(&e, None);
	assert_eq!(v.get(), None);

	let notifications = Rc::new(Cell::new(0));
	{
		let notifications = notifications.clone();
		v.on_change(move |_| notifications.set(notifications.get() + 1));
	}

	e.emit(2).unwrap();
	assert_eq!(v.get(), Some(2));
	assert_eq!(notifications.get(), 1);
}

#[test]
fn snapshot_emits_only_on_source_emission() {
	let latest = Value::new(1i64);
	let trigger: Event<i64> = Event::new();
	let out = snapshot(&trigger, &latest, |payload, latest| {
		(latest.copied().unwrap_or(0), *payload)
	});
	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = seen.clone();
		out.on_event(move |pair| seen.borrow_mut().push(*pair));
	}

	trigger.emit(2).unwrap();
	assert_eq!(*seen.borrow(), vec![(1, 2)]);

	latest.set(3).unwrap();
	assert_eq!(*seen.borrow(), vec![(1, 2)]);

	trigger.emit(4).unwrap();
	assert_eq!(*seen.borrow(), vec![(1, 2), (3, 4)]);
}

#[test]
fn window_keeps_most_recent() {
	let v = Value::new(1i64);
	let size = Value::new(3usize);
	let win = window(&Source::from(v.clone()), &size);
	assert_eq!(win.get(), Some(vec![1]));

	v.set(2).unwrap();
	assert_eq!(win.get(), Some(vec![1, 2]));
	v.set(3).unwrap();
	assert_eq!(win.get(), Some(vec![1, 2, 3]));
	v.set(4).unwrap();
	assert_eq!(win.get(), Some(vec![2, 3, 4]));

	// Growing lengthens gradually.
	size.set(4).unwrap();
	v.set(5).unwrap();
	assert_eq!(win.get(), Some(vec![2, 3, 4, 5]));

	// Shrinking crops immediately.
	size.set(2).unwrap();
	assert_eq!(win.get(), Some(vec![4, 5]));
	v.set(6).unwrap();
	assert_eq!(win.get(), Some(vec![5, 6]));
}

#[test]
fn window_over_events() {
	let e: Event<i64> = Event::new();
	let size = Value::new(2usize);
	let win = window(&Source::from(e.clone()), &size);
	assert_eq!(win.get(), Some(vec![]));

	e.emit(1).unwrap();
	assert_eq!(win.get(), Some(vec![1]));
	e.emit(2).unwrap();
	assert_eq!(win.get(), Some(vec![1, 2]));
	e.emit(3).unwrap();
	assert_eq!(win.get(), Some(vec![2, 3]));
}

#[test]
fn no_repeat_value_suppresses_duplicates() {
	let v = Value::new(1i64);
	let out = match no_repeat(&Source::from(v.clone())) {
		Source::Continuous(out) => out,
		Source::Instantaneous(_) => unreachable!(),
	};
	let notifications = Rc::new(Cell::new(0));
	{
		let notifications = notifications.clone();
		out.on_change(move |_| notifications.set(notifications.get() + 1));
	}

	assert_eq!(out.get(), Some(1));
	v.set(1).unwrap();
	assert_eq!(notifications.get(), 0);
	v.set(2).unwrap();
	assert_eq!(out.get(), Some(2));
	assert_eq!(notifications.get(), 1);
	v.set(2).unwrap();
	assert_eq!(notifications.get(), 1);
}

#[test]
fn no_repeat_event_suppresses_duplicates() {
	let e: Event<i64> = Event::new();
	let out = match no_repeat(&Source::from(e.clone())) {
		Source::Instantaneous(out) => out,
		Source::Continuous(_) => unreachable!(),
	};
	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = seen.clone();
		out.on_event(move |payload| seen.borrow_mut().push(*payload));
	}

	e.emit(1).unwrap();
	e.emit(1).unwrap();
	e.emit(2).unwrap();
	e.emit(1).unwrap();
	assert_eq!(*seen.borrow(), vec![1, 2, 1]);
}

#[test]
fn filter_value_keeps_previous_datum() {
	let v = Value::new(11i64);
	let out = match filter(&Source::from(v.clone()), |&x| x < 10) {
		Source::Continuous(out) => out,
		Source::Instantaneous(_) => unreachable!(),
	};
	// Rejected initial datum leaves the output unset.
	assert_eq!(out.get(), None);

	v.set(5).unwrap();
	assert_eq!(out.get(), Some(5));
	v.set(50).unwrap();
	assert_eq!(out.get(), Some(5));
	v.set(6).unwrap();
	assert_eq!(out.get(), Some(6));
}

#[test]
fn filter_event_drops_rejected_payloads() {
	let e: Event<i64> = Event::new();
	let out = match filter(&Source::from(e.clone()), |&x| x % 2 == 0) {
		Source::Instantaneous(out) => out,
		Source::Continuous(_) => unreachable!(),
	};
	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = seen.clone();
		out.on_event(move |payload| seen.borrow_mut().push(*payload));
	}

	e.emit(1).unwrap();
	e.emit(2).unwrap();
	e.emit(3).unwrap();
	e.emit(4).unwrap();
	assert_eq!(*seen.borrow(), vec![2, 4]);
}

#[test]
fn replace_unset_substitutes_fallback() {
	let v: Value<i64> = Value::unset();
	let out = replace_unset(&v, 0);
	assert_eq!(out.get(), Some(0));
	v.set(5).unwrap();
	assert_eq!(out.get(), Some(5));
	v.clear().unwrap();
	assert_eq!(out.get(), Some(0));
}

#[test]
fn source_on_each_and_sink() {
	let v = Value::new(1i64);
	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = seen.clone();
		Source::from(v.clone()).on_each(move |datum| seen.borrow_mut().push(*datum));
	}
	assert_eq!(*seen.borrow(), vec![1]);

	let sink = Source::from(v.clone()).sink();
	sink(2).unwrap();
	assert_eq!(*seen.borrow(), vec![1, 2]);
	assert_eq!(v.get(), Some(2));

	let e: Event<i64> = Event::new();
	let heard = Rc::new(RefCell::new(Vec::new()));
	{
		let heard = heard.clone();
		Source::from(e.clone()).on_each(move |payload| heard.borrow_mut().push(*payload));
	}
	let emit = Source::from(e).sink();
	emit(3).unwrap();
	assert_eq!(*heard.borrow(), vec![3]);
}

#[test]
fn computed_macro_builds_derived_values() {
	let a = Value::new(2i64);
	let b = Value::new(3i64);
	let product = ripple::computed!((a, b) [a, b] => {
		match (a.get(), b.get()) {
			(Some(a), Some(b)) => Recompute::Set(a * b),
			_ => Recompute::NoChange,
		}
	});
	assert_eq!(product.get(), Some(6));
	a.set(5).unwrap();
	assert_eq!(product.get(), Some(15));
}
