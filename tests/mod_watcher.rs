use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use bson::doc;
use nexus_entities::errors::EntityError;
use nexus_entities::watcher::{self, EventType, WatchOptions, Watcher, WatcherRegistry, WatcherState};
use nexus_entities::Entity;

struct Book;
impl Entity for Book {}

struct Author;
impl Entity for Author {}

struct Review;
impl Entity for Review {}

struct Genre;
impl Entity for Genre {}

#[test]
fn get_normalizes_and_reuses_instances() {
    let a = watcher::get::<Book>("Foo").unwrap();
    let b = watcher::get::<Book>("  foo ").unwrap();
    let c = watcher::get::<Book>("FOO").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(a.name(), "foo");
    assert_eq!(a.collection_name(), "Book");
}

#[test]
fn concurrent_first_access_constructs_once() {
    const THREADS: usize = 16;
    let built = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let built = built.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let name = if i % 2 == 0 { "Foo" } else { " foo " };
                barrier.wait();
                watcher::get_or_try_insert_with::<Author, _>(name, |n| {
                    built.fetch_add(1, Ordering::SeqCst);
                    Watcher::new(n)
                })
                .unwrap()
            })
        })
        .collect();
    let watchers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(watchers.iter().all(|w| Arc::ptr_eq(w, &watchers[0])));
    assert_eq!(watcher::list::<Author>().len(), 1);
}

#[test]
fn failed_construction_registers_nothing() {
    let reg = WatcherRegistry::new();
    let err = reg
        .get_or_try_insert_with::<Review, _>("broken", |_| {
            Err(EntityError::WatcherConstruction("transport unavailable".into()))
        })
        .unwrap_err();
    assert!(matches!(err, EntityError::WatcherConstruction(_)));
    assert!(reg.is_empty());

    // a later successful call creates the entry
    let w = reg.get::<Review>("broken").unwrap();
    assert_eq!(w.name(), "broken");
    assert_eq!(reg.list::<Review>().len(), 1);
}

#[test]
fn blank_names_are_rejected() {
    let reg = WatcherRegistry::new();
    assert!(matches!(reg.get::<Review>("   "), Err(EntityError::InvalidWatcherName(_))));
    assert!(reg.is_empty());
}

#[test]
fn list_is_scoped_to_entity_type() {
    let reg = WatcherRegistry::new();
    reg.get::<Genre>("one").unwrap();
    reg.get::<Genre>("two").unwrap();
    reg.get::<Book>("one").unwrap();
    let mut names: Vec<String> = reg.list::<Genre>().iter().map(|w| w.name().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["one", "two"]);
    assert_eq!(reg.list::<Book>().len(), 1);
    assert_eq!(reg.len(), 3);
}

#[test]
fn start_builds_pipeline_and_delivers_batches() {
    let w = Watcher::<Book>::new("pipeline").unwrap();
    assert_eq!(w.state(), WatcherState::NotStarted);
    assert!(w.pipeline().is_empty());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    w.on_changes(move |batch| sink.lock().unwrap().extend(batch.iter().cloned()));

    // not running yet
    assert!(!w.deliver(&[doc! { "_id": { "t": 1 } }]));

    w.start(EventType::CREATED | EventType::DELETED, WatchOptions::default()).unwrap();
    assert_eq!(w.state(), WatcherState::Running);
    assert_eq!(
        w.pipeline(),
        vec![doc! { "$match": { "operationType": { "$in": ["insert", "delete"] } } }]
    );

    assert!(!w.deliver(&[]));
    assert!(w.deliver(&[doc! { "_id": { "t": 2 }, "operationType": "insert" }, doc! { "_id": { "t": 3 } }]));
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(w.resume_token(), Some(doc! { "t": 3 }));
}

#[test]
fn start_validates_options_and_state() {
    let w = Watcher::<Book>::new("validate").unwrap();
    assert!(matches!(
        w.start(EventType::empty(), WatchOptions::default()),
        Err(EntityError::InvalidWatchOptions(_))
    ));
    let zero = WatchOptions { batch_size: 0, ..WatchOptions::default() };
    assert!(matches!(w.start(EventType::all(), zero), Err(EntityError::InvalidWatchOptions(_))));

    w.start(EventType::UPDATED, WatchOptions::default()).unwrap();
    assert!(matches!(
        w.start(EventType::UPDATED, WatchOptions::default()),
        Err(EntityError::WatcherState(_))
    ));
}

#[test]
fn only_ids_adds_projection_and_filter_is_anded() {
    let w = Watcher::<Book>::new("ids").unwrap();
    let opts = WatchOptions { only_ids: true, ..WatchOptions::default() };
    w.start_with_filter(EventType::UPDATED, opts, Some(doc! { "fullDocument.Price": { "$gt": 5 } }))
        .unwrap();
    let p = w.pipeline();
    assert_eq!(p.len(), 2);
    assert_eq!(
        p[0],
        doc! { "$match": { "$and": [
            { "operationType": { "$in": ["update", "replace"] } },
            { "fullDocument.Price": { "$gt": 5 } }
        ] } }
    );
    assert_eq!(w.filter(), Some(doc! { "fullDocument.Price": { "$gt": 5 } }));
    assert_eq!(w.options(), Some(opts));
}

#[test]
fn errors_stop_unless_auto_resume() {
    let stops = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let w = Watcher::<Book>::new("errors").unwrap();
    let s = stops.clone();
    w.on_stop(move || {
        s.fetch_add(1, Ordering::SeqCst);
    });
    let e = errors.clone();
    w.on_error(move |_| {
        e.fetch_add(1, Ordering::SeqCst);
    });

    w.start(EventType::all(), WatchOptions::default()).unwrap();
    w.fail("cursor killed");
    assert_eq!(w.state(), WatcherState::Running);
    assert_eq!(errors.load(Ordering::SeqCst), 1);

    w.stop();
    let manual = WatchOptions { auto_resume: false, ..WatchOptions::default() };
    w.start(EventType::all(), manual).unwrap();
    w.fail("network down");
    assert_eq!(w.state(), WatcherState::Stopped);
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    assert_eq!(stops.load(Ordering::SeqCst), 2);

    // stopping twice fires on_stop once
    assert!(!w.stop());
    assert_eq!(stops.load(Ordering::SeqCst), 2);
}

#[test]
fn restart_requires_resume_token() {
    let w = Watcher::<Book>::new("restart").unwrap();
    w.start(EventType::CREATED, WatchOptions::default()).unwrap();
    w.stop();
    assert!(!w.can_restart());
    assert!(matches!(w.restart(), Err(EntityError::WatcherState(_))));

    w.set_resume_token(doc! { "_data": "8263" });
    assert!(w.can_restart());
    w.restart().unwrap();
    assert_eq!(w.state(), WatcherState::Running);
    assert_eq!(w.event_types(), Some(EventType::CREATED));
    assert_eq!(w.resume_token(), Some(doc! { "_data": "8263" }));
}

#[test]
fn callbacks_may_register_callbacks() {
    let w = Arc::new(Watcher::<Book>::new("reentrant").unwrap());
    let late = Arc::new(AtomicUsize::new(0));

    let (inner_w, inner_late) = (w.clone(), late.clone());
    w.on_changes(move |_| {
        let l = inner_late.clone();
        inner_w.on_changes(move |_| {
            l.fetch_add(1, Ordering::SeqCst);
        });
    });
    let (stop_w, stop_late) = (w.clone(), late.clone());
    w.on_stop(move || {
        let l = stop_late.clone();
        stop_w.on_stop(move || {
            l.fetch_add(100, Ordering::SeqCst);
        });
    });
    let err_w = w.clone();
    w.on_error(move |_| err_w.on_error(|_| {}));

    w.start(EventType::all(), WatchOptions::default()).unwrap();
    // callbacks added during a batch run from the next batch on
    assert!(w.deliver(&[doc! { "_id": { "t": 1 } }]));
    assert_eq!(late.load(Ordering::SeqCst), 0);
    assert!(w.deliver(&[doc! { "_id": { "t": 2 } }]));
    assert_eq!(late.load(Ordering::SeqCst), 1);

    w.fail("transient");
    assert!(w.stop());
    assert_eq!(late.load(Ordering::SeqCst), 1);
    w.start(EventType::all(), WatchOptions::default()).unwrap();
    assert!(w.stop());
    assert_eq!(late.load(Ordering::SeqCst), 101);
}

#[test]
fn global_registry_is_shared_with_free_functions() {
    struct Shelf;
    impl Entity for Shelf {}

    let a = watcher::get::<Shelf>("Main").unwrap();
    let b = watcher::registry().get::<Shelf>("main").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(watcher::registry().list::<Shelf>().len(), 1);
    assert!(!watcher::registry().is_empty());
}
