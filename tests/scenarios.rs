//! End-to-end behavior of chained properties and dispatch.

use prop_kit::dispatch::{DeclaredType, DispatchClassBuilder};
use prop_kit::hooks::io::IoProtocols;
use prop_kit::{
    ArgSelector, ChainedProps, ConfigStore, Error, OptMethod, Param, PropsClass,
    PropsClassBuilder, TypeInfo, TypeTag, Value,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn counted_test_class(calls: &Arc<AtomicUsize>) -> Arc<PropsClass> {
    let seen = calls.clone();
    PropsClassBuilder::new("Chained")
        .property(
            "test",
            vec![Param::required("hej"), Param::optional("med", "dig")],
            move |_, args| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(format!("{}{}", args.str("hej")?, args.str("med")?)))
            },
        )
        .build()
        .expect("Failed to build class")
}

#[test]
fn cache_hit_then_option_change() {
    init_logging();
    let calls = Arc::new(AtomicUsize::new(0));
    let opts = ConfigStore::from_pairs([("hej", "foo"), ("med", "bar")]);
    let chained = ChainedProps::new(&counted_test_class(&calls), &opts);

    assert_eq!(chained.get("test").unwrap(), Value::from("foobar"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(chained.get("test").unwrap(), Value::from("foobar"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    opts.set("med", "far");
    assert_eq!(chained.get("test").unwrap(), Value::from("foofar"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn instances_share_an_option_store() {
    let calls = Arc::new(AtomicUsize::new(0));
    let class = counted_test_class(&calls);
    let opts = ConfigStore::from_pairs([("hej", "foo")]);
    let first = ChainedProps::new(&class, &opts);
    let second = ChainedProps::new(&class, &opts);

    first.get("test").unwrap();
    second.get("test").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    opts.set("hej", "boo");
    assert!(!first.is_cached("test"));
    assert!(!second.is_cached("test"));

    // a deep copy is independent
    let copied = opts.deep_copy();
    let third = ChainedProps::new(&class, &copied);
    assert_eq!(third.get("test").unwrap(), Value::from("boodig"));
    opts.set("hej", "zoo");
    assert!(third.is_cached("test"));
}

#[test]
fn dispatch_specificity_and_default() {
    init_logging();
    let dummy = DeclaredType::of(TypeTag::object("Dummy"));
    let class = DispatchClassBuilder::new("Scenario")
        .method("myfunc", [dummy.clone(), dummy], |_, _| Ok(Value::from("default")))
        .method(
            "myfunc",
            [DeclaredType::of(TypeTag::Int), DeclaredType::of(TypeTag::Str)],
            |_, _| Ok(Value::tuple(["int", "str"])),
        )
        .method(
            "myfunc",
            [DeclaredType::Any, DeclaredType::of(TypeTag::Str)],
            |_, _| Ok(Value::tuple(["empty", "str"])),
        )
        .build()
        .expect("Failed to build");
    let instance = class.instantiate();
    let dummy2 = Value::object(&Arc::new(TypeInfo::new("Dummy2")));

    assert_eq!(
        instance.call("myfunc", &[Value::Int(1), Value::from("hi")]).unwrap(),
        Value::tuple(["int", "str"])
    );
    assert_eq!(
        instance.call("myfunc", &[dummy2.clone(), Value::from("hi")]).unwrap(),
        Value::tuple(["empty", "str"])
    );
    assert_eq!(
        instance.call("myfunc", &[dummy2.clone(), dummy2]).unwrap(),
        Value::from("default")
    );
}

#[test]
fn dispatch_reaches_ancestors_only() {
    let base = DispatchClassBuilder::new("Base")
        .method("f", [DeclaredType::of(TypeTag::Float)], |_, _| Ok(Value::from("float")))
        .build()
        .expect("Failed to build");
    let unrelated = DispatchClassBuilder::new("Unrelated")
        .method("f", [DeclaredType::of(TypeTag::List)], |_, _| Ok(Value::from("list")))
        .build()
        .expect("Failed to build");
    let sub = DispatchClassBuilder::new("Sub")
        .extends(&base)
        .method("f", [DeclaredType::of(TypeTag::Int)], |_, _| Ok(Value::from("int")))
        .build()
        .expect("Failed to build");

    let instance = sub.instantiate();
    assert_eq!(instance.call("f", &[Value::Float(1.0)]).unwrap(), Value::from("float"));
    assert_eq!(
        instance.call("f", &[Value::List(vec![])]).unwrap(),
        Value::from("int")
    );
    assert_eq!(
        unrelated.instantiate().call("f", &[Value::List(vec![])]).unwrap(),
        Value::from("list")
    );
}

#[test]
fn forwarded_method_reads_current_options() {
    let class = PropsClassBuilder::new("Greeter")
        .method(OptMethod::new(
            "greet",
            ArgSelector::named(["name"]),
            vec![Param::optional("greeting", "hello"), Param::required("name")],
            |_, args| {
                Ok(Value::from(format!(
                    "{} {}",
                    args.str("greeting")?,
                    args.str("name")?
                )))
            },
        ))
        .build()
        .expect("Failed to build");
    let opts = ConfigStore::new();
    let greeter = ChainedProps::new(&class, &opts);

    assert_eq!(
        greeter.call("greet", &[Value::from("ann")]).unwrap(),
        Value::from("hello ann")
    );
    opts.set("greeting", "hej");
    assert_eq!(
        greeter.call("greet", &[Value::from("ann")]).unwrap(),
        Value::from("hej ann")
    );
    assert!(matches!(
        greeter.call("nope", &[]),
        Err(Error::NoSuchMember { .. })
    ));
}

#[test]
fn options_from_json() {
    let opts = ConfigStore::from_json(r#"{"hej": "foo", "med": "bar"}"#).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let chained = ChainedProps::new(&counted_test_class(&calls), &opts);
    assert_eq!(chained.get("test").unwrap(), Value::from("foobar"));

    assert!(matches!(
        ConfigStore::from_json("[1, 2]"),
        Err(Error::ConfigError(_))
    ));
}

#[test]
fn io_protocols_accept_structural_streams() {
    let io = IoProtocols::new();
    let buffer = Arc::new(TypeInfo::new("Buffer").with_methods(["read", "write", "close"]));

    assert!(io.io_stream.is_instance(&Value::object(&buffer)));
    assert!(!io.seekable_io_stream.is_instance(&Value::object(&buffer)));
}

const TAGS: [TypeTag; 6] = [
    TypeTag::Bool,
    TypeTag::Int,
    TypeTag::Float,
    TypeTag::Str,
    TypeTag::List,
    TypeTag::Map,
];

/// Five-property chain: c0 reads option `k0`, each ci reads c(i-1) and `ki`.
fn chain_class(calls: &Arc<Vec<AtomicUsize>>) -> Arc<PropsClass> {
    let mut builder = PropsClassBuilder::new("Chain");
    for i in 0..calls.len() {
        let calls = calls.clone();
        builder = builder.property(
            format!("c{}", i),
            vec![Param::required(format!("k{}", i))],
            move |this, args| {
                calls[i].fetch_add(1, Ordering::SeqCst);
                let own = args.int(&format!("k{}", i))?;
                let upstream = match i {
                    0 => 0,
                    _ => this.get(&format!("c{}", i - 1))?.as_int().unwrap_or(0),
                };
                Ok(Value::Int(own + upstream))
            },
        );
    }
    builder.build().expect("Failed to build chain")
}

fn chain(len: usize) -> (Arc<Vec<AtomicUsize>>, ConfigStore, ChainedProps) {
    let calls = Arc::new((0..len).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>());
    let opts = ConfigStore::from_pairs((0..len).map(|i| (format!("k{}", i), i as i64)));
    let props = ChainedProps::new(&chain_class(&calls), &opts);
    (calls, opts, props)
}

proptest! {
    #[test]
    fn first_declared_overload_is_default(picks in prop::sample::subsequence(TAGS.to_vec(), 1..=TAGS.len()).prop_shuffle()) {
        let mut builder = DispatchClassBuilder::new("Prop");
        for (i, tag) in picks.iter().enumerate() {
            builder = builder.method("f", [DeclaredType::of(tag.clone())], move |_, _| Ok(Value::Int(i as i64)));
        }
        let instance = builder.build().unwrap().instantiate();

        // None is never declared, so the first declaration answers
        prop_assert_eq!(instance.call("f", &[Value::None]).unwrap(), Value::Int(0));
    }

    #[test]
    fn reads_are_memoized(reads in 1usize..20) {
        let (calls, _opts, props) = chain(5);
        for _ in 0..reads {
            props.get("c4").unwrap();
        }
        for count in calls.iter() {
            prop_assert_eq!(count.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn option_change_invalidates_downstream_only(key in 0usize..5, bump in 1i64..100) {
        let (_calls, opts, props) = chain(5);
        props.get("c4").unwrap();

        opts.set(format!("k{}", key), key as i64 + bump);
        for i in 0..5 {
            prop_assert_eq!(props.is_cached(&format!("c{}", i)), i < key);
        }

        let expected: i64 = (0..5).sum::<i64>() + bump;
        prop_assert_eq!(props.get("c4").unwrap(), Value::Int(expected));
    }

    #[test]
    fn repeated_invalidation_is_a_no_op(targets in prop::collection::vec(0usize..5, 1..12)) {
        let (calls, _opts, props) = chain(5);
        props.get("c4").unwrap();

        for target in &targets {
            props.invalidate(&format!("c{}", target)).unwrap();
            props.invalidate(&format!("c{}", target)).unwrap();
        }
        // invalidation never computes anything
        for count in calls.iter() {
            prop_assert_eq!(count.load(Ordering::SeqCst), 1);
        }

        let lowest = *targets.iter().min().unwrap();
        props.get("c4").unwrap();
        for (i, count) in calls.iter().enumerate() {
            let expected = if i < lowest { 1 } else { 2 };
            prop_assert_eq!(count.load(Ordering::SeqCst), expected);
        }
    }
}
