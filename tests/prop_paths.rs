use nexus_entities::{Entity, Expr, PathMode, Prop};
use proptest::prelude::*;

struct Book;
impl Entity for Book {}

fn field_name() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,8}"
}

/// Member names, each optionally followed by an indexer.
fn access_chain(max_len: usize) -> impl Strategy<Value = Vec<(String, bool)>> {
    proptest::collection::vec((field_name(), any::<bool>()), 1..max_len)
}

fn build(chain: &[(String, bool)]) -> Expr<Book> {
    let mut e = Expr::<Book>::root();
    for (name, indexed) in chain {
        e = e.field(name.clone());
        if *indexed {
            e = e.any();
        }
    }
    e
}

fn lambda_text(chain: &[(String, bool)]) -> String {
    let mut s = String::from("x => x");
    for (i, (name, indexed)) in chain.iter().enumerate() {
        s.push('.');
        s.push_str(name);
        if *indexed {
            s.push_str(&format!("[{i}]"));
        }
    }
    s
}

proptest! {
    #![proptest_config(proptest::test_runner::Config {
        failure_persistence: Some(Box::new(proptest::test_runner::FileFailurePersistence::WithSource("proptest-regressions"))),
        cases: 64,
        .. proptest::test_runner::Config::default()
    })]

    #[test]
    fn prop_member_only_paths_identical(names in proptest::collection::vec(field_name(), 1..10)) {
        let chain: Vec<(String, bool)> = names.into_iter().map(|n| (n, false)).collect();
        let e = build(&chain);
        let full = Prop::full_path(&e).unwrap();
        prop_assert_eq!(&Prop::pos_filtered(&e).unwrap(), &full);
        prop_assert_eq!(&Prop::pos_all(&e).unwrap(), &full);
        prop_assert_eq!(&Prop::pos_first(&e).unwrap(), &full);
    }

    #[test]
    fn prop_placeholder_counts(chain in access_chain(26)) {
        let e = build(&chain);
        let n = chain.iter().filter(|(_, i)| *i).count();
        let filtered = Prop::pos_filtered(&e).unwrap();
        let letters: Vec<char> = filtered
            .split('.')
            .filter_map(|seg| seg.strip_prefix("$[").and_then(|r| r.strip_suffix(']')))
            .filter_map(|inner| inner.chars().next())
            .collect();
        prop_assert_eq!(letters.len(), n);
        for (i, c) in letters.iter().enumerate() {
            prop_assert_eq!(*c, char::from(b'a' + i as u8));
        }
        let all = Prop::pos_all(&e).unwrap();
        prop_assert_eq!(all.split('.').filter(|s| *s == "$[]").count(), n);
        let first = Prop::pos_first(&e).unwrap();
        prop_assert_eq!(first.split('.').filter(|s| *s == "$").count(), n);
        prop_assert!(!all.contains("$[a]"));
    }

    #[test]
    fn prop_property_is_last_full_path_token(chain in access_chain(12)) {
        let e = build(&chain);
        let full = Prop::full_path(&e).unwrap();
        let last = full.rsplit('.').next().unwrap().to_string();
        prop_assert_eq!(Prop::property(&e).unwrap(), last);
    }

    #[test]
    fn prop_elements_at_prefixes_letter(chain in access_chain(12), index in 0usize..26) {
        let e = build(&chain);
        let want = format!("{}.{}", char::from(b'a' + index as u8), Prop::elements(&e).unwrap());
        prop_assert_eq!(Prop::elements_at(index, &e).unwrap(), want);
    }

    #[test]
    fn prop_parser_matches_builder(chain in access_chain(12)) {
        let parsed = Expr::<Book>::parse(&lambda_text(&chain)).unwrap();
        let built = build(&chain);
        for mode in [PathMode::Full, PathMode::Filtered, PathMode::All, PathMode::First] {
            prop_assert_eq!(Prop::resolve(&parsed, mode).unwrap(), Prop::resolve(&built, mode).unwrap());
        }
    }
}
