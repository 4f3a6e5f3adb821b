#![no_main]
use libfuzzer_sys::fuzz_target;
use nexus_entities::{Entity, Expr, PathMode, Prop};

struct Fuzzed;
impl Entity for Fuzzed {}

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // Parsing and rendering should not panic
        if let Ok(e) = Expr::<Fuzzed>::parse(s) {
            for mode in [PathMode::Full, PathMode::Filtered, PathMode::All, PathMode::First] {
                let _ = Prop::resolve(&e, mode);
            }
            let _ = Prop::property(&e);
        }
    }
});
