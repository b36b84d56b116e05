#![no_main]

use libfuzzer_sys::fuzz_target;
use viewbridge::{Engine, Syntax};

fuzz_target!(|data: (bool, &str)| {
    let (haml, source) = data;
    let syntax = if haml { Syntax::Haml } else { Syntax::Erb };
    let _ = Engine::new().compile(syntax, source);
});
