#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde::Serialize;
use viewbridge::{Engine, Syntax, TagRegistry};

#[derive(Debug, Serialize, Arbitrary)]
enum Value {
    None,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

fuzz_target!(|data: (bool, &str, BTreeMap<String, Value>)| {
    let (haml, source, vars) = data;
    let syntax = if haml { Syntax::Haml } else { Syntax::Erb };

    let mut tags = TagRegistry::new();
    tags.register("/fuzz", "wrap", |_, cx| {
        cx.write("<wrap>")?;
        cx.run_body()?;
        cx.write("</wrap>")
    });
    let mut engine = Engine::new();
    engine.set_tag_library(tags);

    let template = match engine.compile(syntax, source) {
        Ok(template) => template,
        Err(_) => return,
    };
    let _ = template.render_from(&vars);
});
