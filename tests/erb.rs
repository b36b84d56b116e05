mod helpers;

use viewbridge::{Engine, ErbOptions, ErrorKind, HamlOptions, Syntax, Value};

use crate::helpers::{assert_err, Chunks};

fn render(source: &str, vars: Value) -> String {
    Engine::new()
        .compile(Syntax::Erb, source)
        .unwrap()
        .render(&vars)
        .unwrap()
}

#[test]
fn erb_render_hello() {
    let result = render("Hello <%= name %>", Value::from([("name", "Bob")]));
    assert_eq!(result, "Hello Bob");
}

#[test]
fn erb_render_text_only() {
    assert_eq!(render("lorem ipsum", Value::None), "lorem ipsum");
}

#[test]
fn erb_render_literals() {
    let result = render(
        r#"<%= 1 %> <%= 2.0 %> <%= 1 + 0.5 %> <%= true %> <%= "a\tb" %> <%= 'c' %> <%= :sym %>"#,
        Value::None,
    );
    assert_eq!(result, "1 2.0 1.5 true a\tb c sym");
}

#[test]
fn erb_render_nil_is_empty() {
    let vars = Value::from([("x", Value::None)]);
    assert_eq!(render("[<%= x %>]", vars.clone()), "[]");
    assert_eq!(render("<%= x.nil? %>", vars), "true");
}

#[test]
fn erb_render_interpolation() {
    let result = render(
        r##"<%= "#{name.upcase}, #{n + 1}!" %>"##,
        Value::from([("name", Value::from("bob")), ("n", Value::from(1))]),
    );
    assert_eq!(result, "BOB, 2!");
}

#[test]
fn erb_render_member_and_index() {
    let vars = Value::from([
        ("user", Value::from([("name", "Ann")])),
        ("items", Value::from(["x", "y", "z"])),
    ]);
    let result = render(
        r#"<%= user.name %> <%= user["name"] %> <%= items[0] %> <%= items[-1] %> <%= items.size %>"#,
        vars,
    );
    assert_eq!(result, "Ann Ann x z 3");
}

#[test]
fn erb_render_if_elsif_else() {
    let source = "<% if n > 1 %>many<% elsif n == 1 %>one<% else %>none<% end %>";
    assert_eq!(render(source, Value::from([("n", 5)])), "many");
    assert_eq!(render(source, Value::from([("n", 1)])), "one");
    assert_eq!(render(source, Value::from([("n", 0)])), "none");
}

#[test]
fn erb_render_unless() {
    let source = "<% unless admin %>guest<% end %>";
    assert_eq!(render(source, Value::from([("admin", false)])), "guest");
    assert_eq!(render(source, Value::from([("admin", true)])), "");
}

#[test]
fn erb_render_and_or() {
    let vars = Value::from([("a", Value::None), ("b", Value::from("set"))]);
    let result = render(
        r#"<%= a || "default" %> <%= b && b.upcase %> <%= !a %>"#,
        vars,
    );
    assert_eq!(result, "default SET true");
}

#[test]
fn erb_render_each_list() {
    let vars = Value::from([("items", Value::from([Value::from(1), "a".into(), true.into()]))]);
    let result = render("<% items.each do |item| %>[<%= item %>]<% end %>", vars);
    assert_eq!(result, "[1][a][true]");
}

#[test]
fn erb_render_each_map() {
    let vars = Value::from([("m", Value::from([("b", 2), ("a", 1)]))]);
    let result = render("<% m.each do |k, v| %><%= k %>=<%= v %>;<% end %>", vars);
    assert_eq!(result, "a=1;b=2;");
}

#[test]
fn erb_render_each_brace_form() {
    let result = render("<% [1, 2].each { |i| %><%= i %><% } %>", Value::None);
    assert_eq!(result, "12");
}

#[test]
fn erb_render_each_with_index_and_times() {
    let vars = Value::from([("items", Value::from(["x", "y"]))]);
    let result = render(
        "<% items.each_with_index do |item, i| %><%= i %>:<%= item %> <% end %><% 3.times do |i| %><%= i %><% end %>",
        vars,
    );
    assert_eq!(result, "0:x 1:y 012");
}

#[test]
fn erb_render_times_yields_lazily() {
    let engine = Engine::new();
    let source = "<% n.times do |i| %><%= i %><% if i == 2 %><%= stop %><% end %><% end %>";
    let template = engine.compile(Syntax::Erb, source).unwrap();
    let mut sink = Chunks::new();
    let err = template
        .run(&Value::from([("n", 4_000_000_000_000i64)]), &mut sink)
        .unwrap_err();
    assert_eq!(sink.joined(), "012");
    assert_eq!(err.root_kind(), ErrorKind::SymbolNotFound);
}

#[test]
fn erb_render_assign_in_block_updates_local() {
    let result = render(
        "<% x = 1 %><% [1, 2].each do |i| %><% x = x + i %><% end %><%= x %>",
        Value::None,
    );
    assert_eq!(result, "4");
}

#[test]
fn erb_render_block_locals_are_dropped() {
    let engine = Engine::new();
    let template = engine
        .compile(Syntax::Erb, "<% [1].each do |i| %><% y = i %><% end %><%= y %>")
        .unwrap();
    let err = template.render(&Value::None).unwrap_err();
    assert_eq!(err.root_kind(), ErrorKind::SymbolNotFound);
}

#[test]
fn erb_render_locals_shadow_variables() {
    let result = render(
        "<%= name %> <% name = \"local\" %><%= name %>",
        Value::from([("name", "host")]),
    );
    assert_eq!(result, "host local");
}

#[test]
fn erb_render_multiple_statements() {
    let result = render("<% a = 1; b = 2\n c = a + b %><%= c %>", Value::None);
    assert_eq!(result, "3");
}

#[test]
fn erb_render_hash_literal() {
    let result = render(
        r#"<% u = { name: "Ann", "age" => 3 } %><%= u.name %> <%= u["age"] %> <%= u.keys.join(",") %>"#,
        Value::None,
    );
    assert_eq!(result, "Ann 3 age,name");
}

#[test]
fn erb_render_buffer_writes() {
    let result = render(
        r#"<% _erbout << "a" << 1 %><% _erbout.concat("b") %>"#,
        Value::None,
    );
    assert_eq!(result, "a1b");
}

#[test]
fn erb_render_buffer_setup_is_ignored() {
    let source = r#"<% _erbout = +''; _erbout.force_encoding("UTF-8") << "a" %>b<%= 1 %>"#;
    assert_eq!(render(source, Value::None), "ab1");

    // The initial value is never bound as a local.
    let engine = Engine::new();
    let template = engine
        .compile(Syntax::Erb, "<% _erbout = 'junk' %>x<%= _erbout %>")
        .unwrap();
    let mut sink = Chunks::new();
    let err = template.run(&Value::None, &mut sink).unwrap_err();
    assert_eq!(sink.joined(), "x");
    assert_eq!(err.root_kind(), ErrorKind::SymbolNotFound);
}

#[test]
fn erb_compile_err_force_encoding_argument() {
    let err = Engine::new()
        .compile(Syntax::Erb, "<% _erbout.force_encoding(enc) %>")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "expected encoding name");
}

#[test]
fn erb_render_custom_buffer_name() {
    let erb = ErbOptions::builder().buffer("out").build();
    let engine = Engine::with_options(erb, HamlOptions::default());
    let result = engine
        .compile(Syntax::Erb, r#"<% out << "x" %><% out.concat("y") %>"#)
        .unwrap()
        .render(&Value::None)
        .unwrap();
    assert_eq!(result, "xy");
}

#[test]
fn erb_render_trim() {
    let source = "<ul>\n<% items.each do |i| -%>\n  <li><%= i %></li>\n<% end -%>\n</ul>";
    let result = render(source, Value::from([("items", Value::from([1, 2]))]));
    assert_eq!(result, "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>");
}

#[test]
fn erb_render_literal_tag_and_comment() {
    let result = render("<%% x %> <%# hidden %>y", Value::None);
    assert_eq!(result, "<% x %> y");
}

#[test]
fn erb_render_is_deterministic() {
    let engine = Engine::new();
    let source = "<% items.each do |i| %><%= i %>,<% end %>";
    let vars = Value::from([("items", Value::from(["a", "b"]))]);
    let a = engine.compile(Syntax::Erb, source).unwrap().render(&vars).unwrap();
    let b = engine.compile(Syntax::Erb, source).unwrap().render(&vars).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, "a,b,");
}

#[test]
fn erb_render_err_symbol_not_found_keeps_partial_output() {
    let engine = Engine::new();
    let template = engine.compile(Syntax::Erb, "a<%= missing %>b").unwrap();
    let mut sink = Chunks::new();
    let err = template.run(&Value::None, &mut sink).unwrap_err();
    assert_eq!(sink.chunks, ["a"]);
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.root_kind(), ErrorKind::SymbolNotFound);
    assert_eq!(err.cause().unwrap().kind(), ErrorKind::SymbolNotFound);
    assert_err(
        &err,
        "undefined local variable or method `missing`",
        "
   |
 1 | a<%= missing %>b
   |      ^^^^^^^ MSG
",
    );
}

#[test]
fn erb_render_err_unformattable() {
    let engine = Engine::new();
    let err = engine
        .compile(Syntax::Erb, "<%= [1] %>")
        .unwrap()
        .render(&Value::None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.message(), "expression evaluated to unformattable type list");

    let result = render("<%= [1, nil].inspect %>", Value::None);
    assert_eq!(result, "[1, nil]");
}

#[test]
fn erb_render_err_undefined_method() {
    let engine = Engine::new();
    let err = engine
        .compile(Syntax::Erb, "<%= u.age %>")
        .unwrap()
        .render(&Value::from([("u", Value::from([("name", "Ann")]))]))
        .unwrap_err();
    assert_eq!(err.message(), "undefined method `age` for map");
}

#[test]
fn erb_render_err_sink_failure() {
    let engine = Engine::new();
    let template = engine.compile(Syntax::Erb, "a<%= 1 %>b").unwrap();
    let mut sink = Chunks::with_max(1);
    let err = template.run(&Value::None, &mut sink).unwrap_err();
    assert_eq!(sink.chunks, ["a"]);
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.message(), "sink is full");
}

#[test]
fn erb_compile_err_unclosed_if() {
    let err = Engine::new()
        .compile(Syntax::Erb, "<% if a %>x")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "unclosed `if` block");
}

#[test]
fn erb_compile_err_unexpected_end() {
    let err = Engine::new().compile(Syntax::Erb, "x<% end %>").unwrap_err();
    assert_eq!(err.message(), "unexpected `end`");
}

#[test]
fn erb_compile_err_unclosed_tag() {
    let err = Engine::new().compile(Syntax::Erb, "a <%= b").unwrap_err();
    assert_err(
        &err,
        "unclosed tag",
        "
   |
 1 | a <%= b
   |   ^^ MSG
",
    );
}
