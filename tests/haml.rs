mod helpers;

use viewbridge::{Engine, ErbOptions, ErrorKind, HamlOptions, Syntax, Value};

use crate::helpers::{assert_err, Chunks};

fn render(source: &str, vars: Value) -> String {
    Engine::new()
        .compile(Syntax::Haml, source)
        .unwrap()
        .render(&vars)
        .unwrap()
}

#[test]
fn haml_render_inline_text() {
    let result = render("%p Hello #{name}", Value::from([("name", "Bob")]));
    assert_eq!(result, "<p>Hello Bob</p>\n");
}

#[test]
fn haml_render_plain_text() {
    let result = render("Hello\n#{name}!", Value::from([("name", "Bob")]));
    assert_eq!(result, "Hello\nBob!\n");
}

#[test]
fn haml_render_nested_loop() {
    let source = "\
%ul#list.items
  - items.each do |item|
    %li= item
";
    let result = render(source, Value::from([("items", Value::from(["a", "b"]))]));
    assert_eq!(
        result,
        "<ul class='items' id='list'>\n<li>a</li>\n<li>b</li>\n</ul>\n"
    );
}

#[test]
fn haml_render_attributes() {
    let source = r#"%a{ href: url, title: "T", hidden: false, checked: true }= text"#;
    let vars = Value::from([("url", "/x"), ("text", "go")]);
    assert_eq!(render(source, vars), "<a href='/x' title='T' checked>go</a>\n");
}

#[test]
fn haml_render_html_style_attributes() {
    let source = r#"%a.btn(href=url title="Go #{name}" checked){ data: 1 } go"#;
    let vars = Value::from([("url", "/x"), ("name", "Bob")]);
    assert_eq!(
        render(source, vars),
        "<a class='btn' href='/x' title='Go Bob' checked data='1'>go</a>\n"
    );
    assert_eq!(render("%p(a='1')", Value::None), "<p a='1'></p>\n");
}

#[test]
fn haml_compile_err_unclosed_html_attributes() {
    let err = Engine::new()
        .compile(Syntax::Haml, "%p(a='1' text")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "unclosed attribute list");
}

#[test]
fn haml_render_dynamic_nil_attribute() {
    let vars = Value::from([("target", Value::None), ("flag", Value::from(true))]);
    let result = render("%a{ target: target, data: flag }", vars);
    assert_eq!(result, "<a data></a>\n");
}

#[test]
fn haml_render_class_merge() {
    let vars = Value::from([("kind", "primary")]);
    assert_eq!(render(".btn{ class: kind }", vars), "<div class='btn primary'></div>\n");
}

#[test]
fn haml_render_if_else() {
    let source = "\
- if admin
  %b admin
- elsif guest
  %i guest
- else
  %s nobody
done
";
    let vars = |admin: bool, guest: bool| Value::from([("admin", admin), ("guest", guest)]);
    assert_eq!(render(source, vars(true, false)), "<b>admin</b>\ndone\n");
    assert_eq!(render(source, vars(false, true)), "<i>guest</i>\ndone\n");
    assert_eq!(render(source, vars(false, false)), "<s>nobody</s>\ndone\n");
}

#[test]
fn haml_render_output_line() {
    let result = render("= 1 + 2\n= name.upcase", Value::from([("name", "bob")]));
    assert_eq!(result, "3\nBOB\n");
}

#[test]
fn haml_render_comments_and_doctype() {
    let source = "\
!!!
-# hidden
  %p also hidden
/ visible
%br
%img{ src: \"a.png\" }/
\\= not code
";
    let result = render(source, Value::None);
    assert_eq!(
        result,
        "<!DOCTYPE html>\n<!-- visible -->\n<br>\n<img src='a.png'>\n= not code\n"
    );
}

#[test]
fn haml_render_buffer_append() {
    let result = render("- haml_buffer << \"x\" << 1\n%p y", Value::None);
    assert_eq!(result, "x1<p>y</p>\n");
}

#[test]
fn haml_render_custom_buffer_name() {
    let haml = HamlOptions::builder().buffer("out").build();
    let engine = Engine::with_options(ErbOptions::default(), haml);
    let result = engine
        .compile(Syntax::Haml, "- out << \"x\"")
        .unwrap()
        .render(&Value::None)
        .unwrap();
    assert_eq!(result, "x");
}

#[test]
fn haml_render_matches_erb_output() {
    let engine = Engine::new();
    let vars = Value::from([("items", Value::from(["a", "b"]))]);

    let haml = engine
        .compile(Syntax::Haml, "- items.each do |i|\n  %li= i")
        .unwrap();
    let erb = engine
        .compile(Syntax::Erb, "<% items.each do |i| %><li><%= i %></li>\n<% end %>")
        .unwrap();

    let mut a = Chunks::new();
    let mut b = Chunks::new();
    haml.run(&vars, &mut a).unwrap();
    erb.run(&vars, &mut b).unwrap();
    assert_eq!(a.joined(), b.joined());
}

#[test]
fn haml_render_err_symbol_not_found() {
    let engine = Engine::new();
    let template = engine.compile(Syntax::Haml, "%p ok\n%p= missing").unwrap();
    let mut sink = Chunks::new();
    let err = template.run(&Value::None, &mut sink).unwrap_err();
    assert_eq!(sink.joined(), "<p>ok</p>\n<p>");
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.root_kind(), ErrorKind::SymbolNotFound);
    assert_err(
        &err,
        "undefined local variable or method `missing`",
        "
   |
 2 | %p= missing
   |     ^^^^^^^ MSG
",
    );
}

#[test]
fn haml_compile_err_inconsistent_indentation() {
    let err = Engine::new()
        .compile(Syntax::Haml, "%div\n    %p\n  %p")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "inconsistent indentation");
}

#[test]
fn haml_compile_err_self_closing_content() {
    let err = Engine::new()
        .compile(Syntax::Haml, "%br text")
        .unwrap_err();
    assert_eq!(
        err.message(),
        "illegal nesting: self-closing elements can't have content"
    );
}

#[test]
fn haml_compile_err_invalid_element_name() {
    let err = Engine::new().compile(Syntax::Haml, "% p").unwrap_err();
    assert_err(
        &err,
        "invalid element name",
        "
   |
 1 | % p
   | ^ MSG
",
    );
}
