use std::fmt::Write;
use std::thread;

use viewbridge::{fmt, Engine, Error, ErrorKind, Scope, Syntax, Value, Variables};

#[test]
fn engine_debug() {
    let mut engine = Engine::new();
    engine.add_template("index.erb", "hi").unwrap();
    let debug = format!("{:?}", engine);
    assert!(debug.contains("index.erb"));
}

#[test]
fn engine_send_and_sync() {
    let mut engine = Engine::new();
    engine.add_template("index.haml", "%p= lorem").unwrap();
    thread::spawn(move || {
        let result = engine
            .get_template("index.haml")
            .unwrap()
            .render(&Value::from([("lorem", "ipsum")]))
            .unwrap();
        assert_eq!(result, "<p>ipsum</p>\n");
    })
    .join()
    .unwrap();
}

#[test]
fn engine_compile_non_static_source() -> viewbridge::Result<()> {
    let engine = Engine::new();
    let source = String::from("<%= lorem %>");
    let template = engine.compile(Syntax::Erb, &*source)?;
    assert_eq!(template.syntax(), Syntax::Erb);
    assert_eq!(template.source(), "<%= lorem %>");
    assert_eq!(template.render(&Value::from([("lorem", "ipsum")]))?, "ipsum");
    Ok(())
}

#[test]
fn engine_add_template_by_extension() -> viewbridge::Result<()> {
    let mut engine = Engine::new();
    engine.add_template("views/index.html.erb", "<b><%= name %></b>")?;
    engine.add_template("views/index.haml", "%b= name")?;
    engine.add_template_with_syntax("plain", Syntax::Haml, "%i= name")?;

    let vars = Value::from([("name", "Bob")]);
    let render = |name: &str| engine.get_template(name).unwrap().render(&vars);
    assert_eq!(render("views/index.html.erb")?, "<b>Bob</b>");
    assert_eq!(render("views/index.haml")?, "<b>Bob</b>\n");
    assert_eq!(render("plain")?, "<i>Bob</i>\n");
    assert_eq!(
        engine.get_template("views/index.haml").unwrap().syntax(),
        Syntax::Haml
    );
    Ok(())
}

#[test]
fn engine_add_template_err_unsupported_extension() {
    let mut engine = Engine::new();
    let err = engine.add_template("index.jelly", "<j:jelly/>").unwrap_err();
    assert_eq!(
        err.message(),
        "unsupported template extension for `index.jelly`, expected one of: erb, haml"
    );
    assert_eq!(engine.supported_extensions(), ["erb", "haml"]);
    assert!(engine.get_template("index.jelly").is_none());
}

#[test]
fn engine_add_template_err_syntax() {
    let mut engine = Engine::new();
    let err = engine.add_template("index.erb", "<% if x %>").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(engine.get_template("index.erb").is_none());
}

#[test]
fn engine_remove_template() {
    let mut engine = Engine::new();
    engine.add_template("a.erb", "a").unwrap();
    assert!(engine.remove_template("a.erb"));
    assert!(!engine.remove_template("a.erb"));
    assert!(engine.get_template("a.erb").is_none());
}

#[test]
fn engine_render_from_serde() {
    #[derive(serde::Serialize)]
    struct User {
        name: &'static str,
        tags: Vec<&'static str>,
        admin: bool,
    }

    #[derive(serde::Serialize)]
    struct Page {
        user: User,
    }

    let engine = Engine::new();
    let template = engine
        .compile(
            Syntax::Erb,
            r#"<%= user.name %><% if user.admin %> (admin)<% end %>: <%= user.tags.join(", ") %>"#,
        )
        .unwrap();
    let page = Page {
        user: User {
            name: "Ann",
            tags: vec!["a", "b"],
            admin: true,
        },
    };
    assert_eq!(template.render_from(&page).unwrap(), "Ann (admin): a, b");
}

#[test]
fn engine_render_with_scope() {
    let engine = Engine::new();
    let template = engine
        .compile(Syntax::Erb, "<%= greeting %>, <%= name %><%= missing.nil? %>")
        .unwrap();

    let mut root = Scope::new();
    root.set_variable("greeting", "Hello");
    root.set_variable("name", "root");
    root.set_variable("missing", Value::None);

    let mut child = Scope::with_parent(&root);
    child.set_variable("name", "child");

    assert_eq!(template.render(&child).unwrap(), "Hello, childtrue");
    assert_eq!(child.get_variable_or("other", &Value::from(1)), Value::from(1));
    // Bound to nil in the parent, so the default is not used.
    assert_eq!(child.get_variable_or("missing", &Value::from(1)), Value::None);
    assert_eq!(child.get_variable_or("greeting", &Value::None), Value::from("Hello"));

    child.remove_variable("name");
    assert_eq!(template.render(&child).unwrap(), "Hello, roottrue");
}

#[test]
fn engine_helpers() {
    let mut engine = Engine::new();
    engine.add_helper("link_to", |args| match args {
        [Value::String(text), Value::String(href)] => {
            Ok(Value::from(format!("<a href='{href}'>{text}</a>")))
        }
        _ => Err(Error::custom("expected a text and a URL")),
    });

    let template = engine
        .compile(Syntax::Erb, r#"<%= link_to("Home", "/") %> <%= "Docs".link_to("/docs") %>"#)
        .unwrap();
    assert_eq!(
        template.render(&Value::None).unwrap(),
        "<a href='/'>Home</a> <a href='/docs'>Docs</a>"
    );

    let err = engine
        .compile(Syntax::Erb, "<%= link_to(1) %>")
        .unwrap()
        .render(&Value::None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluation);
    assert_eq!(err.root_kind(), ErrorKind::Custom);
    assert_eq!(err.message(), "expected a text and a URL");
}

#[test]
fn engine_default_formatter() {
    let mut engine = Engine::new();
    engine.set_default_formatter(|f, value| match value {
        Value::Float(n) => write!(f, "{n:.2}").map_err(fmt::Error::from),
        Value::None => Err(fmt::Error::from("nil in output")),
        value => fmt::default(f, value),
    });

    let template = engine.compile(Syntax::Erb, "<%= 1.5 %> <%= [1].size %>").unwrap();
    assert_eq!(template.render(&Value::None).unwrap(), "1.50 1");

    let err = engine
        .compile(Syntax::Haml, "%p= nothing")
        .unwrap()
        .render(&Value::from([("nothing", Value::None)]))
        .unwrap_err();
    assert_eq!(err.message(), "nil in output");
}
