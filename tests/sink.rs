mod helpers;

use std::io;

use viewbridge::{AppendBuffer, ConcatBuffer, Engine, IoSink, Syntax, Value};

use crate::helpers::Chunks;

#[test]
fn sink_adapters_forward_the_same_chunks() {
    let chunks = ["<p>", "", "Hello", "</p>\n"];

    let mut a = Chunks::new();
    let mut erb = ConcatBuffer::new(&mut a);
    erb.set("");
    erb.force_encoding("UTF-8");
    for chunk in chunks {
        erb.concat(Some(chunk)).unwrap();
    }
    erb.concat(None).unwrap();

    let mut b = Chunks::new();
    let mut haml = AppendBuffer::new(&mut b);
    haml.force_encoding("UTF-8")
        .append(chunks[0])
        .unwrap()
        .append(chunks[1])
        .unwrap()
        .append(chunks[2])
        .unwrap()
        .append(chunks[3])
        .unwrap();

    assert_eq!(a.chunks, ["<p>", "Hello", "</p>\n"]);
    assert_eq!(a.chunks, b.chunks);
}

#[test]
fn sink_io_writer() {
    let engine = Engine::new();
    let template = engine
        .compile(Syntax::Haml, "%ul\n  - items.each do |i|\n    %li= i")
        .unwrap();
    let vars = Value::from([("items", Value::from([1, 2]))]);

    let mut sink = IoSink::new(Vec::new());
    template.run(&vars, &mut sink).unwrap();
    let bytes = sink.into_inner();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "<ul>\n<li>1</li>\n<li>2</li>\n</ul>\n"
    );

    let mut w = Vec::new();
    template.render_to_writer(&mut w, &vars).unwrap();
    assert_eq!(String::from_utf8(w).unwrap(), "<ul>\n<li>1</li>\n<li>2</li>\n</ul>\n");
}

#[test]
fn sink_io_writer_err() {
    struct Broken;

    impl io::Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let engine = Engine::new();
    let err = engine
        .compile(Syntax::Erb, "hello")
        .unwrap()
        .render_to_writer(Broken, &Value::None)
        .unwrap_err();
    assert_eq!(err.root_kind(), viewbridge::ErrorKind::Io);
    assert_eq!(err.message(), "io error: disk full");
}
