//! Scripts driving the bundled host classes through reflection.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use flint_interop::host_registry;
use flint_parser::parse_program;
use flint_runtime::Evaluator;
use pretty_assertions::assert_eq;

#[derive(Clone, Default)]
struct Capture(Rc<RefCell<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> String {
    let program = parse_program(source).expect("parse failure");
    let capture = Capture::default();
    let evaluator =
        Evaluator::with_host(host_registry()).with_output(Box::new(capture.clone()));
    evaluator.run(&program).expect("evaluation failure");
    let output = capture.0.borrow().clone();
    String::from_utf8(output).expect("output is not utf-8")
}

fn run_err(source: &str) -> String {
    let program = parse_program(source).expect("parse failure");
    let evaluator = Evaluator::with_host(host_registry()).with_output(Box::new(io::sink()));
    evaluator
        .run(&program)
        .expect_err("expected an error")
        .to_string()
}

// ====== math.Vector2 ====== //

#[test]
fn test_vector_length() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        print(v.length());
    ";
    assert_eq!(run(source), "5.0\n");
}

#[test]
fn test_vector_fields_read_and_write() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        v.x = 10.0;
        print(v.x);
        print(v.y);
    ";
    assert_eq!(run(source), "10.0\n4.0\n");
}

#[test]
fn test_vector_dot_product() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        reflection u = new reflection(\"math.Vector2\", 2.0, 1.0);
        print(v.dot(u));
        print(v.dot(v));
    ";
    assert_eq!(run(source), "10.0\n25.0\n");
}

#[test]
fn test_void_method_in_statement_position() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        v.scale(2.0);
        print(v.x);
        print(v.y);
    ";
    assert_eq!(run(source), "6.0\n8.0\n");
}

#[test]
fn test_void_method_in_expression_rejected() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        print(v.scale(2.0));
    ";
    assert_eq!(
        run_err(source),
        "Function scale is being invoked in an expression but does not have a return value."
    );
}

#[test]
fn test_static_method_through_class_handle() {
    let source = "
        reflection unit = reflection(\"math.Vector2\").unit();
        print(unit.x);
        print(unit.y);
    ";
    assert_eq!(run(source), "1.0\n0.0\n");
}

#[test]
fn test_instance_method_on_class_handle_rejected() {
    assert_eq!(
        run_err("print(reflection(\"math.Vector2\").length());"),
        "Invocation target invalid."
    );
}

#[test]
fn test_host_objects_compare_by_identity() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 1.0, 2.0);
        reflection w = v;
        reflection u = new reflection(\"math.Vector2\", 1.0, 2.0);
        print(v == w);
        print(v == u);
    ";
    assert_eq!(run(source), "true\nfalse\n");
}

#[test]
fn test_host_objects_print_their_class() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 1.0, 2.0);
        print(v);
        print(reflection(\"math.Vector2\"));
    ";
    assert_eq!(run(source), "math.Vector2 instance\nmath.Vector2\n");
}

// ====== math.Tuple tagging ====== //

#[test]
fn test_ancestor_tag_dispatches_to_runtime_class() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        reflection t = (reflection \"math.Tuple\") v;
        print(t.size());
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn test_ancestor_tag_restricts_the_surface() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        reflection t = (reflection \"math.Tuple\") v;
        print(t.length());
    ";
    assert_eq!(run_err(source), "Could not invoke method length.");
}

#[test]
fn test_cast_back_down_restores_the_surface() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        reflection t = (reflection \"math.Tuple\") v;
        reflection w = (reflection \"math.Vector2\") t;
        print(w.length());
    ";
    assert_eq!(run(source), "5.0\n");
}

#[test]
fn test_abstract_class_cannot_be_instantiated() {
    assert_eq!(
        run_err("reflection t = new reflection(\"math.Tuple\");"),
        "Could not create instance of math.Tuple."
    );
}

#[test]
fn test_unrelated_cast_rejected() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 3.0, 4.0);
        reflection c = (reflection \"util.Counter\") v;
    ";
    assert_eq!(run_err(source), "Unsupported cast.");
}

#[test]
fn test_primitive_cannot_be_tagged() {
    assert_eq!(
        run_err("reflection v = (reflection \"math.Vector2\") 1;"),
        "Cannot cast primitive type to a reflection type."
    );
}

// ====== text.StringBuilder ====== //

#[test]
fn test_string_builder_appends_overloads() {
    let source = "
        reflection b = new reflection(\"text.StringBuilder\");
        b.append(\"a\");
        b.append(1);
        print(b.build());
        print(b.length());
    ";
    assert_eq!(run(source), "a1\n2\n");
}

#[test]
fn test_string_builder_seeded_constructor() {
    let source = "
        reflection b = new reflection(\"text.StringBuilder\", \"hi \");
        b.append(\"there\");
        print(b.build());
    ";
    assert_eq!(run(source), "hi there\n");
}

#[test]
fn test_out_of_range_integer_argument_rejected() {
    let source = "
        reflection b = new reflection(\"text.StringBuilder\");
        b.append(4000000000);
    ";
    assert_eq!(run_err(source), "Could not invoke method append.");
}

// ====== util.Counter ====== //

#[test]
fn test_counter_methods_and_field() {
    let source = "
        reflection c = new reflection(\"util.Counter\", 40);
        c.increment();
        c.increment();
        print(c.value());
        print(c.count);
        c.count = 0;
        print(c.value());
    ";
    assert_eq!(run(source), "42\n42\n0\n");
}

#[test]
fn test_counter_decrement_and_reset() {
    let source = "
        reflection c = new reflection(\"util.Counter\");
        c.decrement();
        print(c.count);
        c.reset();
        print(c.count);
    ";
    assert_eq!(run(source), "-1\n0\n");
}

#[test]
fn test_counter_field_type_checked() {
    let source = "
        reflection c = new reflection(\"util.Counter\");
        c.count = \"x\";
    ";
    assert_eq!(
        run_err(source),
        "Cannot assign value of type: string to variable of type: int. Are you missing a cast?"
    );
}

// ====== Errors ====== //

#[test]
fn test_unknown_class_path_reported() {
    assert_eq!(
        run_err("reflection v = new reflection(\"math.Vector3\", 1.0);"),
        "Could not find math.Vector3. Verify that full class path is present."
    );
}

#[test]
fn test_wrong_constructor_arguments_reported() {
    assert_eq!(
        run_err("reflection v = new reflection(\"math.Vector2\", 1, 2);"),
        "Could not find constructor of math.Vector2."
    );
}

#[test]
fn test_missing_default_constructor_reported() {
    assert_eq!(
        run_err("reflection v = new reflection(\"math.Vector2\");"),
        "Could not create new instance of math.Vector2."
    );
}

#[test]
fn test_unknown_method_reported() {
    let source = "
        reflection v = new reflection(\"math.Vector2\", 1.0, 2.0);
        v.normalise();
    ";
    assert_eq!(run_err(source), "Could not invoke method normalise.");
}
