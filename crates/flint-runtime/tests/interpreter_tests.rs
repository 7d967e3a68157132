//! End-to-end interpreter tests: parse a program, evaluate it, and check the
//! captured output or the reported error.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use flint_parser::parse_program;
use flint_runtime::{EvalError, Evaluator};
use pretty_assertions::assert_eq;

/// A `Write` sink that clones share, so the test keeps a handle to the
/// output after handing the writer to the evaluator.
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
    let evaluator = Evaluator::new().with_output(Box::new(capture.clone()));
    evaluator.run(&program).expect("evaluation failure");
    let output = capture.0.borrow().clone();
    String::from_utf8(output).expect("output is not utf-8")
}

fn run_until_error(source: &str) -> (String, EvalError) {
    let program = parse_program(source).expect("parse failure");
    let capture = Capture::default();
    let evaluator = Evaluator::new().with_output(Box::new(capture.clone()));
    let err = evaluator.run(&program).expect_err("expected an error");
    let output = capture.0.borrow().clone();
    (String::from_utf8(output).expect("output is not utf-8"), err)
}

fn run_err(source: &str) -> String {
    run_until_error(source).1.to_string()
}

// ====== Arithmetic and printing ====== //

#[test]
fn test_prints_arithmetic() {
    assert_eq!(run("print(3 + 4);"), "7\n");
}

#[test]
fn test_integer_division_truncates() {
    assert_eq!(run("print(7 / 2);"), "3\n");
    assert_eq!(run("print(7 % 2);"), "1\n");
}

#[test]
fn test_division_by_zero_reported() {
    assert_eq!(run_err("print(1 / 0);"), "Division by zero.");
    assert_eq!(run_err("print(1 % 0);"), "Division by zero.");
}

#[test]
fn test_floating_values_print_with_fraction() {
    assert_eq!(run("print(2.0f + 2.0f);"), "4.0\n");
    assert_eq!(run("print(1.5 + 1.5);"), "3.0\n");
    assert_eq!(run("print(2.5f);"), "2.5\n");
}

#[test]
fn test_string_concatenation() {
    assert_eq!(run("print(\"ab\" + \"cd\");"), "abcd\n");
}

#[test]
fn test_mixed_operand_types_rejected() {
    assert_eq!(
        run_err("print(1 + \"a\");"),
        "Cannot apply operator '+' to values of type int and string. Are you missing a cast?"
    );
    assert_eq!(
        run_err("print(1 + 2.0);"),
        "Cannot apply operator '+' to values of type int and double. Are you missing a cast?"
    );
}

#[test]
fn test_unary_operators() {
    assert_eq!(run("print(-3);"), "-3\n");
    assert_eq!(run("print(!false);"), "true\n");
    assert_eq!(
        run_err("print(-\"a\");"),
        "Cannot apply operator '-' to a value of type string."
    );
}

// ====== Declarations and assignment ====== //

#[test]
fn test_declared_defaults() {
    let source = "
        int i;
        double d;
        string s;
        bool b;
        print(i);
        print(d);
        print(s);
        print(b);
    ";
    assert_eq!(run(source), "0\n0.0\n\nfalse\n");
}

#[test]
fn test_assignment_keeps_type() {
    assert_eq!(run("int x = 1; x = 2; print(x);"), "2\n");
    assert_eq!(
        run_err("int x = 1; x = \"a\";"),
        "Cannot assign value of type: string to variable of type: int. Are you missing a cast?"
    );
}

#[test]
fn test_assignment_requires_declaration() {
    assert_eq!(
        run_err("x = 1;"),
        "Variable x does not exist yet. Are you missing a declaration?"
    );
}

#[test]
fn test_duplicate_declaration_with_initialiser() {
    assert_eq!(
        run_err("int x = 1; int x = 2;"),
        "Variable 'x' has already been defined in this scope."
    );
}

#[test]
fn test_duplicate_declaration_without_initialiser() {
    assert_eq!(run_err("int x; int x;"), "Variable x already exists.");
}

#[test]
fn test_declaration_type_checked() {
    assert_eq!(
        run_err("int x = \"a\";"),
        "Cannot assign value of type: string to variable of type: int. Are you missing a cast?"
    );
}

#[test]
fn test_const_reassignment_rejected() {
    assert_eq!(
        run_err("const int k = 1; k = 2;"),
        "Cannot re-assign to constant value."
    );
}

#[test]
fn test_const_requires_initialiser() {
    assert_eq!(
        run_err("const int k;"),
        "Cannot declare a const variable without a definition."
    );
}

#[test]
fn test_readonly_outside_class_rejected() {
    assert_eq!(
        run_err("readonly int r = 1;"),
        "Cannot declare a readonly variable outside of a class."
    );
}

#[test]
fn test_void_variable_rejected() {
    assert_eq!(run_err("void v;"), "Cannot use void as a variable type.");
}

#[test]
fn test_func_variable_needs_initialiser() {
    assert_eq!(
        run_err("func f;"),
        "Cannot declare a func variable without a definition."
    );
}

// ====== Scoping ====== //

#[test]
fn test_block_names_retracted() {
    let source = "
        { int x = 1; }
        int x = 2;
        print(x);
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn test_block_variable_invisible_after_block() {
    assert_eq!(
        run_err("{ int x = 1; } print(x);"),
        "Variable or parameter x is undefined."
    );
}

#[test]
fn test_blocks_retract_functions_and_classes() {
    let source = "
        {
            function int f() { return 1; }
            class K {}
            print(f());
        }
        function int f() { return 2; }
        print(f());
    ";
    assert_eq!(run(source), "1\n2\n");
}

#[test]
fn test_shadowing_forbidden() {
    let source = "
        int x = 1;
        function void f() { int x = 2; }
        f();
    ";
    assert_eq!(
        run_err(source),
        "Variable 'x' has already been defined in this scope."
    );
}

// ====== Control flow ====== //

#[test]
fn test_if_else_branches() {
    let source = "
        if (1 < 2) print(\"yes\"); else print(\"no\");
        if (2 < 1) print(\"yes\"); else print(\"no\");
    ";
    assert_eq!(run(source), "yes\nno\n");
}

#[test]
fn test_if_condition_must_be_boolean() {
    assert_eq!(
        run_err("if (1) {}"),
        "The test expression of an if statement must be boolean."
    );
}

#[test]
fn test_for_loop_counts() {
    assert_eq!(
        run("for (int i = 0; i < 5; i++) print(i);"),
        "0\n1\n2\n3\n4\n"
    );
}

#[test]
fn test_loop_variable_retracted() {
    assert_eq!(
        run_err("for (int i = 0; i < 3; i++) {} print(i);"),
        "Variable or parameter i is undefined."
    );
}

#[test]
fn test_loop_body_declarations_allowed_each_iteration() {
    let source = "
        for (int i = 0; i < 3; i++) {
            int x = i;
            print(x);
        }
    ";
    assert_eq!(run(source), "0\n1\n2\n");
}

#[test]
fn test_loop_initialiser_modifier_rejected() {
    assert_eq!(
        run_err("for (const int i = 0; i < 3; i++) {}"),
        "Cannot apply const/readonly to variable used for loop initialisation."
    );
}

#[test]
fn test_for_condition_must_be_boolean() {
    assert_eq!(
        run_err("for (int i = 0; 1; i++) {}"),
        "The test expression of a for loop must be boolean."
    );
}

#[test]
fn test_while_loop() {
    let source = "
        int n = 3;
        while (n > 0) {
            print(n);
            n = n - 1;
        }
    ";
    assert_eq!(run(source), "3\n2\n1\n");
}

#[test]
fn test_while_condition_must_be_boolean() {
    assert_eq!(
        run_err("while (1) {}"),
        "The test expression of a while loop must be boolean."
    );
}

#[test]
fn test_quit_stops_the_program() {
    let (output, err) = run_until_error("print(1); quit; print(2);");
    assert_eq!(output, "1\n");
    assert!(matches!(err, EvalError::Quit));
}

// ====== Comparison and logic ====== //

#[test]
fn test_comparisons() {
    assert_eq!(run("print(\"a\" < \"b\");"), "true\n");
    assert_eq!(run("print(false < true);"), "true\n");
    assert_eq!(run("print(3 >= 3);"), "true\n");
    assert_eq!(run("print(1 != 2);"), "true\n");
}

#[test]
fn test_no_short_circuit_evaluation() {
    let source = "
        function bool hit() {
            print(\"hit\");
            return true;
        }
        bool b = hit() || hit();
        print(b);
    ";
    assert_eq!(run(source), "hit\nhit\ntrue\n");
}

#[test]
fn test_logical_operators_require_booleans() {
    assert_eq!(
        run_err("print(1 && true);"),
        "Cannot apply operator '&&' to values of type int and bool. Are you missing a cast?"
    );
}

#[test]
fn test_equality_on_composites_is_identity() {
    let source = "
        array a = new array(int, 2);
        array b = new array(int, 2);
        array c = a;
        print(a == b);
        print(a == c);
    ";
    assert_eq!(run(source), "false\ntrue\n");
}

// ====== Casts ====== //

#[test]
fn test_casts_between_primitives() {
    assert_eq!(run("print((int) \"42\");"), "42\n");
    assert_eq!(run("print((string) true);"), "true\n");
    assert_eq!(run("print((int) 2.9);"), "2\n");
    assert_eq!(run("print((bool) 3);"), "true\n");
    assert_eq!(run("print((double) 2);"), "2.0\n");
    assert_eq!(run("print((bool) \"yes\");"), "false\n");
}

#[test]
fn test_cast_parse_failure() {
    assert_eq!(run_err("print((int) \"12x\");"), "Could not parse '12x' as int.");
    assert_eq!(
        run_err("print((int) \"99999999999999999999\");"),
        "Could not parse '99999999999999999999' as int."
    );
}

#[test]
fn test_unsupported_cast_rejected() {
    assert_eq!(run_err("print((int) new array(int, 1));"), "Unsupported cast.");
}

#[test]
fn test_primitive_to_reflection_cast_rejected() {
    assert_eq!(
        run_err("print((reflection \"math.Vector2\") 1);"),
        "Cannot cast primitive type to a reflection type."
    );
}

// ====== Functions ====== //

#[test]
fn test_functions_and_recursion() {
    let source = "
        function int fact(int n) {
            int result = 1;
            if (n > 1) result = n * fact(n - 1);
            return result;
        }
        print(fact(5));
    ";
    assert_eq!(run(source), "120\n");
}

#[test]
fn test_argument_count_checked() {
    let source = "function int id(int x) { return x; }";
    assert_eq!(
        run_err(&format!("{source} print(id(1, 2));")),
        "Function id(int) expected 1 arguments but got 2."
    );
    assert_eq!(
        run_err(&format!("{source} print(id());")),
        "Function id(int) expected 1 arguments but got 0."
    );
}

#[test]
fn test_parameter_type_checked() {
    assert_eq!(
        run_err("function int id(int x) { return x; } print(id(\"a\"));"),
        "Cannot assign value of type: string to parameter of type: int. Are you missing a cast?"
    );
}

#[test]
fn test_void_function_in_expression_rejected() {
    let source = "
        function void shout() { print(\"hi\"); }
        int x = shout();
    ";
    assert_eq!(
        run_err(source),
        "Function shout is being invoked in an expression but does not have a return value."
    );
}

#[test]
fn test_statement_position_call_discards_value() {
    let source = "
        function int val() { return 1; }
        val();
        print(2);
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn test_return_type_enforced() {
    assert_eq!(
        run_err("function int bad() { return \"a\"; } print(bad());"),
        "Cannot return value of type string from a function with a return type of int"
    );
}

#[test]
fn test_void_function_with_return_rejected_at_call() {
    assert_eq!(
        run_err("function void f() { return 5; } f();"),
        "Cannot return a value from a void method."
    );
}

#[test]
fn test_nonvoid_function_requires_return() {
    assert_eq!(
        run_err("function int f() {}"),
        "Cannot set return type for function without return expression."
    );
}

#[test]
fn test_function_redefinition_rejected() {
    assert_eq!(
        run_err("function void f() {} function void f() {}"),
        "Function f already exists."
    );
}

#[test]
fn test_duplicate_parameter_rejected() {
    assert_eq!(
        run_err("function int f(int a, int a) { return a; }"),
        "Parameter a already exists in function f"
    );
}

#[test]
fn test_undefined_function_reported() {
    assert_eq!(run_err("f();"), "Function f is undefined.");
}

#[test]
fn test_calling_a_non_function_rejected() {
    assert_eq!(
        run_err("int x = 1; x();"),
        "Cannot invoke a value of type: int like a function."
    );
}

#[test]
fn test_lambdas_are_values() {
    let source = "
        func twice = function int (int x) { return x * 2; };
        print(twice(21));
    ";
    assert_eq!(run(source), "42\n");
}

#[test]
fn test_lambda_returned_from_function() {
    let source = "
        function func make() {
            return function int (int n) { return n + 1; };
        }
        func inc = make();
        print(inc(41));
    ";
    assert_eq!(run(source), "42\n");
}

// ====== Classes ====== //

#[test]
fn test_class_with_constructor_and_methods() {
    let source = "
        class Point {
            readonly int x;
            readonly int y;
            Point(int px, int py) {
                x = px;
                y = py;
            }
            function int getX() { return x; }
        }
        instance p = new Point(3, 4);
        print(p.getX());
        print(p.y);
    ";
    assert_eq!(run(source), "3\n4\n");
}

#[test]
fn test_readonly_field_locked_after_construction() {
    let source = "
        class Point {
            readonly int x;
            Point(int px) { x = px; }
        }
        instance p = new Point(3);
        p.x = 9;
    ";
    assert_eq!(
        run_err(source),
        "Cannot modify readonly variable value outside of constructor."
    );
}

#[test]
fn test_const_field_write_rejected() {
    let source = "
        class C { const int k = 1; }
        instance c = new C();
        c.k = 2;
    ";
    assert_eq!(run_err(source), "Cannot set the value of a constant variable");
}

#[test]
fn test_const_field_rejected_even_in_constructor() {
    let source = "
        class C {
            const int k = 1;
            C() { k = 2; }
        }
        instance c = new C();
    ";
    assert_eq!(run_err(source), "Cannot set the value of a constant variable");
}

#[test]
fn test_const_field_requires_initialiser() {
    assert_eq!(
        run_err("class C { const int k; }"),
        "Cannot declare a constant variable without a definition."
    );
}

#[test]
fn test_constructor_signature_must_match() {
    let source = "
        class Point {
            int x;
            Point(int px) { x = px; }
        }
        instance p = new Point(1.5);
    ";
    assert_eq!(
        run_err(source),
        "Could not find compatible constructor for class: Point."
    );
}

#[test]
fn test_constructor_name_must_match_class() {
    assert_eq!(
        run_err("class A { B() {} }"),
        "Constructor for: B is not valid in class: A. Are you missing a return type?"
    );
}

#[test]
fn test_second_constructor_rejected() {
    assert_eq!(
        run_err("class A { A() {} A(int x) {} }"),
        "Class A already has a constructor."
    );
}

#[test]
fn test_class_redefinition_rejected() {
    assert_eq!(run_err("class A {} class A {}"), "Class: A already exists.");
}

#[test]
fn test_unknown_class_reported() {
    assert_eq!(
        run_err("instance x = new Missing();"),
        "Class Missing could not be found."
    );
}

#[test]
fn test_instances_are_distinct() {
    let source = "
        class Box { int v; }
        instance a = new Box();
        instance b = new Box();
        a.v = 5;
        print(a.v);
        print(b.v);
    ";
    assert_eq!(run(source), "5\n0\n");
}

#[test]
fn test_method_reads_and_writes_fields() {
    let source = "
        class Counter {
            int n;
            function void bump() { n = n + 1; }
            function int value() { return n; }
        }
        instance c = new Counter();
        c.bump();
        c.bump();
        print(c.value());
    ";
    assert_eq!(run(source), "2\n");
}

#[test]
fn test_method_calls_sibling_method() {
    let source = "
        class Greeter {
            function string name() { return \"flint\"; }
            function string greet() { return \"hi \" + name(); }
        }
        instance g = new Greeter();
        print(g.greet());
    ";
    assert_eq!(run(source), "hi flint\n");
}

#[test]
fn test_nested_classes() {
    let source = "
        class Outer {
            class Inner {
                function int answer() { return 42; }
            }
        }
        instance i = new Outer.Inner();
        print(i.answer());
    ";
    assert_eq!(run(source), "42\n");
}

#[test]
fn test_function_valued_field_called() {
    let source = "
        class Holder {
            func op = function int (int n) { return n * 3; };
        }
        instance h = new Holder();
        print(h.op(7));
    ";
    assert_eq!(run(source), "21\n");
}

// ====== Interfaces ====== //

#[test]
fn test_interface_conformance() {
    let source = "
        interface Shape {
            int sides();
        }
        class Square implements Shape {
            function int sides() { return 4; }
        }
        instance s = new Square();
        print(s.sides());
    ";
    assert_eq!(run(source), "4\n");
}

#[test]
fn test_interface_violation_reported() {
    let source = "
        interface Shape {
            int sides();
        }
        class Blob implements Shape {}
    ";
    assert_eq!(
        run_err(source),
        "Class Blob does not implement interface Shape's sides function."
    );
}

#[test]
fn test_unknown_interface_reported() {
    assert_eq!(
        run_err("class A implements Missing {}"),
        "Interface Missing does not exist."
    );
}

// ====== Arrays ====== //

#[test]
fn test_arrays_store_values() {
    let source = "
        array a = new array(int, 3);
        a[0] = 7;
        print(a[0]);
        print(a[1]);
        print(a);
    ";
    assert_eq!(run(source), "7\n0\n[7, 0, 0]\n");
}

#[test]
fn test_array_bounds_checked() {
    assert_eq!(
        run_err("array a = new array(int, 4); print(a[9]);"),
        "Index '9' is out of bounds of the array. Array length is: 4"
    );
}

#[test]
fn test_array_element_type_checked() {
    assert_eq!(
        run_err("array a = new array(int, 2); a[0] = \"s\";"),
        "Cannot assign value of string to array of type int"
    );
}

#[test]
fn test_array_element_type_must_be_primitive() {
    assert_eq!(
        run_err("array a = new array(func, 2);"),
        "Cannot create an array of type func."
    );
}

#[test]
fn test_array_length_must_be_non_negative() {
    assert_eq!(
        run_err("array a = new array(int, -1);"),
        "Array length must be a non-negative int."
    );
}

#[test]
fn test_array_index_must_be_int() {
    assert_eq!(
        run_err("array a = new array(int, 2); print(a[true]);"),
        "Array index must be an int."
    );
}

#[test]
fn test_indexing_non_array_rejected() {
    assert_eq!(
        run_err("int x = 1; print(x[0]);"),
        "Cannot index a value of type int."
    );
}

// ====== Anonymous records ====== //

#[test]
fn test_anonymous_records() {
    let source = "
        anon r = anon { a = 1, b = \"x\" };
        print(r.a);
        print(r);
    ";
    assert_eq!(run(source), "1\n{a = 1, b = x}\n");
}

#[test]
fn test_anonymous_records_immutable() {
    assert_eq!(
        run_err("anon r = anon { a = 1 }; r.a = 2;"),
        "Cannot edit members of an anonymous type; members are immutable"
    );
}

#[test]
fn test_anonymous_record_missing_member() {
    assert_eq!(
        run_err("anon r = anon { a = 1 }; print(r.b);"),
        "Member variable does not exist."
    );
}

#[test]
fn test_member_access_on_primitive_rejected() {
    assert_eq!(
        run_err("int x = 1; print(x.y);"),
        "Cannot access member y on a value of type int."
    );
}

// ====== Increment and decrement ====== //

#[test]
fn test_increment_and_decrement() {
    let source = "
        int i = 5;
        print(i++);
        print(i);
        print(++i);
        print(--i);
    ";
    assert_eq!(run(source), "5\n6\n7\n6\n");
}

#[test]
fn test_increment_requires_integer() {
    assert_eq!(
        run_err("string s = \"a\"; s++;"),
        "Cannot apply operator '+' to values of type string and int. Are you missing a cast?"
    );
}

#[test]
fn test_increment_const_rejected() {
    assert_eq!(
        run_err("const int k = 1; k++;"),
        "Cannot re-assign to constant value."
    );
}

#[test]
fn test_increment_through_array_cell() {
    let source = "
        array a = new array(int, 1);
        a[0] = 4;
        a[0]++;
        print(a[0]);
    ";
    assert_eq!(run(source), "5\n");
}
