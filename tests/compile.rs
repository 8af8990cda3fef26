use klox_lang::{compile_source, emitter};

#[test]
fn compiles_a_full_program() {
    let source = "\
class A {
    greet() {
        print \"hi\";
    }
}
class B < A {
    greet() {
        super.greet();
        print \"!\";
    }
}
var b = B();
b.greet();
";

    let output = compile_source(source).unwrap();

    assert!(output.contains("#include \"klox_runtime.hpp\""));
    assert!(output.contains("Value A_1;"));
    assert!(output.contains("A_1 = make_class(\"A\", nullptr, A_1_methods);"));
    assert!(output.contains("Value B_1;"));
    assert!(output.contains("B_1 = make_class(\"B\", class_of(A_1), B_1_methods);"));
    assert!(output.contains("bind_super(A_1, this_2, \"greet\")->call({});"));
    assert!(output.contains("INSTANCE(b_1, as_callable(B_1)->call({}));"));
    assert!(output.contains("call_method(b_1_obj, \"greet\", {});"));
    assert!(output.contains("return 0;"));
}

#[test]
fn parse_errors_suppress_emission() {
    assert!(compile_source("var x;").is_none());
}

#[test]
fn resolve_errors_suppress_emission() {
    assert!(compile_source("return 1;").is_none());
}

#[test]
fn runtime_header_carries_the_contract() {
    let header = emitter::RUNTIME_HEADER;

    // The helpers the emitted code leans on.
    for needle in [
        "class Value",
        "struct Callable",
        "struct Function",
        "struct BoundMethod",
        "struct Class",
        "struct Instance",
        "inline Value add(",
        "inline Value divide(",
        "inline Value negate(",
        "inline Value notOp(",
        "inline bool isTruthy(",
        "#define PRINT(",
        "#define INSTANCE(",
    ] {
        assert!(header.contains(needle), "runtime header is missing {needle}");
    }

    // Both back ends fail division by zero the same way, and property gets
    // and sets keep their distinct messages.
    assert!(header.contains("Division by zero"));
    assert!(header.contains("Only instances have properties"));
    assert!(header.contains("Only instances have fields"));
}

#[test]
fn emitted_identifiers_never_collide_across_scopes() {
    let source = "\
{
    var value = 1;
    print value;
}
{
    var value = 2;
    print value;
}
fun value() {
    return 3;
}
print value();
";

    let output = compile_source(source).unwrap();

    assert!(output.contains("Value value_1 = Value(1);"));
    assert!(output.contains("Value value_2 = Value(2);"));
    assert!(output.contains("Value value_3 = make_function(0,"));
    assert!(output.contains("PRINT(as_callable(value_3)->call({}));"));
}
