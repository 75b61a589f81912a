////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

mod common;

use moonbridge::{
    exports::{HostArray, PendingGenericCall},
    runtime::{RuntimeError, TypeHint, Value},
};

use crate::common::{construct, engine};

#[test]
fn test_counter_scenario() {
    let engine = engine();

    let results = engine
        .eval(
            r#"
            local counter = Counter()
            counter.value = 5
            local result = counter:increment(3)
            return result, counter.value
            "#,
        )
        .unwrap();

    assert_eq!(results, vec![Value::Integer(8), Value::Integer(8)]);

    let counter = construct(&engine, "Counter", vec![]);

    engine.set_index(&counter, "value", 5).unwrap();

    let result = engine
        .method_call(&counter, "increment", vec![Value::from(3)])
        .unwrap();

    assert_eq!(result, vec![Value::Integer(8)]);
    assert_eq!(engine.index(&counter, "value").unwrap(), Value::Integer(8));
}

#[test]
fn test_constructor_resolution() {
    let engine = engine();

    assert_eq!(
        engine.eval("return Point(1, 2).y").unwrap(),
        vec![Value::Integer(2)],
    );

    let error = engine.exec("local point = Point(1)").unwrap_err();

    match error {
        RuntimeError::NoMatchingOverload {
            receiver_type,
            member,
            arguments,
        } => {
            assert_eq!(receiver_type, "Point");
            assert!(member.is_empty());
            assert_eq!(arguments, vec!["integer"]);
        }

        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_guest_catches_host_errors() {
    let engine = engine();

    let results = engine
        .eval("local ok, message = pcall(Point, 1); return ok, tostring(message)")
        .unwrap();

    assert_eq!(results[0], Value::Boolean(false));

    let message = results[1].as_str().unwrap_or_default();

    assert!(message.contains("Point"), "{message}");
}

#[test]
fn test_overload_selection() {
    let engine = engine();

    let results = engine
        .eval(
            r#"
            local widget = Widget(1)
            local results = {}
            for _ = 1, 2 do
                table.insert(results, widget:describe(3))
                table.insert(results, widget:describe(2.5))
                table.insert(results, widget:describe("text"))
            end
            return table.unpack(results)
            "#,
        )
        .unwrap();

    assert_eq!(
        results,
        ["integer", "number", "string", "integer", "number", "string"]
            .into_iter()
            .map(Value::from)
            .collect::<Vec<_>>(),
    );

    assert!(matches!(
        engine.exec("Widget(1):describe(true)"),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));
}

#[test]
fn test_colon_and_dot_calls() {
    let engine = engine();

    let results = engine
        .eval(
            r#"
            local widget = Widget(1)
            local describe = widget.describe
            return widget:describe(1), widget.describe(widget, 1), describe(widget, 2.5)
            "#,
        )
        .unwrap();

    assert_eq!(
        results,
        vec![Value::from("integer"), Value::from("integer"), Value::from("number")],
    );

    assert!(matches!(
        engine.exec("local widget = Widget(1); widget.describe(1)"),
        Err(RuntimeError::TypeMismatch { .. }),
    ));

    assert!(matches!(
        engine.exec("local widget = Widget(1); widget.describe(Counter(), 1)"),
        Err(RuntimeError::TypeMismatch { .. }),
    ));

    let results = engine
        .eval("local widget = Widget.create(); return widget.id")
        .unwrap();

    assert_eq!(results, vec![Value::Integer(0)]);
}

#[test]
fn test_optional_parameters() {
    let engine = engine();

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);

    assert_eq!(
        engine.method_call(&widget, "scale", vec![Value::from(4)]).unwrap(),
        vec![Value::Integer(8)],
    );

    assert_eq!(
        engine
            .method_call(&widget, "scale", vec![Value::from(4), Value::from(3)])
            .unwrap(),
        vec![Value::Integer(12)],
    );

    assert!(matches!(
        engine.method_call(
            &widget,
            "scale",
            vec![Value::from(4), Value::from(3), Value::from(2)],
        ),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));
}

#[test]
fn test_output_parameters() {
    let engine = engine();

    let results = engine
        .eval(
            r#"
            local widget = Widget(1)
            local parsed, value = widget:tryParse("42")
            local failed, missing = widget:tryParse("forty")
            local a, b = widget:swap(1, 2)
            return parsed, value, failed, missing, a, b
            "#,
        )
        .unwrap();

    assert_eq!(
        results,
        vec![
            Value::Boolean(true),
            Value::Integer(42),
            Value::Boolean(false),
            Value::Nil,
            Value::Integer(2),
            Value::Integer(1),
        ],
    );
}

#[test]
fn test_variadic_capture() {
    let engine = engine();

    let results = engine
        .eval(
            r#"
            local widget = Widget(1)
            return widget:sum(), widget:sum(5), widget:sum(1, 2, 3)
            "#,
        )
        .unwrap();

    assert_eq!(
        results,
        vec![Value::Integer(0), Value::Integer(5), Value::Integer(6)],
    );

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);

    let array = Value::host(HostArray::from_values(
        TypeHint::I64,
        vec![Value::Integer(4), Value::Integer(6)],
    ));

    assert_eq!(
        engine.method_call(&widget, "sum", vec![array]).unwrap(),
        vec![Value::Integer(10)],
    );

    assert!(matches!(
        engine.method_call(&widget, "sum", vec![Value::from(1), Value::from("x")]),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));
}

#[test]
fn test_pending_generic_call() {
    let engine = engine();

    engine.register_type::<i64>().unwrap();
    engine.set_global("String", Value::type_of::<String>()).unwrap();

    let pending = engine
        .eval("widget = Widget(1); return widget:convert(2.75)")
        .unwrap()
        .remove(0);

    assert!(pending
        .as_object()
        .map(|object| object.is::<PendingGenericCall>())
        .unwrap_or(false));

    assert_eq!(
        engine.call(&pending, vec![Value::type_of::<i64>()]).unwrap(),
        vec![Value::Integer(2)],
    );

    assert_eq!(
        engine.eval("return widget:convert(2.75)(String)").unwrap(),
        vec![Value::from("2.75")],
    );

    assert!(matches!(
        engine.call(&pending, vec![Value::from(1)]),
        Err(RuntimeError::TypeMismatch { .. }),
    ));
}

#[test]
fn test_explicit_type_arguments() {
    let engine = engine();

    engine.register_type::<i64>().unwrap();

    let results = engine
        .eval(
            r#"
            local widget = Widget(1)
            return widget.convert[i64](widget, 7.5)
            "#,
        )
        .unwrap();

    assert_eq!(results, vec![Value::Integer(7)]);

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);

    let convert = engine.index(&widget, "convert").unwrap();
    let bound = engine.index(&convert, Value::type_of::<i64>()).unwrap();

    assert_eq!(
        engine.call(&bound, vec![widget.clone(), Value::from(7.5)]).unwrap(),
        vec![Value::Integer(7)],
    );

    assert!(matches!(
        engine.call(&bound, vec![widget]),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));
}

#[test]
fn test_generic_type_instantiation() {
    let engine = engine();

    engine.register_type::<i64>().unwrap();
    engine.set_global("String", Value::type_of::<String>()).unwrap();

    let results = engine
        .eval(
            r#"
            local IntPair = Pair(i64, i64)
            local pair = IntPair(1, 2)
            return tostring(IntPair), pair.first, pair.second
            "#,
        )
        .unwrap();

    assert_eq!(
        results,
        vec![
            Value::from("type Pair<i64, i64>"),
            Value::Integer(1),
            Value::Integer(2),
        ],
    );

    assert!(matches!(
        engine.exec("local IntPair = Pair(i64)"),
        Err(RuntimeError::GenericArity {
            expected: 2,
            actual: 1,
            ..
        }),
    ));

    assert!(matches!(
        engine.exec("local Mixed = Pair(i64, String)"),
        Err(RuntimeError::GenericInstantiation { .. }),
    ));
}

#[test]
fn test_callable_instances() {
    let engine = engine();

    assert_eq!(
        engine.eval("local triple = Multiplier(3); return triple(5)").unwrap(),
        vec![Value::Integer(15)],
    );

    assert!(matches!(
        engine.exec("local counter = Counter(); counter()"),
        Err(RuntimeError::NotCallable { .. }),
    ));
}
