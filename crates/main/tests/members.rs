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

use moonbridge::runtime::{RuntimeError, Scope, Value};

use crate::common::{construct, engine, recording_function};

#[test]
fn test_unknown_member_suggestion() {
    let engine = engine();

    let counter = construct(&engine, "Counter", vec![]);

    match engine.index(&counter, "vaule").unwrap_err() {
        RuntimeError::UnknownMember {
            receiver_type,
            scope,
            member,
            suggestion,
        } => {
            assert_eq!(receiver_type, "Counter");
            assert_eq!(scope, Scope::Instance);
            assert_eq!(member, "vaule");
            assert_eq!(suggestion.as_deref(), Some("value"));
        }

        other => panic!("unexpected error: {other}"),
    }

    let message = engine
        .eval(
            r#"
            local ok, message = pcall(function() return Counter().vaule end)
            return tostring(message)
            "#,
        )
        .unwrap()
        .remove(0);

    assert!(message.as_str().unwrap_or_default().contains("value"));

    let widget_type = engine.global("Widget").unwrap();

    assert!(matches!(
        engine.index(&widget_type, "id"),
        Err(RuntimeError::UnknownMember {
            scope: Scope::Static,
            ..
        }),
    ));
}

#[test]
fn test_member_writes() {
    let engine = engine();

    let widget = construct(&engine, "Widget", vec![Value::from(7)]);

    assert_eq!(engine.index(&widget, "id").unwrap(), Value::Integer(7));

    assert!(matches!(
        engine.set_index(&widget, "id", 8),
        Err(RuntimeError::ReadOnly { .. }),
    ));

    assert!(matches!(
        engine.set_index(&widget, "describe", 8),
        Err(RuntimeError::NotAssignable { kind: "method", .. }),
    ));

    let widget_type = engine.global("Widget").unwrap();

    assert!(matches!(
        engine.set_index(&widget_type, "Point", 8),
        Err(RuntimeError::NotAssignable {
            kind: "nested type",
            ..
        }),
    ));

    let counter = construct(&engine, "Counter", vec![]);

    assert!(matches!(
        engine.set_index(&counter, "value", "text"),
        Err(RuntimeError::TypeMismatch { .. }),
    ));

    engine.set_index(&counter, "value", 3).unwrap();

    assert_eq!(engine.index(&counter, "value").unwrap(), Value::Integer(3));
}

#[test]
fn test_inheritance() {
    let engine = engine();

    let dog = construct(&engine, "Dog", vec![Value::from("Rex")]);

    assert_eq!(engine.index(&dog, "name").unwrap(), Value::from("Rex"));

    engine.set_index(&dog, "name", "Max").unwrap();
    engine.set_index(&dog, "tricks", 2).unwrap();

    assert_eq!(
        engine.method_call(&dog, "introduce", vec![]).unwrap(),
        vec![Value::from("I am Max")],
    );

    assert_eq!(
        engine.method_call(&dog, "speak", vec![]).unwrap(),
        vec![Value::from("woof")],
    );

    assert_eq!(engine.index(&dog, "tricks").unwrap(), Value::Integer(2));
    assert_eq!(engine.to_display(&dog).unwrap(), "animal Max");

    let results = engine
        .eval(
            r#"
            local dog = Dog("Rex")
            dog.name = "Bo"
            return dog:introduce(), dog:speak(), tostring(dog)
            "#,
        )
        .unwrap();

    assert_eq!(
        results,
        vec![Value::from("I am Bo"), Value::from("woof"), Value::from("animal Bo")],
    );
}

#[test]
fn test_named_indexed_property() {
    let engine = engine();

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);
    let items = engine.index(&widget, "Items").unwrap();

    assert_eq!(
        engine.method_call(&items, "get", vec![Value::from(1)]).unwrap(),
        vec![Value::Integer(20)],
    );

    assert_eq!(
        engine
            .method_call(&items, "set", vec![Value::from(1), Value::from(99)])
            .unwrap(),
        vec![],
    );

    assert_eq!(engine.index(&items, 1).unwrap(), Value::Integer(99));

    engine.set_index(&items, 2, 33).unwrap();

    assert_eq!(engine.index(&items, 2).unwrap(), Value::Integer(33));

    assert!(matches!(
        engine.method_call(&items, "get", vec![Value::from(7)]),
        Err(RuntimeError::OutOfBounds { index: 7, length: 3 }),
    ));

    assert!(matches!(
        engine.method_call(&items, "get", vec![Value::from("first")]),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));
}

#[test]
fn test_default_indexer() {
    let engine = engine();

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);

    assert_eq!(engine.index(&widget, 0).unwrap(), Value::Integer(10));
    assert_eq!(engine.index(&widget, 2).unwrap(), Value::Integer(30));

    assert!(matches!(
        engine.index(&widget, 3),
        Err(RuntimeError::OutOfBounds { index: 3, length: 3 }),
    ));

    assert!(matches!(
        engine.set_index(&widget, 0, 1),
        Err(RuntimeError::ReadOnly { .. }),
    ));

    let counter = construct(&engine, "Counter", vec![]);

    assert!(matches!(
        engine.index(&counter, 0),
        Err(RuntimeError::InvalidKey {
            receiver_type: "Counter",
            key: "integer",
        }),
    ));
}

#[test]
fn test_event_subscription() {
    let engine = engine();

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);
    let clicked = engine.index(&widget, "Clicked").unwrap();

    let handler = recording_function(&engine);

    let _ = engine
        .method_call(&clicked, "add", vec![handler.clone()])
        .unwrap();

    let _ = engine
        .method_call(&widget, "click", vec![Value::from(3)])
        .unwrap();

    assert_eq!(engine.global("calls").unwrap(), Value::Integer(3));

    let _ = engine.method_call(&clicked, "remove", vec![handler]).unwrap();

    let _ = engine
        .method_call(&widget, "click", vec![Value::from(5)])
        .unwrap();

    assert_eq!(engine.global("calls").unwrap(), Value::Integer(3));

    assert!(matches!(
        engine.method_call(&clicked, "add", vec![Value::from(1)]),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));

    let results = engine
        .eval(
            r#"
            local widget = Widget(2)
            local log = {}
            local function first(times) table.insert(log, "first " .. times) end
            local function second(times) table.insert(log, "second " .. times) end
            widget.Clicked:add(first)
            widget.Clicked:add(second)
            widget:click(1)
            widget.Clicked:remove(first)
            widget:click(2)
            return table.concat(log, ", ")
            "#,
        )
        .unwrap();

    assert_eq!(results, vec![Value::from("first 1, second 1, second 2")]);
}

#[test]
fn test_host_panic() {
    let engine = engine();

    let widget = construct(&engine, "Widget", vec![Value::from(1)]);

    match engine.method_call(&widget, "explode", vec![]).unwrap_err() {
        RuntimeError::HostPanic {
            receiver_type,
            member,
            message,
        } => {
            assert_eq!(receiver_type, "Widget");
            assert_eq!(member, "explode");
            assert_eq!(message, "widget exploded");
        }

        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(
        engine
            .method_call(&widget, "describe", vec![Value::from(1)])
            .unwrap(),
        vec![Value::from("integer")],
    );
}

#[test]
fn test_static_scope() {
    let engine = engine();

    let widget_type = engine.global("Widget").unwrap();

    assert_eq!(engine.index(&widget_type, "Version").unwrap(), Value::Integer(3));

    let point_type = engine.index(&widget_type, "Point").unwrap();

    let point = engine
        .call(&point_type, vec![Value::from(4), Value::from(5)])
        .unwrap()
        .remove(0);

    assert_eq!(engine.to_display(&point).unwrap(), "(4, 5)");

    let create = engine.index(&widget_type, "create").unwrap();
    let created = engine.call(&create, vec![]).unwrap();

    assert_eq!(created.len(), 1);
    assert_eq!(engine.index(&created[0], "id").unwrap(), Value::Integer(0));

    let results = engine
        .eval("return Widget.Version, tostring(Widget.Point(1, 2)), Widget.create().id")
        .unwrap();

    assert_eq!(
        results,
        vec![Value::Integer(3), Value::from("(1, 2)"), Value::Integer(0)],
    );

    // Static methods take no receiver, so the type becomes a surplus argument.
    assert!(matches!(
        engine.exec("local widget = Widget:create()"),
        Err(RuntimeError::NoMatchingOverload { .. }),
    ));
}
