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
    mlua::Value as LuaValue,
    runtime::{Engine, GuestKind, GuestObject, RuntimeError, Value},
};

use crate::common::engine;

// Installs the `watch` global: a table with weak values that lets the tests
// observe whether the guest collector freed an object.
fn watched(engine: &Engine) {
    engine
        .exec("watch = setmetatable({}, { __mode = 'v' })")
        .unwrap();
}

fn is_alive(engine: &Engine, name: &str) -> bool {
    let results = engine.eval(&format!("return watch.{name} ~= nil")).unwrap();

    results == vec![Value::Boolean(true)]
}

#[test]
fn test_single_wrapper_per_object() {
    let engine = Engine::new().unwrap();

    let results = engine.eval("pinned = {}; return pinned, pinned").unwrap();

    let [Value::Guest(first), Value::Guest(second)] = &results[..] else {
        panic!("two tables expected");
    };

    assert!(first.ptr_eq(second));
    assert_eq!(engine.tracked_objects(), 1);
    assert_eq!(engine.stats().created, 1);
    assert_eq!(engine.stats().reused, 1);

    drop(results);

    assert_eq!(engine.tracked_objects(), 1);

    assert_eq!(engine.collect_garbage().unwrap(), 1);
    assert_eq!(engine.tracked_objects(), 0);
    assert_eq!(engine.stats().reclaimed, 1);

    let third = engine.global("pinned").unwrap();

    assert_eq!(third.as_guest().map(GuestObject::kind), Some(GuestKind::Table));
    assert_eq!(engine.stats().created, 2);
    assert_eq!(engine.tracked_objects(), 1);
}

#[test]
fn test_wrapper_pins_guest_object() {
    let engine = Engine::new().unwrap();

    watched(&engine);

    let wrapper = engine
        .eval("local target = {}; watch.target = target; return target")
        .unwrap()
        .remove(0);

    for _ in 0..3 {
        assert_eq!(engine.collect_garbage().unwrap(), 0);
    }

    assert!(is_alive(&engine, "target"));

    drop(wrapper);

    assert_eq!(engine.collect_garbage().unwrap(), 1);
    assert_eq!(engine.tracked_objects(), 0);
    assert!(!is_alive(&engine, "target"));
}

#[test]
fn test_reclamation_without_explicit_collection() {
    let engine = Engine::new().unwrap();

    drop(engine.eval("return {}, function() end, coroutine.create(print)").unwrap());

    assert_eq!(engine.tracked_objects(), 3);

    // Allocation pressure alone drives the collector through full cycles.
    engine
        .exec("for i = 1, 200000 do local garbage = { i } end")
        .unwrap();

    assert_eq!(engine.tracked_objects(), 0);
    assert!(engine.stats().cycles > 0);
    assert!(engine.bridge().is_armed());
}

#[test]
fn test_guest_values_share_wrappers() {
    let engine = Engine::new().unwrap();

    let results = engine
        .eval("local t = { 10, 20, 30, name = 'list' }; return t, t")
        .unwrap();

    assert_eq!(results[0], results[1]);
    assert_eq!(engine.tracked_objects(), 1);

    let Value::Guest(GuestObject::Table(table)) = &results[0] else {
        panic!("table expected");
    };

    let lua = engine.lua();

    assert_eq!(table.len(lua).unwrap(), 3);

    assert_eq!(
        table.sequence(lua).unwrap(),
        vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)],
    );

    assert_eq!(table.pairs(lua).unwrap().len(), 4);

    table.set(lua, "answer", 42).unwrap();

    assert_eq!(table.get(lua, "answer").unwrap(), Value::Integer(42));
    assert_eq!(table.get(lua, "name").unwrap(), Value::from("list"));

    engine.set_global("shared", results[0].clone()).unwrap();

    assert_eq!(engine.eval("return shared.answer").unwrap(), vec![Value::Integer(42)]);
}

#[test]
fn test_guest_functions_and_threads() {
    let engine = Engine::new().unwrap();

    let results = engine
        .eval(
            r#"
            local add = function(a, b) return a + b end
            local counter = coroutine.create(function(step)
                local total = 0
                while true do
                    total = total + step
                    step = coroutine.yield(total)
                end
            end)
            return add, counter
            "#,
        )
        .unwrap();

    let [Value::Guest(GuestObject::Function(add)), Value::Guest(GuestObject::Thread(counter))] =
        &results[..]
    else {
        panic!("function and thread expected");
    };

    let lua = engine.lua();

    assert_eq!(
        add.call(lua, vec![Value::from(2), Value::from(3)]).unwrap(),
        vec![Value::Integer(5)],
    );

    assert_eq!(counter.resume(lua, vec![Value::from(2)]).unwrap(), vec![Value::Integer(2)]);
    assert_eq!(counter.resume(lua, vec![Value::from(5)]).unwrap(), vec![Value::Integer(7)]);
    assert!(counter.is_resumable(lua).unwrap());

    let error = add.call(lua, vec![Value::from(1), Value::Boolean(true)]).unwrap_err();

    assert!(matches!(error, RuntimeError::Guest { .. }));
}

#[test]
fn test_explicit_release() {
    let engine = Engine::new().unwrap();

    watched(&engine);

    let object = engine
        .eval("local target = {}; watch.target = target; return target")
        .unwrap()
        .remove(0);

    let Value::Guest(object) = object else {
        panic!("table expected");
    };

    let clone = object.clone();

    assert!(engine.release(&object).unwrap());
    assert!(!engine.release(&clone).unwrap());
    assert!(clone.is_released());
    assert_eq!(engine.tracked_objects(), 0);
    assert_eq!(engine.stats().released, 1);

    assert!(matches!(
        engine.push_guest_object(&clone),
        Err(RuntimeError::Released {
            kind: GuestKind::Table,
        }),
    ));

    assert!(matches!(
        engine.set_global("released", Value::Guest(clone.clone())),
        Err(RuntimeError::Released { .. }),
    ));

    let _ = engine.collect_garbage().unwrap();

    assert!(!is_alive(&engine, "target"));

    let fresh = engine.eval("return {}").unwrap().remove(0);

    let Value::Guest(fresh) = fresh else {
        panic!("table expected");
    };

    assert!(!fresh.ptr_eq(&object));
    assert!(!fresh.is_released());

    assert!(matches!(
        engine.push_guest_object(&fresh).unwrap(),
        LuaValue::Table(_),
    ));
}

#[test]
fn test_foreign_engine() {
    let owner = Engine::new().unwrap();
    let other = Engine::new().unwrap();

    let object = owner.eval("return { 1, 2, 3 }").unwrap().remove(0);

    let Value::Guest(guest) = &object else {
        panic!("table expected");
    };

    assert_ne!(owner.id(), other.id());
    assert_eq!(guest.engine(), owner.id());

    match other.push_guest_object(guest) {
        Err(RuntimeError::ForeignEngine {
            owner: object_owner,
            current,
        }) => {
            assert_eq!(object_owner, owner.id());
            assert_eq!(current, other.id());
        }

        result => panic!("unexpected result: {result:?}"),
    }

    let GuestObject::Table(table) = guest else {
        panic!("table expected");
    };

    assert!(matches!(
        table.get(other.lua(), 1),
        Err(RuntimeError::ForeignEngine { .. }),
    ));

    assert!(matches!(
        other.set_global("foreign", object.clone()),
        Err(RuntimeError::ForeignEngine { .. }),
    ));

    assert!(matches!(
        other.release(guest),
        Err(RuntimeError::ForeignEngine { .. }),
    ));

    assert!(!guest.is_released());
    assert_eq!(table.get(owner.lua(), 1).unwrap(), Value::Integer(1));
}

#[test]
fn test_host_held_function() {
    let engine = engine();

    watched(&engine);

    engine
        .exec(
            r#"
            widget = Widget(1)
            local handler = function(step) calls = (calls or 0) + step end
            watch.handler = handler
            widget.Clicked:add(handler)
            "#,
        )
        .unwrap();

    let _ = engine.collect_garbage().unwrap();
    let _ = engine.collect_garbage().unwrap();

    assert!(is_alive(&engine, "handler"));

    engine.exec("widget:click(2)").unwrap();

    assert_eq!(engine.global("calls").unwrap(), Value::Integer(2));

    engine.exec("widget.Clicked:remove(watch.handler)").unwrap();

    let _ = engine.collect_garbage().unwrap();

    assert!(!is_alive(&engine, "handler"));
}
