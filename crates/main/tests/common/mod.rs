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

#![allow(dead_code)]

use moonbridge::{
    runtime::{
        ops::Operator,
        Engine,
        HostObject,
        HostType,
        LuaFunction,
        RuntimeError,
        RuntimeResult,
        Signature,
        TypeBuilder,
        TypeHint,
        TypeKey,
        Upcast,
        Value,
    },
};

pub struct Counter {
    pub value: i64,
}

impl HostType for Counter {
    const NAME: &'static str = "Counter";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.constructor(Signature::new(), |_| Ok(Value::host(Counter { value: 0 })));

        let _ = ty.field(
            "value",
            |this: &Counter| this.value,
            |this: &mut Counter, value: i64| this.value = value,
        );

        let _ = ty.method(
            "increment",
            Signature::new().param::<i64>("n").returns::<i64>(),
            |invocation| {
                let n = invocation.argument::<i64>(0)?;

                invocation
                    .with_receiver_mut(|this: &mut Counter| {
                        this.value += n;
                        this.value
                    })?
                    .upcast()
            },
        );
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl HostType for Point {
    const NAME: &'static str = "Point";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.value_type();

        let _ = ty.constructor(
            Signature::new().param::<i64>("x").param::<i64>("y"),
            |invocation| {
                let x = invocation.argument::<i64>(0)?;
                let y = invocation.argument::<i64>(1)?;

                Ok(Value::host(Point { x, y }))
            },
        );

        let _ = ty.readonly_field("x", |this: &Point| this.x);

        let _ = ty.readonly_field("y", |this: &Point| this.y);

        let _ = ty.operator(
            Operator::Addition,
            Signature::new()
                .param_hint("lhs", TypeHint::Host(Point::type_key()))
                .param_hint("rhs", TypeHint::Host(Point::type_key()))
                .returns::<Value>(),
            |invocation| {
                let lhs = point_of(&invocation.value(0))?;
                let rhs = point_of(&invocation.value(1))?;

                Ok(Value::host(Point {
                    x: lhs.x + rhs.x,
                    y: lhs.y + rhs.y,
                }))
            },
        );

        let _ = ty.operator(
            Operator::Equality,
            Signature::new()
                .param_hint("lhs", TypeHint::Host(Point::type_key()))
                .param_hint("rhs", TypeHint::Host(Point::type_key()))
                .returns::<bool>(),
            |invocation| {
                let lhs = point_of(&invocation.value(0))?;
                let rhs = point_of(&invocation.value(1))?;

                Ok(Value::Boolean(lhs == rhs))
            },
        );

        let _ = ty.display(|this| format!("({}, {})", this.x, this.y));
    }
}

pub fn point_of(value: &Value) -> RuntimeResult<Point> {
    match value.as_object() {
        Some(object) => object.read(|point: &Point| *point),
        None => Err(RuntimeError::TypeMismatch {
            expected: String::from("Point"),
            actual: value.type_name(),
        }),
    }
}

pub struct Animal {
    pub name: String,
}

impl HostType for Animal {
    const NAME: &'static str = "Animal";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.field(
            "name",
            |this: &Animal| this.name.clone(),
            |this: &mut Animal, name: String| this.name = name,
        );

        let _ = ty.method(
            "speak",
            Signature::new().returns::<String>(),
            |_| Ok(Value::from("...")),
        );

        let _ = ty.method(
            "introduce",
            Signature::new().returns::<String>(),
            |invocation| {
                invocation
                    .with_receiver(|this: &Animal| format!("I am {}", this.name))?
                    .upcast()
            },
        );

        let _ = ty.display(|this| format!("animal {}", this.name));
    }
}

pub struct Dog {
    pub animal: Animal,
    pub tricks: i64,
}

impl HostType for Dog {
    const NAME: &'static str = "Dog";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.base::<Animal>(|this| &this.animal, |this| &mut this.animal);

        let _ = ty.constructor(Signature::new().param::<String>("name"), |invocation| {
            let name = invocation.argument::<String>(0)?;

            Ok(Value::host(Dog {
                animal: Animal { name },
                tricks: 0,
            }))
        });

        let _ = ty.field(
            "tricks",
            |this: &Dog| this.tricks,
            |this: &mut Dog, tricks: i64| this.tricks = tricks,
        );

        let _ = ty.method(
            "speak",
            Signature::new().returns::<String>(),
            |_| Ok(Value::from("woof")),
        );
    }
}

/// A type exercising most member kinds.
pub struct Widget {
    pub id: i64,
    pub items: Vec<i64>,
    pub handlers: Vec<LuaFunction>,
}

impl Widget {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            items: vec![10, 20, 30],
            handlers: Vec::new(),
        }
    }
}

impl HostType for Widget {
    const NAME: &'static str = "Widget";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.constructor(Signature::new().param::<i64>("id"), |invocation| {
            Ok(Value::host(Widget::new(invocation.argument::<i64>(0)?)))
        });

        let _ = ty.readonly_field("id", |this: &Widget| this.id);

        let _ = ty.constant("Version", || 3i64);

        let _ = ty.nested::<Point>();

        let _ = ty.method(
            "describe",
            Signature::new().param::<i64>("value").returns::<String>(),
            |_| Ok(Value::from("integer")),
        );

        let _ = ty.method(
            "describe",
            Signature::new().param::<f64>("value").returns::<String>(),
            |_| Ok(Value::from("number")),
        );

        let _ = ty.method(
            "describe",
            Signature::new().param::<String>("value").returns::<String>(),
            |_| Ok(Value::from("string")),
        );

        let _ = ty.method(
            "scale",
            Signature::new()
                .param::<i64>("value")
                .optional::<i64>("factor", || Value::Integer(2))
                .returns::<i64>(),
            |invocation| {
                let value = invocation.argument::<i64>(0)?;
                let factor = invocation.argument::<i64>(1)?;

                (value * factor).upcast()
            },
        );

        let _ = ty.method(
            "tryParse",
            Signature::new()
                .param::<String>("text")
                .out::<i64>("result")
                .returns::<bool>(),
            |invocation| {
                let text = invocation.argument::<String>(0)?;

                match text.parse::<i64>() {
                    Ok(number) => {
                        invocation.set_output(1, number)?;

                        Ok(Value::Boolean(true))
                    }

                    Err(_) => Ok(Value::Boolean(false)),
                }
            },
        );

        let _ = ty.method(
            "swap",
            Signature::new().by_ref::<i64>("a").by_ref::<i64>("b"),
            |invocation| {
                let a = invocation.argument::<i64>(0)?;
                let b = invocation.argument::<i64>(1)?;

                invocation.set_output(0, b)?;
                invocation.set_output(1, a)?;

                Ok(Value::Nil)
            },
        );

        let _ = ty.method(
            "sum",
            Signature::new().variadic::<i64>("values").returns::<i64>(),
            |invocation| {
                let values = invocation.argument::<Vec<i64>>(0)?;

                values.iter().sum::<i64>().upcast()
            },
        );

        let _ = ty.method(
            "convert",
            Signature::new()
                .param_hint("value", TypeHint::Any)
                .returns::<Value>()
                .generic(1),
            |invocation| {
                let value = invocation.value(0);

                let Some(target) = invocation.type_arguments().first().copied() else {
                    return Ok(Value::Nil);
                };

                if target.is::<String>() {
                    return Ok(Value::from(format!("{value:?}")));
                }

                if target.is::<i64>() {
                    return match value.as_number() {
                        Some(number) => Ok(Value::Integer(number as i64)),
                        None => Ok(Value::Nil),
                    };
                }

                Ok(Value::Nil)
            },
        );

        let _ = ty.indexed_property(
            "Items",
            Signature::new().param::<i64>("index"),
            TypeHint::I64,
            Widget::get_item,
            Widget::set_item,
        );

        let _ = ty.readonly_indexed_property(
            "Item",
            Signature::new().param::<i64>("index"),
            TypeHint::I64,
            Widget::get_item,
        );

        let _ = ty.event(
            "Clicked",
            |this: &mut Widget, handler| this.handlers.push(handler),
            |this: &mut Widget, handler| this.handlers.retain(|other| other != handler),
        );

        let _ = ty.method(
            "click",
            Signature::new().param::<i64>("times"),
            |invocation| {
                let times = invocation.argument::<i64>(0)?;
                let handlers = invocation.with_receiver(|this: &Widget| this.handlers.clone())?;

                for handler in handlers {
                    let _ = handler.call(invocation.lua(), vec![Value::Integer(times)])?;
                }

                Ok(Value::Nil)
            },
        );

        let _ = ty.method("explode", Signature::new(), |_| {
            panic!("widget exploded");
        });

        let _ = ty.static_method(
            "create",
            Signature::new().returns::<HostObject>(),
            |_| Ok(Value::host(Widget::new(0))),
        );
    }
}

impl Widget {
    fn get_item(invocation: &mut moonbridge::runtime::Invocation<'_>) -> RuntimeResult<Value> {
        let index = invocation.argument::<i64>(0)?;

        let item = invocation.with_receiver(|this: &Widget| {
            usize::try_from(index)
                .ok()
                .and_then(|index| this.items.get(index).copied())
        })?;

        match item {
            Some(item) => Ok(Value::Integer(item)),

            None => Err(RuntimeError::OutOfBounds {
                index,
                length: invocation.with_receiver(|this: &Widget| this.items.len())?,
            }),
        }
    }

    fn set_item(invocation: &mut moonbridge::runtime::Invocation<'_>) -> RuntimeResult<Value> {
        let index = invocation.argument::<i64>(0)?;
        let value = invocation.argument::<i64>(1)?;

        let stored = invocation.with_receiver_mut(|this: &mut Widget| {
            match usize::try_from(index).ok().and_then(|index| this.items.get_mut(index)) {
                Some(slot) => {
                    *slot = value;
                    true
                }

                None => false,
            }
        })?;

        match stored {
            true => Ok(Value::Nil),

            false => Err(RuntimeError::OutOfBounds {
                index,
                length: invocation.with_receiver(|this: &Widget| this.items.len())?,
            }),
        }
    }
}

pub struct PairDefinition;

impl HostType for PairDefinition {
    const NAME: &'static str = "Pair";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.generic(2, |arguments| {
            match arguments.iter().all(|argument| argument.is::<i64>()) {
                true => Some(TypeKey::of::<IntPair>()),
                false => None,
            }
        });
    }
}

pub struct IntPair {
    pub first: i64,
    pub second: i64,
}

impl HostType for IntPair {
    const NAME: &'static str = "Pair<i64, i64>";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.constructor(
            Signature::new().param::<i64>("first").param::<i64>("second"),
            |invocation| {
                Ok(Value::host(IntPair {
                    first: invocation.argument::<i64>(0)?,
                    second: invocation.argument::<i64>(1)?,
                }))
            },
        );

        let _ = ty.readonly_field("first", |this: &IntPair| this.first);

        let _ = ty.readonly_field("second", |this: &IntPair| this.second);
    }
}

pub struct Multiplier {
    pub factor: i64,
}

impl HostType for Multiplier {
    const NAME: &'static str = "Multiplier";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.constructor(Signature::new().param::<i64>("factor"), |invocation| {
            Ok(Value::host(Multiplier {
                factor: invocation.argument::<i64>(0)?,
            }))
        });

        let _ = ty.invoke(|_lua, object, arguments| {
            let factor = object.read(|this: &Multiplier| this.factor)?;
            let value = arguments.first().and_then(Value::as_integer).unwrap_or_default();

            Ok(vec![Value::Integer(value * factor)])
        });
    }
}

/// Creates an engine with all sample types registered as globals.
pub fn engine() -> Engine {
    let engine = Engine::new().unwrap();

    engine.register_type::<Counter>().unwrap();
    engine.register_type::<Point>().unwrap();
    engine.register_type::<Dog>().unwrap();
    engine.register_type::<Widget>().unwrap();
    engine.register_type::<PairDefinition>().unwrap();
    engine.register_type::<Multiplier>().unwrap();

    engine
}

/// Calls the registered type `name` with the arguments and returns the
/// first result.
pub fn construct(engine: &Engine, name: &str, arguments: Vec<Value>) -> Value {
    let ty = engine.global(name).unwrap();

    engine.call(&ty, arguments).unwrap().remove(0)
}

/// Creates a guest function that adds its argument (or one) to the `calls`
/// global.
pub fn recording_function(engine: &Engine) -> Value {
    engine
        .eval("return function(step) calls = (calls or 0) + (step or 1) end")
        .unwrap()
        .remove(0)
}
