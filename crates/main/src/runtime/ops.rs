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

use std::fmt::{Display, Formatter};

use mlua::{Error as LuaError, Lua, MultiValue, Result as LuaResult, Value as LuaValue};

use crate::{
    exports::HostArray,
    runtime::{
        guest::to_lua_all,
        invoke::resolve_and_invoke,
        object::load_entity,
        HostEntity,
        HostObject,
        RuntimeError,
        Value,
    },
};

/// An overloadable operator.
///
/// A host type overloads an operator by declaring a static method with the
/// conventional name returned by [Operator::method_name]. The guest reaches
/// the overload through the corresponding metamethod of the type's instances.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operator {
    Addition,
    Subtraction,
    Multiply,
    Division,
    Modulus,
    UnaryNegation,
    Equality,
    LessThan,
    LessThanOrEqual,
}

impl Display for Operator {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Addition => "addition",
            Self::Subtraction => "subtraction",
            Self::Multiply => "multiplication",
            Self::Division => "division",
            Self::Modulus => "modulus",
            Self::UnaryNegation => "negation",
            Self::Equality => "equality",
            Self::LessThan => "less-than comparison",
            Self::LessThanOrEqual => "less-or-equal comparison",
        };

        formatter.write_str(name)
    }
}

impl Operator {
    pub const ALL: [Self; 9] = [
        Self::Addition,
        Self::Subtraction,
        Self::Multiply,
        Self::Division,
        Self::Modulus,
        Self::UnaryNegation,
        Self::Equality,
        Self::LessThan,
        Self::LessThanOrEqual,
    ];

    /// The name of the static method implementing this operator.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Addition => "op_Addition",
            Self::Subtraction => "op_Subtraction",
            Self::Multiply => "op_Multiply",
            Self::Division => "op_Division",
            Self::Modulus => "op_Modulus",
            Self::UnaryNegation => "op_UnaryNegation",
            Self::Equality => "op_Equality",
            Self::LessThan => "op_LessThan",
            Self::LessThanOrEqual => "op_LessThanOrEqual",
        }
    }

    /// Returns the operator implemented by a static method with this name.
    pub fn from_method_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|operator| operator.method_name() == name)
    }

    /// The metamethod of the guest protocol.
    pub fn event(&self) -> &'static str {
        match self {
            Self::Addition => "__add",
            Self::Subtraction => "__sub",
            Self::Multiply => "__mul",
            Self::Division => "__div",
            Self::Modulus => "__mod",
            Self::UnaryNegation => "__unm",
            Self::Equality => "__eq",
            Self::LessThan => "__lt",
            Self::LessThanOrEqual => "__le",
        }
    }

    #[inline(always)]
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::UnaryNegation)
    }

    #[inline(always)]
    pub fn is_comparison(&self) -> bool {
        matches!(self, Self::Equality | Self::LessThan | Self::LessThanOrEqual)
    }
}

/// Handles an operator metamethod of host objects.
///
/// Either operand may be the host object: the guest consults the right-hand
/// operand's metatable when the left-hand one does not define the event. The
/// overload is looked up in the type of the first operand that is a host
/// object.
pub(crate) fn dispatch(
    lua: &Lua,
    operator: Operator,
    arguments: MultiValue,
) -> LuaResult<MultiValue> {
    let arity = match operator.is_unary() {
        true => 1,
        false => 2,
    };

    let mut operands = Vec::with_capacity(arity);

    for argument in arguments.into_iter().take(arity) {
        operands.push(Value::load(lua, argument)?);
    }

    let key = operands
        .iter()
        .find_map(|operand| operand.as_object().map(HostObject::ty));

    let group = key.and_then(|key| key.binding().operator(operator).map(|group| (key, group)));

    let result = match group {
        Some((key, group)) => {
            let results = resolve_and_invoke(lua, key, group, None, operands, &[])?;

            results.into_iter().next().unwrap_or_default()
        }

        None if operator == Operator::Equality => {
            let equal = match (operands.first(), operands.get(1)) {
                (Some(lhs), Some(rhs)) => lhs == rhs,
                _ => false,
            };

            Value::Boolean(equal)
        }

        None => {
            let receiver_type = match key {
                Some(key) => key.name(),
                None => "type",
            };

            return Err(LuaError::from(RuntimeError::UndefinedOperator {
                receiver_type,
                operator,
            }));
        }
    };

    let result = match operator.is_comparison() {
        true => Value::Boolean(!matches!(result, Value::Nil | Value::Boolean(false))),
        false => result,
    };

    Ok(to_lua_all(lua, vec![result])?)
}

/// Handles the `__len` metamethod of arrays.
pub(crate) fn length(_lua: &Lua, arguments: MultiValue) -> LuaResult<MultiValue> {
    let target = arguments.into_iter().next().unwrap_or(LuaValue::Nil);

    let object = match load_entity(&target) {
        Some(HostEntity::Object(object)) if object.is::<HostArray>() => object,

        _ => {
            return Err(LuaError::RuntimeError(format!(
                "attempt to get length of a {} value",
                target.type_name(),
            )))
        }
    };

    let length = object.read(|array: &HostArray| array.len())?;

    Ok(MultiValue::from_vec(vec![LuaValue::Integer(length as i64)]))
}

/// Handles the `__tostring` metamethod.
///
/// Uses the display function of the type (or of its closest ancestor that
/// declares one). Types without a display function render as
/// `Name: 0xADDRESS`.
pub(crate) fn display(lua: &Lua, arguments: MultiValue) -> LuaResult<MultiValue> {
    let target = arguments.into_iter().next().unwrap_or(LuaValue::Nil);

    let Some(entity) = load_entity(&target) else {
        return Err(LuaError::RuntimeError(String::from(
            "bad argument to '__tostring' (host entity expected)",
        )));
    };

    let string = match &entity {
        HostEntity::Type(key) => format!("type {key}"),

        HostEntity::Object(object) => match object.ty().binding().display() {
            Some((display, path)) => object.read_any(path, |data| display(data))?,
            None => format!("{}: 0x{:08x}", object.ty(), object.address()),
        },
    };

    Ok(MultiValue::from_vec(vec![LuaValue::String(lua.create_string(string)?)]))
}
