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

use crate::{
    exports::{Decimal, HostArray},
    runtime::{
        GuestObject,
        GuestString,
        HostEntity,
        HostObject,
        LuaFunction,
        LuaTable,
        LuaThread,
        NumberCastCause,
        RuntimeError,
        RuntimeResult,
        TypeHint,
        TypeKey,
        Value,
    },
};

/// A trait that converts a [Value] into Rust data.
///
/// Host member bodies read their arguments through this trait (see
/// [Invocation::argument](crate::runtime::Invocation::argument)), and the
/// [Signature](crate::runtime::Signature) builder uses [Downcast::hint] to
/// derive the parameter's coercion target.
///
/// By the time a member body runs, overload resolution has already coerced
/// every argument to its declared [TypeHint]. Implementations therefore only
/// need to accept the canonical representation of their hint.
///
/// A nil argument passed to a reference-type parameter is delivered as
/// [Value::Nil]; such parameters are usually read as [Option].
pub trait Downcast: Sized + 'static {
    /// Transforms the Value into Rust data.
    fn downcast(value: Value) -> RuntimeResult<Self>;

    /// Returns the coercion target of this Rust type.
    fn hint() -> TypeHint;
}

/// A trait that converts Rust data into a [Value].
///
/// Host member bodies produce their results, and field or property getters
/// produce their values, through this trait.
pub trait Upcast: Sized {
    /// Transforms Rust data into a Value.
    fn upcast(self) -> RuntimeResult<Value>;

    /// Returns the type description of this Rust type.
    fn hint() -> TypeHint;
}

#[inline(always)]
pub(crate) fn type_mismatch(expected: &TypeHint, value: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        actual: value.type_name(),
    }
}

/// Coerces `value` to the `hint` target.
///
/// Returns None if the value is incompatible with the target. The returned
/// Value is the canonical representation of the target: integers stay
/// integers after a successful range check, integers become numbers for
/// floating-point targets, and numbers become [Decimal] objects for the
/// decimal target.
pub(crate) fn coerce(value: &Value, hint: &TypeHint) -> Option<Value> {
    match (hint, value) {
        (TypeHint::Any, _) => Some(value.clone()),

        (TypeHint::Nullable(_), Value::Nil) => Some(Value::Nil),

        (TypeHint::Nullable(inner), _) => coerce(value, inner),

        (_, Value::Nil) => match accepts_nil(hint) {
            true => Some(Value::Nil),
            false => None,
        },

        (TypeHint::Bool, Value::Boolean(_)) => Some(value.clone()),

        (TypeHint::F32 | TypeHint::F64, Value::Integer(integer)) => {
            Some(Value::Number(*integer as f64))
        }

        (TypeHint::F32 | TypeHint::F64, Value::Number(_)) => Some(value.clone()),

        (TypeHint::Decimal, Value::Integer(integer)) => {
            Some(Value::host(Decimal::from_integer(*integer)))
        }

        (TypeHint::Decimal, Value::Number(number)) => {
            Decimal::from_number(*number).ok().map(Value::host)
        }

        (TypeHint::Decimal, Value::Host(HostEntity::Object(object))) if object.is::<Decimal>() => {
            Some(value.clone())
        }

        (_, Value::Integer(integer)) if hint.is_integer() => {
            match narrow(*integer, hint) {
                Ok(()) => Some(value.clone()),
                Err(_) => None,
            }
        }

        (TypeHint::Char, Value::String(string)) => {
            let Some(string) = string.to_str() else {
                return None;
            };

            let mut chars = string.chars();

            match (chars.next(), chars.next()) {
                (Some(_), None) => Some(value.clone()),
                _ => None,
            }
        }

        (TypeHint::String, Value::String(_)) => Some(value.clone()),

        (TypeHint::Light, Value::Light(_)) => Some(value.clone()),

        (TypeHint::Table, Value::Guest(GuestObject::Table(_))) => Some(value.clone()),

        (TypeHint::Function, Value::Guest(GuestObject::Function(_))) => Some(value.clone()),

        (TypeHint::Thread, Value::Guest(GuestObject::Thread(_))) => Some(value.clone()),

        (TypeHint::Type, Value::Host(HostEntity::Type(_))) => Some(value.clone()),

        (TypeHint::Host(key), Value::Host(HostEntity::Object(object))) => {
            match object.ty().binding().is_subtype_of(*key) {
                true => Some(value.clone()),
                false => None,
            }
        }

        (TypeHint::Array(element), Value::Host(HostEntity::Object(object))) => {
            let matches = object
                .read::<HostArray, _>(|array| {
                    element.as_ref() == &TypeHint::Any || array.element() == element.as_ref()
                })
                .unwrap_or(false);

            match matches {
                true => Some(value.clone()),
                false => None,
            }
        }

        _ => None,
    }
}

/// Returns true if nil is an acceptable value of the target.
///
/// Nil stands for the empty reference, so every reference-like target
/// accepts it. Scalar targets and host value types do not.
pub(crate) fn accepts_nil(hint: &TypeHint) -> bool {
    match hint {
        TypeHint::Any
        | TypeHint::Nullable(_)
        | TypeHint::String
        | TypeHint::Table
        | TypeHint::Function
        | TypeHint::Thread
        | TypeHint::Type
        | TypeHint::Array(_) => true,

        TypeHint::Host(key) => !key.binding().is_value_type(),

        _ => false,
    }
}

/// Checks that `value` fits the integer target.
pub(crate) fn narrow(value: i64, hint: &TypeHint) -> RuntimeResult<()> {
    let result = match hint {
        TypeHint::I8 => cast::i8(value).map(drop),
        TypeHint::I16 => cast::i16(value).map(drop),
        TypeHint::I32 => cast::i32(value).map(drop),
        TypeHint::I64 => Ok(()),
        TypeHint::U8 => cast::u8(value).map(drop),
        TypeHint::U16 => cast::u16(value).map(drop),
        TypeHint::U32 => cast::u32(value).map(drop),
        TypeHint::U64 => cast::u64(value).map(drop),

        TypeHint::Isize => isize::try_from(value)
            .map(drop)
            .map_err(|_| overflow_or_underflow(value)),

        TypeHint::Usize => usize::try_from(value)
            .map(drop)
            .map_err(|_| overflow_or_underflow(value)),

        _ => {
            return Err(RuntimeError::TypeMismatch {
                expected: hint.to_string(),
                actual: "integer",
            })
        }
    };

    result.map_err(|cause| number_cast("integer", hint, NumberCastCause::from(cause), value))
}

#[inline(always)]
fn overflow_or_underflow(value: i64) -> cast::Error {
    match value < 0 {
        true => cast::Error::Underflow,
        false => cast::Error::Overflow,
    }
}

#[inline(always)]
fn number_cast(
    from: &'static str,
    to: &TypeHint,
    cause: NumberCastCause,
    value: impl ToString,
) -> RuntimeError {
    let to = match to {
        TypeHint::I8 => "i8",
        TypeHint::I16 => "i16",
        TypeHint::I32 => "i32",
        TypeHint::I64 => "i64",
        TypeHint::Isize => "isize",
        TypeHint::U8 => "u8",
        TypeHint::U16 => "u16",
        TypeHint::U32 => "u32",
        TypeHint::U64 => "u64",
        TypeHint::Usize => "usize",
        TypeHint::Decimal => "Decimal",
        _ => "number",
    };

    RuntimeError::NumberCast {
        from,
        to,
        cause,
        value: value.to_string(),
    }
}

macro_rules! impl_int {
    ($ty:ty, $hint:ident) => {
        impl Downcast for $ty {
            fn downcast(value: Value) -> RuntimeResult<Self> {
                match value {
                    Value::Integer(integer) => {
                        narrow(integer, &TypeHint::$hint)?;

                        Ok(integer as $ty)
                    }

                    other => Err(type_mismatch(&TypeHint::$hint, &other)),
                }
            }

            #[inline(always)]
            fn hint() -> TypeHint {
                TypeHint::$hint
            }
        }
    };
}

impl_int!(i8, I8);
impl_int!(i16, I16);
impl_int!(i32, I32);
impl_int!(i64, I64);
impl_int!(isize, Isize);
impl_int!(u8, U8);
impl_int!(u16, U16);
impl_int!(u32, U32);
impl_int!(u64, U64);
impl_int!(usize, Usize);

macro_rules! impl_upcast_lossless {
    ($ty:ty, $hint:ident) => {
        impl Upcast for $ty {
            #[inline(always)]
            fn upcast(self) -> RuntimeResult<Value> {
                Ok(Value::Integer(self as i64))
            }

            #[inline(always)]
            fn hint() -> TypeHint {
                TypeHint::$hint
            }
        }
    };
}

impl_upcast_lossless!(i8, I8);
impl_upcast_lossless!(i16, I16);
impl_upcast_lossless!(i32, I32);
impl_upcast_lossless!(i64, I64);
impl_upcast_lossless!(u8, U8);
impl_upcast_lossless!(u16, U16);
impl_upcast_lossless!(u32, U32);

impl Upcast for isize {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::Integer(self as i64))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Isize
    }
}

impl Upcast for u64 {
    fn upcast(self) -> RuntimeResult<Value> {
        match cast::i64(self) {
            Ok(integer) => Ok(Value::Integer(integer)),
            Err(cause) => Err(RuntimeError::NumberCast {
                from: "u64",
                to: "integer",
                cause: NumberCastCause::from(cause),
                value: self.to_string(),
            }),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::U64
    }
}

impl Upcast for usize {
    fn upcast(self) -> RuntimeResult<Value> {
        match i64::try_from(self) {
            Ok(integer) => Ok(Value::Integer(integer)),
            Err(_) => Err(RuntimeError::NumberCast {
                from: "usize",
                to: "integer",
                cause: NumberCastCause::Overflow,
                value: self.to_string(),
            }),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Usize
    }
}

macro_rules! impl_float {
    ($ty:ty, $hint:ident) => {
        impl Downcast for $ty {
            fn downcast(value: Value) -> RuntimeResult<Self> {
                match value {
                    Value::Integer(integer) => Ok(integer as $ty),
                    Value::Number(number) => Ok(number as $ty),
                    other => Err(type_mismatch(&TypeHint::$hint, &other)),
                }
            }

            #[inline(always)]
            fn hint() -> TypeHint {
                TypeHint::$hint
            }
        }

        impl Upcast for $ty {
            #[inline(always)]
            fn upcast(self) -> RuntimeResult<Value> {
                Ok(Value::Number(self as f64))
            }

            #[inline(always)]
            fn hint() -> TypeHint {
                TypeHint::$hint
            }
        }
    };
}

impl_float!(f32, F32);
impl_float!(f64, F64);

impl Downcast for Value {
    #[inline(always)]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        Ok(value)
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Any
    }
}

impl Upcast for Value {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(self)
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Any
    }
}

impl Upcast for () {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::Nil)
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Any
    }
}

impl Downcast for bool {
    #[inline]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Boolean(value) => Ok(value),
            other => Err(type_mismatch(&TypeHint::Bool, &other)),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Bool
    }
}

impl Upcast for bool {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::Boolean(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Bool
    }
}

impl Downcast for char {
    fn downcast(value: Value) -> RuntimeResult<Self> {
        if let Some(string) = value.as_str() {
            let mut chars = string.chars();

            if let (Some(character), None) = (chars.next(), chars.next()) {
                return Ok(character);
            }
        }

        Err(type_mismatch(&TypeHint::Char, &value))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Char
    }
}

impl Upcast for char {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::from(self.to_string()))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Char
    }
}

impl Downcast for String {
    #[inline]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::String(string) => match string.to_str() {
                Some(string) => Ok(String::from(string)),
                None => Err(RuntimeError::TypeMismatch {
                    expected: String::from("UTF-8 string"),
                    actual: "byte string",
                }),
            },

            other => Err(type_mismatch(&TypeHint::String, &other)),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::String
    }
}

impl Upcast for String {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::from(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::String
    }
}

impl<'a> Upcast for &'a str {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::from(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::String
    }
}

impl Downcast for GuestString {
    #[inline]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::String(string) => Ok(string),
            other => Err(type_mismatch(&TypeHint::String, &other)),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::String
    }
}

impl Upcast for GuestString {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::String(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::String
    }
}

macro_rules! impl_guest {
    ($ty:ident, $hint:ident) => {
        impl Downcast for $ty {
            #[inline]
            fn downcast(value: Value) -> RuntimeResult<Self> {
                match value {
                    Value::Guest(GuestObject::$hint(object)) => Ok(object),
                    other => Err(type_mismatch(&TypeHint::$hint, &other)),
                }
            }

            #[inline(always)]
            fn hint() -> TypeHint {
                TypeHint::$hint
            }
        }

        impl Upcast for $ty {
            #[inline(always)]
            fn upcast(self) -> RuntimeResult<Value> {
                Ok(Value::Guest(GuestObject::$hint(self)))
            }

            #[inline(always)]
            fn hint() -> TypeHint {
                TypeHint::$hint
            }
        }
    };
}

impl_guest!(LuaTable, Table);
impl_guest!(LuaFunction, Function);
impl_guest!(LuaThread, Thread);

impl Downcast for HostObject {
    #[inline]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Host(HostEntity::Object(object)) => Ok(object),
            other => Err(RuntimeError::TypeMismatch {
                expected: String::from("host object"),
                actual: other.type_name(),
            }),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Any
    }
}

impl Upcast for HostObject {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::from(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Any
    }
}

impl Upcast for HostEntity {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::Host(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Any
    }
}

impl Downcast for TypeKey {
    #[inline]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Host(HostEntity::Type(key)) => Ok(key),
            other => Err(type_mismatch(&TypeHint::Type, &other)),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Type
    }
}

impl Upcast for TypeKey {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::from(self))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Type
    }
}

impl<T: Downcast> Downcast for Option<T> {
    #[inline]
    fn downcast(value: Value) -> RuntimeResult<Self> {
        match value {
            Value::Nil => Ok(None),
            other => Ok(Some(T::downcast(other)?)),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        <T as Downcast>::hint().nullable()
    }
}

impl<T: Upcast> Upcast for Option<T> {
    #[inline]
    fn upcast(self) -> RuntimeResult<Value> {
        match self {
            None => Ok(Value::Nil),
            Some(value) => value.upcast(),
        }
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        <T as Upcast>::hint().nullable()
    }
}

impl<T: Downcast> Downcast for Vec<T> {
    fn downcast(value: Value) -> RuntimeResult<Self> {
        let hint = <Self as Downcast>::hint();

        let Some(object) = value.as_object() else {
            return Err(type_mismatch(&hint, &value));
        };

        let elements = object
            .read::<HostArray, _>(|array| array.elements().to_vec())
            .map_err(|_| type_mismatch(&hint, &value))?;

        elements.into_iter().map(T::downcast).collect()
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Array(Box::new(<T as Downcast>::hint()))
    }
}

impl<T: Upcast> Upcast for Vec<T> {
    fn upcast(self) -> RuntimeResult<Value> {
        let elements = self
            .into_iter()
            .map(Upcast::upcast)
            .collect::<RuntimeResult<Vec<_>>>()?;

        Ok(Value::host(HostArray::from_values(
            <T as Upcast>::hint(),
            elements,
        )))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Array(Box::new(<T as Upcast>::hint()))
    }
}

impl<T: Upcast> Upcast for RuntimeResult<T> {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        self?.upcast()
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        <T as Upcast>::hint()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{
        coercion::{coerce, Downcast, Upcast},
        RuntimeError,
        TypeHint,
        Value,
    };

    #[test]
    fn test_integer_narrowing() {
        assert!(coerce(&Value::Integer(255), &TypeHint::U8).is_some());
        assert!(coerce(&Value::Integer(256), &TypeHint::U8).is_none());
        assert!(coerce(&Value::Integer(-1), &TypeHint::U32).is_none());
        assert!(coerce(&Value::Integer(-128), &TypeHint::I8).is_some());

        match u8::downcast(Value::Integer(256)) {
            Err(RuntimeError::NumberCast { to: "u8", .. }) => (),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_float_targets() {
        assert_eq!(
            coerce(&Value::Integer(3), &TypeHint::F64),
            Some(Value::Number(3.0)),
        );
        assert!(coerce(&Value::Number(1.5), &TypeHint::I32).is_none());
        assert_eq!(f32::downcast(Value::Number(0.5)).ok(), Some(0.5));
    }

    #[test]
    fn test_nil_targets() {
        assert!(coerce(&Value::Nil, &TypeHint::String).is_some());
        assert!(coerce(&Value::Nil, &TypeHint::Nullable(Box::new(TypeHint::I32))).is_some());
        assert!(coerce(&Value::Nil, &TypeHint::I32).is_none());
        assert!(coerce(&Value::Nil, &TypeHint::Bool).is_none());
        assert_eq!(Option::<i32>::downcast(Value::Nil).ok(), Some(None));
    }

    #[test]
    fn test_char_target() {
        assert!(coerce(&Value::from("x"), &TypeHint::Char).is_some());
        assert!(coerce(&Value::from("xy"), &TypeHint::Char).is_none());
        assert!(coerce(&Value::from(""), &TypeHint::Char).is_none());
        assert_eq!(char::downcast(Value::from("λ")).ok(), Some('λ'));
    }

    #[test]
    fn test_unsigned_upcast() {
        assert_eq!(
            (i64::MAX as u64).upcast().ok(),
            Some(Value::Integer(i64::MAX))
        );

        match (i64::MAX as u64 + 1).upcast() {
            Err(RuntimeError::NumberCast { from: "u64", .. }) => (),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
