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

use std::{
    borrow::Cow,
    ffi::c_void,
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    mem::discriminant,
    sync::Arc,
};

use mlua::{FromLua, IntoLua, LightUserData, Lua, Result as LuaResult, Value as LuaValue};

use crate::runtime::{
    object::{load_entity, push_entity},
    GuestObject,
    HostEntity,
    HostObject,
    HostType,
    LuaFunction,
    LuaTable,
    LuaThread,
    ObjectBridge,
    RuntimeError,
    RuntimeResult,
    TypeKey,
};

/// A dynamically-typed value crossing the host/guest boundary.
///
/// Scalars are stored by value. Guest composites (tables, functions, threads)
/// are represented by [GuestObject] wrappers that keep the guest object
/// reachable for as long as any wrapper clone is alive. Host objects and host
/// type references are represented by [HostEntity].
///
/// Equality and hashing are defined per tag: scalars compare structurally
/// (numbers bitwise), guest and host references compare by identity. An
/// integer is never equal to a number.
///
/// The Value is `Send + Sync`, but guest wrappers it contains are usable only
/// with the engine instance that created them.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    /// An opaque pointer-sized token.
    Light(usize),
    String(GuestString),
    Guest(GuestObject),
    Host(HostEntity),
}

impl Debug for Value {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => formatter.write_str("nil"),
            Self::Boolean(value) => Debug::fmt(value, formatter),
            Self::Integer(value) => Debug::fmt(value, formatter),
            Self::Number(value) => Debug::fmt(value, formatter),
            Self::Light(value) => formatter.write_fmt(format_args!("light(0x{value:08x})")),
            Self::String(value) => Debug::fmt(value, formatter),
            Self::Guest(value) => Debug::fmt(value, formatter),
            Self::Host(value) => Debug::fmt(value, formatter),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Light(a), Self::Light(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Guest(a), Self::Guest(b)) => a.ptr_eq(b),
            (Self::Host(a), Self::Host(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        discriminant(self).hash(state);

        match self {
            Self::Nil => (),
            Self::Boolean(value) => value.hash(state),
            Self::Integer(value) => value.hash(state),
            Self::Number(value) => value.to_bits().hash(state),
            Self::Light(value) => value.hash(state),
            Self::String(value) => value.hash(state),
            Self::Guest(object) => object.address().hash(state),
            Self::Host(entity) => entity.hash(state),
        }
    }
}

impl From<()> for Value {
    #[inline(always)]
    fn from(_: ()) -> Self {
        Self::Nil
    }
}

impl From<bool> for Value {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    #[inline(always)]
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for Value {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl<'a> From<&'a str> for Value {
    #[inline(always)]
    fn from(value: &'a str) -> Self {
        Self::String(GuestString::from(value))
    }
}

impl From<String> for Value {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self::String(GuestString::from(value))
    }
}

impl<'a> From<&'a [u8]> for Value {
    #[inline(always)]
    fn from(value: &'a [u8]) -> Self {
        Self::String(GuestString::from(value))
    }
}

impl From<GuestString> for Value {
    #[inline(always)]
    fn from(value: GuestString) -> Self {
        Self::String(value)
    }
}

impl From<GuestObject> for Value {
    #[inline(always)]
    fn from(value: GuestObject) -> Self {
        Self::Guest(value)
    }
}

impl From<LuaTable> for Value {
    #[inline(always)]
    fn from(value: LuaTable) -> Self {
        Self::Guest(GuestObject::Table(value))
    }
}

impl From<LuaFunction> for Value {
    #[inline(always)]
    fn from(value: LuaFunction) -> Self {
        Self::Guest(GuestObject::Function(value))
    }
}

impl From<LuaThread> for Value {
    #[inline(always)]
    fn from(value: LuaThread) -> Self {
        Self::Guest(GuestObject::Thread(value))
    }
}

impl From<HostEntity> for Value {
    #[inline(always)]
    fn from(value: HostEntity) -> Self {
        Self::Host(value)
    }
}

impl From<HostObject> for Value {
    #[inline(always)]
    fn from(value: HostObject) -> Self {
        Self::Host(HostEntity::Object(value))
    }
}

impl From<TypeKey> for Value {
    #[inline(always)]
    fn from(value: TypeKey) -> Self {
        Self::Host(HostEntity::Type(value))
    }
}

impl FromLua for Value {
    #[inline(always)]
    fn from_lua(value: LuaValue, lua: &Lua) -> LuaResult<Self> {
        Ok(Self::load(lua, value)?)
    }
}

impl IntoLua for Value {
    #[inline(always)]
    fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
        Ok(self.to_lua(lua)?)
    }
}

impl Value {
    /// Moves `data` into a new host object.
    #[inline(always)]
    pub fn host<T: HostType>(data: T) -> Self {
        Self::Host(HostEntity::Object(HostObject::new(data)))
    }

    /// Returns a reference to the `T` host type itself.
    #[inline(always)]
    pub fn type_of<T: HostType>() -> Self {
        Self::Host(HostEntity::Type(T::type_key()))
    }

    /// The name of this value's type, as used in error messages.
    ///
    /// Host objects report the name of their host type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Number(_) => "number",
            Self::Light(_) => "light",
            Self::String(_) => "string",
            Self::Guest(object) => object.kind().name(),
            Self::Host(HostEntity::Object(object)) => object.ty().name(),
            Self::Host(HostEntity::Type(_)) => "type",
        }
    }

    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the numeric value of integers and numbers.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload if it is valid UTF-8.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => value.to_str(),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(value) => Some(value.as_bytes()),
            _ => None,
        }
    }

    #[inline]
    pub fn as_guest(&self) -> Option<&GuestObject> {
        match self {
            Self::Guest(value) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn as_host(&self) -> Option<&HostEntity> {
        match self {
            Self::Host(value) => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Self::Host(HostEntity::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Returns the referenced host type if this value is a type reference.
    #[inline]
    pub fn as_type(&self) -> Option<TypeKey> {
        match self {
            Self::Host(HostEntity::Type(key)) => Some(*key),
            _ => None,
        }
    }

    /// Converts a guest value into a Value.
    ///
    /// Composite guest values are loaded through the Object Lifetime Bridge:
    /// while a wrapper of the same guest object is alive, the existing
    /// wrapper is returned. Userdata holding host entities are unwrapped.
    pub fn load(lua: &Lua, value: LuaValue) -> RuntimeResult<Self> {
        Ok(match value {
            LuaValue::Nil => Self::Nil,
            LuaValue::Boolean(value) => Self::Boolean(value),
            LuaValue::Integer(value) => Self::Integer(value),
            LuaValue::Number(value) => Self::Number(value),
            LuaValue::LightUserData(value) => Self::Light(value.0 as usize),
            LuaValue::String(value) => Self::String(GuestString::from(&*value.as_bytes())),

            LuaValue::UserData(_) => match load_entity(&value) {
                Some(entity) => Self::Host(entity),
                None => {
                    return Err(RuntimeError::UnsupportedValue {
                        type_name: value.type_name(),
                    })
                }
            },

            composite @ (LuaValue::Table(_) | LuaValue::Function(_) | LuaValue::Thread(_)) => {
                let bridge = ObjectBridge::of(lua)?;

                Self::Guest(bridge.load(lua, composite)?)
            }

            other => {
                return Err(RuntimeError::UnsupportedValue {
                    type_name: other.type_name(),
                })
            }
        })
    }

    /// Converts this Value into a guest value.
    ///
    /// Host entities become userdata that dispatch the guest protocol to the
    /// thunks of the entity's type. Guest wrappers are resolved to the
    /// objects they pin; a wrapper of another engine or an explicitly
    /// released wrapper fails with a lifetime error.
    pub fn to_lua(&self, lua: &Lua) -> RuntimeResult<LuaValue> {
        Ok(match self {
            Self::Nil => LuaValue::Nil,
            Self::Boolean(value) => LuaValue::Boolean(*value),
            Self::Integer(value) => LuaValue::Integer(*value),
            Self::Number(value) => LuaValue::Number(*value),
            Self::Light(value) => LuaValue::LightUserData(LightUserData(*value as *mut c_void)),
            Self::String(value) => LuaValue::String(lua.create_string(value.as_bytes())?),
            Self::Guest(object) => object.to_lua(lua)?,
            Self::Host(entity) => push_entity(lua, entity.clone())?,
        })
    }
}

/// An immutable copy of a guest string.
///
/// Guest strings are byte strings: they are not required to hold valid
/// UTF-8.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuestString(Arc<[u8]>);

impl Debug for GuestString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_str() {
            Some(string) => Debug::fmt(string, formatter),
            None => formatter.write_fmt(format_args!("b\"{}\"", self.0.escape_ascii())),
        }
    }
}

impl Display for GuestString {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.to_string_lossy(), formatter)
    }
}

impl<'a> From<&'a str> for GuestString {
    #[inline(always)]
    fn from(value: &'a str) -> Self {
        Self(Arc::from(value.as_bytes()))
    }
}

impl From<String> for GuestString {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self(Arc::from(value.into_bytes()))
    }
}

impl<'a> From<&'a [u8]> for GuestString {
    #[inline(always)]
    fn from(value: &'a [u8]) -> Self {
        Self(Arc::from(value))
    }
}

impl From<Vec<u8>> for GuestString {
    #[inline(always)]
    fn from(value: Vec<u8>) -> Self {
        Self(Arc::from(value))
    }
}

impl GuestString {
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the string if it is valid UTF-8.
    #[inline(always)]
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    #[inline(always)]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::hash_map::DefaultHasher,
        hash::{Hash, Hasher},
    };

    use crate::runtime::{GuestString, HostObject, HostType, TypeBuilder, Value};

    struct Marker;

    impl HostType for Marker {
        const NAME: &'static str = "Marker";

        fn describe(_ty: &mut TypeBuilder<Self>) {}
    }

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();

        value.hash(&mut hasher);

        hasher.finish()
    }

    #[test]
    fn test_numeric_tags_are_distinct() {
        assert_ne!(Value::Integer(1), Value::Number(1.0));
        assert_ne!(Value::Integer((1 << 53) + 1), Value::Number((1u64 << 53) as f64));

        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(0.0), Value::Number(-0.0));

        assert_eq!(hash_of(&Value::Number(2.5)), hash_of(&Value::Number(2.5)));
        assert_eq!(hash_of(&Value::from("key")), hash_of(&Value::from("key")));
    }

    #[test]
    fn test_reference_identity() {
        let object = HostObject::new(Marker);
        let other = HostObject::new(Marker);

        let first = Value::from(object.clone());
        let second = Value::from(object);

        assert_eq!(first, second);
        assert_eq!(hash_of(&first), hash_of(&second));
        assert_ne!(first, Value::from(other));

        assert_eq!(Value::type_of::<Marker>(), Value::type_of::<Marker>());
        assert_eq!(
            hash_of(&Value::type_of::<Marker>()),
            hash_of(&Value::type_of::<Marker>()),
        );
    }

    #[test]
    fn test_byte_strings() {
        let bytes = Value::from(&b"\xFF\x00tail"[..]);

        assert_eq!(bytes.as_str(), None);
        assert_eq!(bytes.as_bytes(), Some(&b"\xFF\x00tail"[..]));
        assert_eq!(format!("{bytes:?}"), "b\"\\xff\\x00tail\"");

        let text = GuestString::from("text");

        assert_eq!(text.to_str(), Some("text"));
        assert_eq!(text.len(), 4);
    }
}
