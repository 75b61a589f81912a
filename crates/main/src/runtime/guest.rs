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
    fmt::{Debug, Display, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use mlua::{Lua, MultiValue, Value as LuaValue};

use crate::runtime::{
    memory::GuestIdentity,
    EngineId,
    ObjectBridge,
    RuntimeError,
    RuntimeResult,
    Value,
};

/// A kind of a composite guest value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GuestKind {
    Table,
    Function,
    Thread,
}

impl Display for GuestKind {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

impl GuestKind {
    #[inline(always)]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Function => "function",
            Self::Thread => "thread",
        }
    }
}

// The registry key pinning the guest object is owned by the bridge entry of
// the identity, not by the handle.
pub(crate) struct GuestHandle {
    pub(crate) engine: EngineId,
    pub(crate) identity: GuestIdentity,
    pub(crate) kind: GuestKind,
    pub(crate) released: AtomicBool,
}

impl GuestHandle {
    #[inline(always)]
    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    #[inline(always)]
    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::AcqRel)
    }

    fn resolve(&self, lua: &Lua) -> RuntimeResult<LuaValue> {
        let bridge = ObjectBridge::of(lua)?;

        if bridge.engine() != self.engine {
            return Err(RuntimeError::ForeignEngine {
                owner: self.engine,
                current: bridge.engine(),
            });
        }

        if self.is_released() {
            return Err(RuntimeError::Released { kind: self.kind });
        }

        match bridge.pinned(lua, self.identity)? {
            Some(value) => Ok(value),
            None => Err(RuntimeError::Released { kind: self.kind }),
        }
    }
}

macro_rules! guest_wrapper {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(pub(crate) Arc<GuestHandle>);

        impl Debug for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                formatter.write_fmt(format_args!(
                    "{}({}, {:?})",
                    stringify!($name),
                    self.0.engine,
                    self.0.identity,
                ))
            }
        }

        impl PartialEq for $name {
            #[inline(always)]
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $name {}

        impl $name {
            /// The engine instance the wrapper belongs to.
            #[inline(always)]
            pub fn engine(&self) -> EngineId {
                self.0.engine
            }

            /// Returns true if the wrapper was released explicitly.
            #[inline(always)]
            pub fn is_released(&self) -> bool {
                self.0.is_released()
            }

            /// Returns the pinned guest value.
            #[inline(always)]
            pub fn to_lua(&self, lua: &Lua) -> RuntimeResult<LuaValue> {
                self.0.resolve(lua)
            }
        }
    };
}

guest_wrapper!(
    /// A host-side handle to a guest table.
    ///
    /// The handle pins the table in the guest registry for as long as any
    /// clone of the handle is alive, and for up to one guest collection cycle
    /// after the last clone is dropped.
    LuaTable
);

guest_wrapper!(
    /// A host-side handle to a guest function.
    LuaFunction
);

guest_wrapper!(
    /// A host-side handle to a guest thread.
    LuaThread
);

impl LuaTable {
    /// Reads `table[key]` honoring the table's metatable.
    pub fn get(&self, lua: &Lua, key: impl Into<Value>) -> RuntimeResult<Value> {
        let table = self.table(lua)?;
        let key = key.into().to_lua(lua)?;
        let value = table.get::<LuaValue>(key)?;

        Value::load(lua, value)
    }

    /// Performs `table[key] = value` honoring the table's metatable.
    pub fn set(&self, lua: &Lua, key: impl Into<Value>, value: impl Into<Value>) -> RuntimeResult<()> {
        let table = self.table(lua)?;
        let key = key.into().to_lua(lua)?;
        let value = value.into().to_lua(lua)?;

        Ok(table.set(key, value)?)
    }

    /// The length of the table's sequence part, without metamethods.
    pub fn len(&self, lua: &Lua) -> RuntimeResult<usize> {
        Ok(self.table(lua)?.raw_len())
    }

    /// Returns all key/value pairs of the table, without metamethods.
    pub fn pairs(&self, lua: &Lua) -> RuntimeResult<Vec<(Value, Value)>> {
        let table = self.table(lua)?;

        let mut result = Vec::new();

        for pair in table.pairs::<LuaValue, LuaValue>() {
            let (key, value) = pair?;

            result.push((Value::load(lua, key)?, Value::load(lua, value)?));
        }

        Ok(result)
    }

    /// Returns the elements `table[1]` to `table[#table]`, without
    /// metamethods.
    pub fn sequence(&self, lua: &Lua) -> RuntimeResult<Vec<Value>> {
        let table = self.table(lua)?;
        let length = table.raw_len();

        let mut result = Vec::with_capacity(length);

        for index in 1..=length {
            let value = table.raw_get::<LuaValue>(index)?;

            result.push(Value::load(lua, value)?);
        }

        Ok(result)
    }

    fn table(&self, lua: &Lua) -> RuntimeResult<mlua::Table> {
        match self.to_lua(lua)? {
            LuaValue::Table(table) => Ok(table),
            other => Err(unexpected(GuestKind::Table, &other)),
        }
    }
}

impl LuaFunction {
    /// Calls the function and returns its results.
    ///
    /// A guest error raised by the function is returned as
    /// [RuntimeError::Guest], unless it carries a host error, which is
    /// returned as is.
    pub fn call(&self, lua: &Lua, arguments: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        let function = match self.to_lua(lua)? {
            LuaValue::Function(function) => function,
            other => return Err(unexpected(GuestKind::Function, &other)),
        };

        let arguments = to_lua_all(lua, arguments)?;
        let results = function.call::<MultiValue>(arguments)?;

        from_lua_all(lua, results)
    }
}

impl LuaThread {
    /// Resumes the thread and returns the values it yields or returns.
    pub fn resume(&self, lua: &Lua, arguments: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        let thread = self.thread(lua)?;
        let arguments = to_lua_all(lua, arguments)?;
        let results = thread.resume::<MultiValue>(arguments)?;

        from_lua_all(lua, results)
    }

    /// Returns true if the thread can be resumed.
    pub fn is_resumable(&self, lua: &Lua) -> RuntimeResult<bool> {
        Ok(self.thread(lua)?.status() == mlua::ThreadStatus::Resumable)
    }

    fn thread(&self, lua: &Lua) -> RuntimeResult<mlua::Thread> {
        match self.to_lua(lua)? {
            LuaValue::Thread(thread) => Ok(thread),
            other => Err(unexpected(GuestKind::Thread, &other)),
        }
    }
}

/// A host-side handle to a composite guest value.
///
/// Within one engine instance, at most one live handle exists per guest
/// object: loading the same guest object again while a previous handle is
/// alive returns a clone of that handle.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum GuestObject {
    Table(LuaTable),
    Function(LuaFunction),
    Thread(LuaThread),
}

impl GuestObject {
    #[inline(always)]
    pub fn kind(&self) -> GuestKind {
        self.handle().kind
    }

    /// Returns true if both handles refer to the same guest object.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.handle(), other.handle())
    }

    /// The address of the handle, a process-unique token while the handle
    /// is alive.
    #[inline(always)]
    pub fn address(&self) -> usize {
        Arc::as_ptr(self.handle()) as usize
    }

    /// The engine instance the handle belongs to.
    #[inline(always)]
    pub fn engine(&self) -> EngineId {
        self.handle().engine
    }

    /// Returns true if the handle was released explicitly.
    #[inline(always)]
    pub fn is_released(&self) -> bool {
        self.handle().is_released()
    }

    /// Returns the pinned guest value.
    ///
    /// Fails if the handle belongs to another engine instance or was
    /// released.
    #[inline(always)]
    pub fn to_lua(&self, lua: &Lua) -> RuntimeResult<LuaValue> {
        self.handle().resolve(lua)
    }

    #[inline(always)]
    pub(crate) fn handle(&self) -> &Arc<GuestHandle> {
        match self {
            Self::Table(object) => &object.0,
            Self::Function(object) => &object.0,
            Self::Thread(object) => &object.0,
        }
    }

    pub(crate) fn from_handle(handle: Arc<GuestHandle>) -> Self {
        match handle.kind {
            GuestKind::Table => Self::Table(LuaTable(handle)),
            GuestKind::Function => Self::Function(LuaFunction(handle)),
            GuestKind::Thread => Self::Thread(LuaThread(handle)),
        }
    }
}

pub(crate) fn to_lua_all(lua: &Lua, values: Vec<Value>) -> RuntimeResult<MultiValue> {
    let mut result = Vec::with_capacity(values.len());

    for value in &values {
        result.push(value.to_lua(lua)?);
    }

    Ok(MultiValue::from_vec(result))
}

pub(crate) fn from_lua_all(lua: &Lua, values: MultiValue) -> RuntimeResult<Vec<Value>> {
    let mut result = Vec::with_capacity(values.len());

    for value in values {
        result.push(Value::load(lua, value)?);
    }

    Ok(result)
}

#[inline(always)]
fn unexpected(expected: GuestKind, actual: &LuaValue) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: String::from(expected.name()),
        actual: actual.type_name(),
    }
}
