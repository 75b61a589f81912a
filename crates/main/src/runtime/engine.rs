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
    fmt::{Debug, Formatter},
    rc::Rc,
};

use log::debug;
use mlua::{Function, Lua, MultiValue, Table, Value as LuaValue};

use crate::runtime::{
    guest::{from_lua_all, to_lua_all},
    object::{load_entity, push_entity},
    BridgeStats,
    EngineId,
    GuestObject,
    HostEntity,
    HostType,
    ObjectBridge,
    RuntimeError,
    RuntimeResult,
    Value,
};

/// A binary or unary arithmetic operator of the guest language.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Unm,
}

impl ArithOp {
    #[inline(always)]
    fn routine(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Unm => "unm",
        }
    }
}

/// A comparison operator of the guest language.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CompareOp {
    Eq,
    Lt,
    Le,
}

impl CompareOp {
    #[inline(always)]
    fn routine(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Lt => "lt",
            Self::Le => "le",
        }
    }
}

// Guest routines that perform the protocol operations with full metamethod
// semantics.
static PROTOCOL: &str = r#"
return {
    index = function(target, key) return target[key] end,
    set_index = function(target, key, value) target[key] = value end,
    call = function(callee, ...) return callee(...) end,
    method_call = function(target, name, ...) return target[name](target, ...) end,
    len = function(target) return #target end,
    display = tostring,
    add = function(a, b) return a + b end,
    sub = function(a, b) return a - b end,
    mul = function(a, b) return a * b end,
    div = function(a, b) return a / b end,
    mod = function(a, b) return a % b end,
    unm = function(a) return -a end,
    eq = function(a, b) return a == b end,
    lt = function(a, b) return a < b end,
    le = function(a, b) return a <= b end,
}
"#;

/// A guest runtime instance together with its interop state.
///
/// Each Engine owns an independent guest runtime and [ObjectBridge]. Guest
/// object wrappers loaded by one Engine cannot be used with another one.
///
/// The Engine is the entry point of the host program: it runs guest chunks,
/// converts values between the guest and [Value], crosses host entities and
/// guest objects over the boundary, and exposes the guest protocol
/// operations (indexing, calls, operators) the way a script would perform
/// them.
///
/// ```ignore
/// let engine = Engine::new()?;
///
/// engine.register_type::<Counter>()?;
///
/// let result = engine.eval("local c = Counter(); c.value = 5; return c:increment(3)")?;
/// ```
pub struct Engine {
    lua: Lua,
    bridge: Rc<ObjectBridge>,
    protocol: Table,
}

impl Debug for Engine {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Engine")
            .field("id", &self.bridge.engine())
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl Engine {
    /// Creates a new guest runtime instance and attaches a fresh
    /// [ObjectBridge] to it.
    #[inline(always)]
    pub fn new() -> RuntimeResult<Self> {
        Self::from_lua(Lua::new())
    }

    /// Attaches a fresh [ObjectBridge] to an existing guest runtime.
    ///
    /// The wrappers loaded through a previously attached bridge become
    /// foreign to the runtime.
    pub fn from_lua(lua: Lua) -> RuntimeResult<Self> {
        let bridge = ObjectBridge::install(&lua)?;
        let protocol = lua.load(PROTOCOL).set_name("=protocol").eval::<Table>()?;

        debug!("Engine {} started.", bridge.engine());

        Ok(Self {
            lua,
            bridge,
            protocol,
        })
    }

    #[inline(always)]
    pub fn id(&self) -> EngineId {
        self.bridge.engine()
    }

    /// The underlying guest runtime.
    #[inline(always)]
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    #[inline(always)]
    pub fn bridge(&self) -> &ObjectBridge {
        &self.bridge
    }

    /// Converts a guest value into a [Value].
    #[inline(always)]
    pub fn value_from(&self, value: LuaValue) -> RuntimeResult<Value> {
        Value::load(&self.lua, value)
    }

    /// Converts a [Value] into a guest value.
    #[inline(always)]
    pub fn value_to(&self, value: &Value) -> RuntimeResult<LuaValue> {
        value.to_lua(&self.lua)
    }

    /// Returns the wrapper of a guest table, function or thread.
    #[inline(always)]
    pub fn load_guest_object(&self, value: LuaValue) -> RuntimeResult<GuestObject> {
        self.bridge.load(&self.lua, value)
    }

    /// Returns the guest object pinned by the wrapper.
    #[inline(always)]
    pub fn push_guest_object(&self, object: &GuestObject) -> RuntimeResult<LuaValue> {
        object.to_lua(&self.lua)
    }

    /// Crosses a host object or a host type reference into the guest.
    #[inline(always)]
    pub fn push_host_entity(&self, entity: HostEntity) -> RuntimeResult<LuaValue> {
        push_entity(&self.lua, entity)
    }

    /// Returns the host entity carried by the guest value.
    pub fn load_host_entity(&self, value: &LuaValue) -> RuntimeResult<HostEntity> {
        match load_entity(value) {
            Some(entity) => Ok(entity),
            None => Err(RuntimeError::TypeMismatch {
                expected: String::from("host entity"),
                actual: value.type_name(),
            }),
        }
    }

    /// Makes the static scope of `T` available to the guest as a global
    /// variable named after the type.
    pub fn register_type<T: HostType>(&self) -> RuntimeResult<()> {
        self.set_global(T::NAME, Value::type_of::<T>())
    }

    pub fn set_global(&self, name: &str, value: impl Into<Value>) -> RuntimeResult<()> {
        let value = value.into().to_lua(&self.lua)?;

        Ok(self.lua.globals().set(name, value)?)
    }

    pub fn global(&self, name: &str) -> RuntimeResult<Value> {
        let value = self.lua.globals().get::<LuaValue>(name)?;

        Value::load(&self.lua, value)
    }

    /// Runs a guest chunk.
    pub fn exec(&self, chunk: &str) -> RuntimeResult<()> {
        Ok(self.lua.load(chunk).exec()?)
    }

    /// Runs a guest chunk and returns the values it returns.
    pub fn eval(&self, chunk: &str) -> RuntimeResult<Vec<Value>> {
        let results = self.lua.load(chunk).eval::<MultiValue>()?;

        from_lua_all(&self.lua, results)
    }

    /// Performs `target[key]`.
    pub fn index(&self, target: &Value, key: impl Into<Value>) -> RuntimeResult<Value> {
        self.single("index", vec![target.clone(), key.into()])
    }

    /// Performs `target[key] = value`.
    pub fn set_index(
        &self,
        target: &Value,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> RuntimeResult<()> {
        let _ = self.run("set_index", vec![target.clone(), key.into(), value.into()])?;

        Ok(())
    }

    /// Performs `callee(arguments...)`.
    pub fn call(&self, callee: &Value, arguments: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        let mut operands = Vec::with_capacity(arguments.len() + 1);

        operands.push(callee.clone());
        operands.extend(arguments);

        self.run("call", operands)
    }

    /// Performs `target:name(arguments...)`.
    pub fn method_call(
        &self,
        target: &Value,
        name: &str,
        arguments: Vec<Value>,
    ) -> RuntimeResult<Vec<Value>> {
        let mut operands = Vec::with_capacity(arguments.len() + 2);

        operands.push(target.clone());
        operands.push(Value::from(name));
        operands.extend(arguments);

        self.run("method_call", operands)
    }

    /// Applies an arithmetic operator. The right-hand side of
    /// [ArithOp::Unm] is ignored.
    pub fn arith(&self, op: ArithOp, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
        let operands = match op {
            ArithOp::Unm => vec![lhs.clone()],
            _ => vec![lhs.clone(), rhs.clone()],
        };

        self.single(op.routine(), operands)
    }

    /// Applies a comparison operator.
    pub fn compare(&self, op: CompareOp, lhs: &Value, rhs: &Value) -> RuntimeResult<bool> {
        match self.single(op.routine(), vec![lhs.clone(), rhs.clone()])? {
            Value::Boolean(result) => Ok(result),
            other => Err(RuntimeError::TypeMismatch {
                expected: String::from("boolean"),
                actual: other.type_name(),
            }),
        }
    }

    /// Performs `#target`.
    pub fn len(&self, target: &Value) -> RuntimeResult<Value> {
        self.single("len", vec![target.clone()])
    }

    /// Renders a value the way the guest `tostring` does.
    pub fn to_display(&self, value: &Value) -> RuntimeResult<String> {
        match self.single("display", vec![value.clone()])? {
            Value::String(string) => Ok(string.to_string_lossy().into_owned()),
            other => Err(RuntimeError::TypeMismatch {
                expected: String::from("string"),
                actual: other.type_name(),
            }),
        }
    }

    /// Runs full guest collection cycles until the bridge reclamation ran
    /// and the reclaimed guest objects were freed. Returns the number of
    /// reclaimed bridge entries.
    pub fn collect_garbage(&self) -> RuntimeResult<usize> {
        let before = self.bridge.stats().reclaimed;

        // The first cycle runs the reclamation finalizer, the second one
        // frees the objects it unpinned.
        self.lua.gc_collect()?;
        self.lua.gc_collect()?;

        Ok(self.bridge.stats().reclaimed - before)
    }

    /// Unpins the guest object of the wrapper immediately. Returns false if
    /// the wrapper was already released.
    #[inline(always)]
    pub fn release(&self, object: &GuestObject) -> RuntimeResult<bool> {
        self.bridge.release(&self.lua, object)
    }

    /// The number of guest objects pinned by host wrappers.
    #[inline(always)]
    pub fn tracked_objects(&self) -> usize {
        self.bridge.tracked()
    }

    #[inline(always)]
    pub fn stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    fn run(&self, routine: &str, operands: Vec<Value>) -> RuntimeResult<Vec<Value>> {
        let function = self.protocol.raw_get::<Function>(routine)?;
        let operands = to_lua_all(&self.lua, operands)?;
        let results = function.call::<MultiValue>(operands)?;

        from_lua_all(&self.lua, results)
    }

    #[inline(always)]
    fn single(&self, routine: &str, operands: Vec<Value>) -> RuntimeResult<Value> {
        Ok(self.run(routine, operands)?.into_iter().next().unwrap_or_default())
    }
}
