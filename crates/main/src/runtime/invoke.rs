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
    any::{type_name, Any},
    panic::{catch_unwind, AssertUnwindSafe},
};

use compact_str::CompactString;
use mlua::Lua;

use crate::{
    exports::PendingGenericCall,
    report::system_panic,
    runtime::{
        binding::{Candidate, MethodGroup},
        builder::ParamMode,
        object::UpcastPath,
        resolve::select,
        Downcast,
        HostObject,
        RuntimeError,
        RuntimeResult,
        TypeKey,
        Upcast,
        Value,
    },
};

/// A context of a host member call.
///
/// The host member body receives the arguments coerced to the declared
/// parameter types, in declaration order. Omitted optional arguments are
/// replaced with their defaults, output parameters are represented by nil
/// placeholders, and the variadic parameter is a single
/// [HostArray](crate::exports::HostArray) object.
///
/// ```ignore
/// fn increment(invocation: &mut Invocation<'_>) -> RuntimeResult<Value> {
///     let step = invocation.argument::<i64>(0)?;
///
///     invocation
///         .with_receiver_mut(|counter: &mut Counter| {
///             counter.value += step;
///             counter.value
///         })?
///         .upcast()
/// }
/// ```
pub struct Invocation<'a> {
    lua: &'a Lua,
    owner: TypeKey,
    member: &'a str,
    receiver: Option<(&'a HostObject, &'a UpcastPath)>,
    arguments: Vec<Value>,
    type_arguments: &'a [TypeKey],
}

impl<'a> Invocation<'a> {
    #[inline(always)]
    pub(crate) fn new(
        lua: &'a Lua,
        owner: TypeKey,
        member: &'a str,
        receiver: Option<(&'a HostObject, &'a UpcastPath)>,
        arguments: Vec<Value>,
        type_arguments: &'a [TypeKey],
    ) -> Self {
        Self {
            lua,
            owner,
            member,
            receiver,
            arguments,
            type_arguments,
        }
    }

    /// The guest runtime that initiated the call.
    #[inline(always)]
    pub fn lua(&self) -> &'a Lua {
        self.lua
    }

    /// The type that declares the member.
    #[inline(always)]
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// The name of the called member.
    #[inline(always)]
    pub fn member(&self) -> &str {
        self.member
    }

    /// The number of arguments, including the output placeholders.
    #[inline(always)]
    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Returns the argument at `index` converted to `T`.
    ///
    /// Returns nil converted to `T` if the index is out of bounds.
    #[inline]
    pub fn argument<T: Downcast>(&self, index: usize) -> RuntimeResult<T> {
        T::downcast(self.value(index))
    }

    /// Returns a copy of the argument at `index`, or nil if the index is out
    /// of bounds.
    #[inline]
    pub fn value(&self, index: usize) -> Value {
        self.arguments.get(index).cloned().unwrap_or_default()
    }

    /// Sets the final value of the by-reference or output parameter at
    /// `index`.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub fn set_output(&mut self, index: usize, value: impl Upcast) -> RuntimeResult<()> {
        let value = value.upcast()?;

        let Some(slot) = self.arguments.get_mut(index) else {
            let arity = self.arguments.len();

            panic!(
                "Output {index} of '{}.{}' is out of bounds ({arity}).",
                self.owner, self.member,
            );
        };

        *slot = value;

        Ok(())
    }

    /// The explicit type arguments of a generic method call.
    #[inline(always)]
    pub fn type_arguments(&self) -> &[TypeKey] {
        self.type_arguments
    }

    /// The object on which an instance member is called.
    #[inline(always)]
    pub fn receiver(&self) -> Option<&HostObject> {
        self.receiver.map(|(object, _)| object)
    }

    /// Reads the receiver's data as the type that declares the member.
    pub fn with_receiver<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> RuntimeResult<R> {
        let (object, path) = self.expect_receiver::<T>()?;

        object.read_projected(path, f)
    }

    /// Mutates the receiver's data as the type that declares the member.
    pub fn with_receiver_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> RuntimeResult<R> {
        let (object, path) = self.expect_receiver::<T>()?;

        object.write_projected(path, f)
    }

    #[inline(always)]
    pub(crate) fn into_arguments(self) -> Vec<Value> {
        self.arguments
    }

    #[inline]
    fn expect_receiver<T: Any>(&self) -> RuntimeResult<(&'a HostObject, &'a UpcastPath)> {
        match self.receiver {
            Some(receiver) => Ok(receiver),
            None => Err(RuntimeError::TypeMismatch {
                expected: String::from(type_name::<T>()),
                actual: "nil",
            }),
        }
    }
}

/// Runs a host member body, converting a panic into
/// [RuntimeError::HostPanic].
pub(crate) fn guard<R>(
    owner: TypeKey,
    member: &str,
    body: impl FnOnce() -> RuntimeResult<R>,
) -> RuntimeResult<R> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,

        Err(payload) => {
            let message = match payload.downcast_ref::<&'static str>() {
                Some(message) => String::from(*message),
                None => match payload.downcast_ref::<String>() {
                    Some(message) => message.clone(),
                    None => String::from("unknown panic"),
                },
            };

            Err(RuntimeError::HostPanic {
                receiver_type: owner.name(),
                member: CompactString::from(member),
                message,
            })
        }
    }
}

/// Resolves the overload of `group` that matches the arguments and calls it.
///
/// Only the overloads with exactly `type_arguments.len()` type parameters
/// participate. If no overload matches, the call is made without type
/// arguments, and the group has generic overloads, the result is a
/// [PendingGenericCall] object that completes the call when invoked with
/// type references.
///
/// The results are the primary return value (unless the overload returns
/// nothing), followed by the final values of the by-reference and output
/// parameters in declaration order.
pub(crate) fn resolve_and_invoke(
    lua: &Lua,
    owner: TypeKey,
    group: &'static MethodGroup,
    receiver: Option<&HostObject>,
    arguments: Vec<Value>,
    type_arguments: &[TypeKey],
) -> RuntimeResult<Vec<Value>> {
    let candidates = group
        .candidates
        .iter()
        .filter(|candidate| candidate.decl.signature.type_params == type_arguments.len())
        .collect::<Vec<_>>();

    let selected = select(
        candidates
            .iter()
            .map(|candidate| &candidate.decl.signature),
        &arguments,
    );

    let Some((index, resolution)) = selected else {
        if type_arguments.is_empty() && group.is_generic() {
            let pending = PendingGenericCall::new(owner, group, receiver.cloned(), arguments);

            return Ok(vec![Value::host(pending)]);
        }

        let member = match group.constructor {
            true => CompactString::default(),
            false => CompactString::from(group.name.as_str()),
        };

        return Err(RuntimeError::NoMatchingOverload {
            receiver_type: owner.name(),
            member,
            arguments: arguments.iter().map(Value::type_name).collect(),
        });
    };

    let Some(candidate) = candidates.get(index) else {
        system_panic!("Selected overload {index} out of bounds.");
    };

    invoke_candidate(
        lua,
        owner,
        group,
        candidate,
        receiver,
        resolution.arguments,
        type_arguments,
    )
}

fn invoke_candidate(
    lua: &Lua,
    owner: TypeKey,
    group: &MethodGroup,
    candidate: &Candidate,
    receiver: Option<&HostObject>,
    arguments: Vec<Value>,
    type_arguments: &[TypeKey],
) -> RuntimeResult<Vec<Value>> {
    let decl = &candidate.decl;
    let member = group.name.as_str();

    let receiver = match decl.is_static {
        true => None,
        false => match receiver {
            Some(object) => Some((object, &candidate.path)),
            None => {
                return Err(RuntimeError::TypeMismatch {
                    expected: owner.to_string(),
                    actual: "nil",
                })
            }
        },
    };

    let mut invocation = Invocation::new(
        lua,
        owner,
        member,
        receiver,
        arguments,
        type_arguments,
    );

    let result = guard(owner, member, || (decl.body)(&mut invocation))?;

    let arguments = invocation.into_arguments();

    let mut results = Vec::new();

    if group.constructor || decl.signature.returns.is_some() {
        results.push(result);
    }

    for (param, argument) in decl.signature.params.iter().zip(arguments) {
        if matches!(param.mode, ParamMode::Ref | ParamMode::Out) {
            results.push(argument);
        }
    }

    Ok(results)
}
