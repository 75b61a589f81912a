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

use mlua::Lua;

use crate::{
    runtime::{
        binding::MethodGroup,
        coercion::type_mismatch,
        invoke::resolve_and_invoke,
        HostEntity,
        HostObject,
        HostType,
        Ident,
        RuntimeError,
        RuntimeResult,
        Signature,
        TypeBuilder,
        TypeHint,
        TypeKey,
        Value,
    },
};

/// A method group read from a host type or a host object.
///
/// Reading a method member (`object.Method` or `Type.Method`) produces a
/// wrapper that remembers the group. Calling the wrapper resolves the
/// overload against the call arguments.
///
/// A wrapper read from an object takes the receiver as its first argument,
/// so `object:Method(x)` and `object.Method(object, x)` are the same call.
/// The first argument must be an object of the type the wrapper was read
/// from. A wrapper read from a type takes no receiver: static methods are
/// called with a dot, `Type.Method(x)`, and every argument reaches the
/// resolution.
///
/// Indexing the wrapper with type references binds explicit type arguments
/// of generic overloads: `object.Convert[Integer](object, value)`.
#[derive(Clone)]
pub struct MethodWrapper {
    owner: TypeKey,
    group: &'static MethodGroup,
    receiver: Option<HostObject>,
    type_arguments: Vec<TypeKey>,
}

impl MethodWrapper {
    #[inline(always)]
    pub(crate) fn new(
        owner: TypeKey,
        group: &'static MethodGroup,
        receiver: Option<HostObject>,
        type_arguments: Vec<TypeKey>,
    ) -> Self {
        Self {
            owner,
            group,
            receiver,
            type_arguments,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &Ident {
        self.group.name()
    }

    /// The type through which the group was accessed.
    #[inline(always)]
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Returns true if the group was read from an object, in which case
    /// the calls take the receiver as the first argument.
    #[inline(always)]
    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }

    #[inline(always)]
    pub fn type_arguments(&self) -> &[TypeKey] {
        &self.type_arguments
    }

    fn call(
        lua: &Lua,
        object: &HostObject,
        mut arguments: Vec<Value>,
    ) -> RuntimeResult<Vec<Value>> {
        let this = object.get::<MethodWrapper>()?;

        let receiver = match this.receiver {
            None => None,

            Some(_) => {
                let first = match arguments.is_empty() {
                    true => Value::Nil,
                    false => arguments.remove(0),
                };

                match first {
                    Value::Host(HostEntity::Object(receiver)) if receiver.ty() == this.owner => {
                        Some(receiver)
                    }

                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: String::from(this.owner.name()),
                            actual: other.type_name(),
                        })
                    }
                }
            }
        };

        resolve_and_invoke(
            lua,
            this.owner,
            this.group,
            receiver.as_ref(),
            arguments,
            &this.type_arguments,
        )
    }
}

impl HostType for MethodWrapper {
    const NAME: &'static str = "Method";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.invoke(Self::call);

        let _ = ty.readonly_indexed_property(
            "Item",
            Signature::new().variadic_hint("types", TypeHint::Type),
            TypeHint::Host(Self::type_key()),
            |invocation| {
                let type_arguments = invocation.argument::<Vec<TypeKey>>(0)?;

                let this = invocation.with_receiver(|this: &MethodWrapper| this.clone())?;

                Ok(Value::host(MethodWrapper {
                    type_arguments,
                    ..this
                }))
            },
        );

        let _ = ty.display(|this| {
            let mut result = format!("method {}.{}", this.owner, this.group.name());

            if !this.type_arguments.is_empty() {
                let arguments = this
                    .type_arguments
                    .iter()
                    .map(|key| key.name())
                    .collect::<Vec<_>>()
                    .join(", ");

                result.push_str(&format!("[{arguments}]"));
            }

            result
        });
    }
}

/// A call of a generic method group that awaits its type arguments.
///
/// When a call without explicit type arguments matches none of the
/// non-generic overloads, but the group has generic ones, the call returns
/// this object. Calling it with type references completes the original call:
/// `object:Convert(value)(Integer)`.
#[derive(Clone)]
pub struct PendingGenericCall {
    owner: TypeKey,
    group: &'static MethodGroup,
    receiver: Option<HostObject>,
    arguments: Vec<Value>,
}

impl PendingGenericCall {
    #[inline(always)]
    pub(crate) fn new(
        owner: TypeKey,
        group: &'static MethodGroup,
        receiver: Option<HostObject>,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            owner,
            group,
            receiver,
            arguments,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &Ident {
        self.group.name()
    }

    /// The captured call arguments.
    #[inline(always)]
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    fn call(
        lua: &Lua,
        object: &HostObject,
        arguments: Vec<Value>,
    ) -> RuntimeResult<Vec<Value>> {
        let this = object.get::<PendingGenericCall>()?;

        if arguments.is_empty() {
            return Err(type_mismatch(&TypeHint::Type, &Value::Nil));
        }

        let mut type_arguments = Vec::with_capacity(arguments.len());

        for argument in &arguments {
            match argument.as_type() {
                Some(key) => type_arguments.push(key),
                None => return Err(type_mismatch(&TypeHint::Type, argument)),
            }
        }

        resolve_and_invoke(
            lua,
            this.owner,
            this.group,
            this.receiver.as_ref(),
            this.arguments,
            &type_arguments,
        )
    }
}

impl HostType for PendingGenericCall {
    const NAME: &'static str = "PendingGenericCall";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.invoke(Self::call);

        let _ = ty.display(|this| format!("pending call {}.{}", this.owner, this.group.name()));
    }
}
