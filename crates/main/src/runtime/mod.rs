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
//! Host type bindings and the interop protocol.
//!
//! This module implements everything that happens between the guest runtime
//! ([mlua]) and the host program:
//!
//! - [Value]: the tagged representation of values crossing the boundary,
//!   together with the [Downcast] and [Upcast] conversions between Values and
//!   Rust types.
//! - [HostType] and [TypeBuilder]: the registration of host types, their
//!   constructors, fields, properties, methods, events, operators and nested
//!   types. Each type is reflected once per process into a [TypeBinding].
//! - [resolve]: overload scoring and selection.
//! - [Thunk]: the cached routines that implement indexing, assignment and
//!   calls on host objects and host types.
//! - [ObjectBridge]: the mapping between guest objects and their host-side
//!   wrappers ([LuaTable], [LuaFunction], [LuaThread]), with reclamation
//!   driven by the guest collector.
//! - [Engine]: a guest runtime instance with its bridge.
//!
//! ```ignore
//! struct Counter {
//!     value: i64,
//! }
//!
//! impl HostType for Counter {
//!     const NAME: &'static str = "Counter";
//!
//!     fn describe(ty: &mut TypeBuilder<Self>) {
//!         ty.constructor(Signature::new(), |_| Ok(Value::host(Counter { value: 0 })));
//!
//!         ty.field("value", |this| this.value, |this, value| this.value = value);
//!
//!         ty.method(
//!             "increment",
//!             Signature::new().param::<i64>("n").returns::<i64>(),
//!             |invocation| {
//!                 let n = invocation.argument::<i64>(0)?;
//!
//!                 invocation
//!                     .with_receiver_mut(|this: &mut Counter| {
//!                         this.value += n;
//!                         this.value
//!                     })?
//!                     .upcast()
//!             },
//!         );
//!     }
//! }
//! ```

pub(crate) mod binding;
mod builder;
mod closeness;
pub(crate) mod coercion;
mod engine;
mod error;
mod guest;
mod hints;
mod ident;
pub(crate) mod invoke;
mod memory;
mod object;
mod origin;
pub(crate) mod thunk;
mod ty;
mod value;

/// Operator overloading.
///
/// A host type overloads an [Operator](ops::Operator) by declaring a static
/// method with the operator's conventional name, usually through
/// [TypeBuilder::operator]. Instances of types without an equality overload
/// compare by identity.
pub mod ops;

/// Overload resolution.
///
/// The functions of this module are used by the generated thunks. They are
/// public to let the host program inspect how a particular argument list
/// would be resolved against a signature.
pub mod resolve;

pub use crate::runtime::{
    binding::{Candidate, Member, MemberRef, MethodGroup, TypeBinding},
    builder::{
        Declaration,
        EventDecl,
        FieldDecl,
        IndexerDecl,
        Instantiate,
        InvokeBody,
        MethodBody,
        MethodDecl,
        Param,
        ParamMode,
        PropertyDecl,
        Signature,
        TypeBuilder,
        TypeDraft,
        TypeKind,
    },
    closeness::{Closeness, SUGGESTION_THRESHOLD},
    coercion::{Downcast, Upcast},
    engine::{ArithOp, CompareOp, Engine},
    error::{Access, ErrorCategory, NumberCastCause, RuntimeError, RuntimeResult},
    guest::{GuestKind, GuestObject, LuaFunction, LuaTable, LuaThread},
    hints::TypeHint,
    ident::Ident,
    invoke::Invocation,
    memory::{BridgeStats, EngineId, ObjectBridge},
    object::{HostEntity, HostObject, HostRef},
    origin::RustOrigin,
    thunk::{Operation, Scope, SearchStrategy, Thunk, DEFAULT_INDEXER, LINEAR_SEARCH_LIMIT},
    ty::{HostType, TypeKey},
    value::{GuestString, Value},
};
