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

use compact_str::CompactString;
use mlua::Lua;

use crate::{
    runtime::{
        binding::MemberRef,
        thunk::invoke_indexer,
        HostObject,
        HostType,
        IndexerDecl,
        Invocation,
        RuntimeError,
        RuntimeResult,
        Signature,
        TypeBuilder,
        TypeHint,
        Value,
    },
};

/// An indexed property of a host object read by name.
///
/// Reading a named indexed property (`object.Items`) produces this wrapper.
/// Indexing the wrapper with a single key calls the property's accessors:
/// `object.Items[key]` and `object.Items[key] = value`. Properties with
/// several index parameters are accessed through the `get` and `set`
/// methods: `object.Items:get(row, column)` and
/// `object.Items:set(row, column, value)`.
///
/// The type's indexed property named [DEFAULT_INDEXER](crate::runtime::DEFAULT_INDEXER)
/// is also reachable by indexing the object itself with a non-string key.
#[derive(Clone)]
pub struct IndexedPropertyWrapper {
    indexer: &'static MemberRef<IndexerDecl>,
    receiver: HostObject,
}

impl IndexedPropertyWrapper {
    #[inline(always)]
    pub(crate) fn new(indexer: &'static MemberRef<IndexerDecl>, receiver: HostObject) -> Self {
        Self { indexer, receiver }
    }

    #[inline(always)]
    pub fn indexer(&self) -> &IndexerDecl {
        self.indexer.decl()
    }

    #[inline(always)]
    pub fn receiver(&self) -> &HostObject {
        &self.receiver
    }

    fn get(&self, lua: &Lua, indices: Vec<Value>) -> RuntimeResult<Value> {
        let decl = self.indexer.decl();

        let Some(get) = decl.get else {
            return Err(RuntimeError::WriteOnly {
                receiver_type: self.indexer.owner().name(),
                member: CompactString::from(decl.name.as_str()),
            });
        };

        let results = invoke_indexer(lua, self.indexer, &self.receiver, get, indices, false)?;

        Ok(results.into_iter().next().unwrap_or_default())
    }

    fn set(&self, lua: &Lua, arguments: Vec<Value>) -> RuntimeResult<()> {
        let decl = self.indexer.decl();

        let Some(set) = decl.set else {
            return Err(RuntimeError::ReadOnly {
                receiver_type: self.indexer.owner().name(),
                member: CompactString::from(decl.name.as_str()),
            });
        };

        let _ = invoke_indexer(lua, self.indexer, &self.receiver, set, arguments, true)?;

        Ok(())
    }

    fn this(invocation: &Invocation<'_>) -> RuntimeResult<Self> {
        invocation.with_receiver(|this: &IndexedPropertyWrapper| this.clone())
    }
}

impl HostType for IndexedPropertyWrapper {
    const NAME: &'static str = "IndexedProperty";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.indexed_property(
            "Item",
            Signature::new().param_hint("index", TypeHint::Any),
            TypeHint::Any,
            |invocation| {
                let this = Self::this(invocation)?;
                let index = invocation.value(0);

                this.get(invocation.lua(), vec![index])
            },
            |invocation| {
                let this = Self::this(invocation)?;
                let index = invocation.value(0);
                let value = invocation.value(1);

                this.set(invocation.lua(), vec![index, value])?;

                Ok(Value::Nil)
            },
        );

        let _ = ty.method(
            "get",
            Signature::new()
                .variadic_hint("indices", TypeHint::Any)
                .returns::<Value>(),
            |invocation| {
                let this = Self::this(invocation)?;
                let indices = invocation.argument::<Vec<Value>>(0)?;

                this.get(invocation.lua(), indices)
            },
        );

        let _ = ty.method(
            "set",
            Signature::new().variadic_hint("arguments", TypeHint::Any),
            |invocation| {
                let this = Self::this(invocation)?;
                let arguments = invocation.argument::<Vec<Value>>(0)?;

                this.set(invocation.lua(), arguments)?;

                Ok(Value::Nil)
            },
        );

        let _ = ty.display(|this| {
            format!(
                "indexed property {}.{}",
                this.indexer.owner(),
                this.indexer.decl().name,
            )
        });
    }
}
