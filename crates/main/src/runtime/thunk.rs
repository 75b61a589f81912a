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
    any::TypeId,
    collections::hash_map::Entry,
    fmt::{Debug, Display, Formatter},
    sync::Mutex,
};

use ahash::AHashMap;
use compact_str::CompactString;
use lady_deirdre::sync::Lazy;
use log::trace;
use mlua::Lua;

use crate::{
    exports::{EventWrapper, HostArray, IndexedPropertyWrapper, MethodWrapper},
    runtime::{
        binding::{Member, MemberRef, TypeBinding},
        builder::{IndexerDecl, MethodBody},
        closeness::suggest,
        coercion::{coerce, type_mismatch},
        invoke::{guard, resolve_and_invoke, Invocation},
        resolve::score,
        GuestObject,
        HostEntity,
        HostObject,
        Ident,
        RuntimeError,
        RuntimeResult,
        TypeHint,
        TypeKey,
        Value,
    },
};

/// Member tables with at most this number of entries are searched linearly.
/// Larger tables are searched by binary search over the interned names.
pub const LINEAR_SEARCH_LIMIT: usize = 8;

/// The name of the indexed property that handles non-string keys.
pub const DEFAULT_INDEXER: &str = "Item";

static THUNKS: Lazy<Mutex<AHashMap<(TypeId, Scope, Operation), &'static Thunk>>> =
    Lazy::new(|| Mutex::new(AHashMap::new()));

/// A side of a host type visible to the guest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Scope {
    /// The members of the type's objects.
    Instance,

    /// The members of the type itself: constructors, static members and
    /// nested types.
    Static,
}

impl Display for Scope {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instance => formatter.write_str("instance"),
            Self::Static => formatter.write_str("static"),
        }
    }
}

/// A protocol operation the guest performs on a host entity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Operation {
    /// `entity[key]`
    Read,

    /// `entity[key] = value`
    Write,

    /// `entity(arguments...)`
    Call,
}

/// A member search strategy of a [Thunk].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SearchStrategy {
    Linear,
    Binary,
}

enum MemberTable {
    Linear(Vec<(Ident, &'static Member)>),
    Binary(Vec<(usize, &'static Member)>),
}

impl MemberTable {
    fn new(members: &'static AHashMap<Ident, Member>) -> Self {
        if members.len() <= LINEAR_SEARCH_LIMIT {
            return Self::Linear(
                members
                    .iter()
                    .map(|(name, member)| (name.clone(), member))
                    .collect(),
            );
        }

        let mut entries = members
            .iter()
            .map(|(name, member)| (name.address(), member))
            .collect::<Vec<_>>();

        entries.sort_by_key(|(address, _)| *address);

        Self::Binary(entries)
    }

    fn lookup(&self, name: &str) -> Option<&'static Member> {
        match self {
            Self::Linear(entries) => entries
                .iter()
                .find(|(candidate, _)| candidate.as_str() == name)
                .map(|(_, member)| *member),

            Self::Binary(entries) => {
                let address = Ident::find(name)?.address();

                let index = entries
                    .binary_search_by_key(&address, |(candidate, _)| *candidate)
                    .ok()?;

                Some(entries[index].1)
            }
        }
    }
}

type Routine = fn(&'static Thunk, &Lua, &HostEntity, Vec<Value>) -> RuntimeResult<Vec<Value>>;

/// A cached routine implementing one protocol [Operation] for one host type
/// and [Scope].
///
/// Thunks are process-wide. The routine and the member search table are
/// selected once, when the thunk is first requested.
pub struct Thunk {
    key: TypeKey,
    scope: Scope,
    operation: Operation,
    binding: &'static TypeBinding,
    members: MemberTable,
    routine: Routine,
}

impl Debug for Thunk {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Thunk")
            .field("type", &self.key)
            .field("scope", &self.scope)
            .field("operation", &self.operation)
            .field("strategy", &self.strategy())
            .finish()
    }
}

impl Thunk {
    /// Returns the thunk of the operation, generating it on first request.
    pub fn get(key: TypeKey, scope: Scope, operation: Operation) -> &'static Self {
        let cache_key = (key.id(), scope, operation);

        {
            let thunks = THUNKS.lock().unwrap_or_else(|poison| poison.into_inner());

            if let Some(thunk) = thunks.get(&cache_key) {
                return *thunk;
            }
        }

        let thunk = Self::generate(key, scope, operation);

        let mut thunks = THUNKS.lock().unwrap_or_else(|poison| poison.into_inner());

        match thunks.entry(cache_key) {
            Entry::Occupied(entry) => *entry.get(),

            Entry::Vacant(entry) => {
                trace!(
                    "Thunk generated: {scope} {operation:?} of '{key}' ({:?} search).",
                    thunk.strategy(),
                );

                *entry.insert(Box::leak(Box::new(thunk)))
            }
        }
    }

    #[inline(always)]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline(always)]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    #[inline(always)]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[inline(always)]
    pub fn strategy(&self) -> SearchStrategy {
        match &self.members {
            MemberTable::Linear(_) => SearchStrategy::Linear,
            MemberTable::Binary(_) => SearchStrategy::Binary,
        }
    }

    /// Searches the member by name in the thunk's scope.
    #[inline(always)]
    pub fn lookup(&self, name: &str) -> Option<&'static Member> {
        self.members.lookup(name)
    }

    /// Performs the operation on the `target` entity.
    ///
    /// For [Operation::Read], `arguments` is the key. For
    /// [Operation::Write], the key and the assigned value. For
    /// [Operation::Call], the call arguments.
    #[inline(always)]
    pub fn invoke(
        &'static self,
        lua: &Lua,
        target: &HostEntity,
        arguments: Vec<Value>,
    ) -> RuntimeResult<Vec<Value>> {
        (self.routine)(self, lua, target, arguments)
    }

    fn generate(key: TypeKey, scope: Scope, operation: Operation) -> Self {
        let binding = key.binding();
        let is_array = key.is::<HostArray>();

        let routine: Routine = match (scope, operation) {
            (Scope::Instance, Operation::Read) if is_array => read_array,
            (Scope::Instance, Operation::Write) if is_array => write_array,
            (_, Operation::Read) => read,
            (_, Operation::Write) => write,
            (Scope::Instance, Operation::Call) => call_instance,
            (Scope::Static, Operation::Call) if binding.generic_arity().is_some() => {
                instantiate_generic
            }
            (Scope::Static, Operation::Call) => construct,
        };

        Self {
            key,
            scope,
            operation,
            binding,
            members: MemberTable::new(binding.members(scope)),
            routine,
        }
    }

    fn unknown_member(&self, name: &str) -> RuntimeError {
        let suggestion = suggest(
            name,
            self.binding
                .members(self.scope)
                .keys()
                .map(|name| name.as_str()),
        );

        RuntimeError::UnknownMember {
            receiver_type: self.key.name(),
            scope: self.scope,
            member: CompactString::from(name),
            suggestion: suggestion.map(CompactString::from),
        }
    }

    fn invalid_key(&self, key: &Value) -> RuntimeError {
        RuntimeError::InvalidKey {
            receiver_type: self.key.name(),
            key: key.type_name(),
        }
    }

    fn default_indexer(&self) -> Option<&'static MemberRef<IndexerDecl>> {
        match self.binding.instance_member(DEFAULT_INDEXER)? {
            Member::IndexedProperty(member) => Some(member),
            _ => None,
        }
    }
}

fn read(
    thunk: &'static Thunk,
    lua: &Lua,
    target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    let key = arguments.into_iter().next().unwrap_or_default();
    let receiver = target.as_object();

    let name = match &key {
        Value::String(name) => name.to_string_lossy(),

        _ => {
            let (Some(receiver), Some(indexer)) = (receiver, thunk.default_indexer()) else {
                return Err(thunk.invalid_key(&key));
            };

            let Some(get) = indexer.decl.get else {
                return Err(RuntimeError::WriteOnly {
                    receiver_type: thunk.key.name(),
                    member: CompactString::from(DEFAULT_INDEXER),
                });
            };

            let indices = key_indices(lua, key.clone())?;

            return invoke_indexer(lua, indexer, receiver, get, indices, false);
        }
    };

    let name = name.as_ref();

    let Some(member) = thunk.lookup(name) else {
        return Err(thunk.unknown_member(name));
    };

    let value = match member {
        Member::Field(field) => {
            let mut invocation = Invocation::new(
                lua,
                field.owner,
                name,
                receiver.map(|object| (object, &field.path)),
                Vec::new(),
                &[],
            );

            guard(field.owner, name, || (field.decl.get)(&mut invocation))?
        }

        Member::Property(property) => {
            let Some(get) = &property.decl.get else {
                return Err(RuntimeError::WriteOnly {
                    receiver_type: thunk.key.name(),
                    member: CompactString::from(name),
                });
            };

            let mut invocation = Invocation::new(
                lua,
                property.owner,
                name,
                receiver.map(|object| (object, &property.path)),
                Vec::new(),
                &[],
            );

            guard(property.owner, name, || get(&mut invocation))?
        }

        Member::IndexedProperty(indexer) => match receiver {
            Some(receiver) => Value::host(IndexedPropertyWrapper::new(indexer, receiver.clone())),
            None => return Err(thunk.unknown_member(name)),
        },

        Member::Methods(group) => Value::host(MethodWrapper::new(
            thunk.key,
            group,
            receiver.cloned(),
            Vec::new(),
        )),

        Member::Event(event) => match receiver {
            Some(receiver) => Value::host(EventWrapper::new(event, receiver.clone())),
            None => return Err(thunk.unknown_member(name)),
        },

        Member::NestedType(key) => Value::from(*key),
    };

    Ok(vec![value])
}

fn write(
    thunk: &'static Thunk,
    lua: &Lua,
    target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    let mut arguments = arguments.into_iter();
    let key = arguments.next().unwrap_or_default();
    let value = arguments.next().unwrap_or_default();
    let receiver = target.as_object();

    let name = match &key {
        Value::String(name) => name.to_string_lossy(),

        _ => {
            let (Some(receiver), Some(indexer)) = (receiver, thunk.default_indexer()) else {
                return Err(thunk.invalid_key(&key));
            };

            let Some(set) = indexer.decl.set else {
                return Err(RuntimeError::ReadOnly {
                    receiver_type: thunk.key.name(),
                    member: CompactString::from(DEFAULT_INDEXER),
                });
            };

            let mut indices = key_indices(lua, key.clone())?;

            indices.push(value);

            let _ = invoke_indexer(lua, indexer, receiver, set, indices, true)?;

            return Ok(Vec::new());
        }
    };

    let name = name.as_ref();

    let Some(member) = thunk.lookup(name) else {
        return Err(thunk.unknown_member(name));
    };

    let (setter, hint, owner, path) = match member {
        Member::Field(field) => match &field.decl.set {
            Some(set) => (set, &field.decl.hint, field.owner, &field.path),
            None => {
                return Err(RuntimeError::ReadOnly {
                    receiver_type: thunk.key.name(),
                    member: CompactString::from(name),
                })
            }
        },

        Member::Property(property) => match &property.decl.set {
            Some(set) => (set, &property.decl.hint, property.owner, &property.path),
            None => {
                return Err(RuntimeError::ReadOnly {
                    receiver_type: thunk.key.name(),
                    member: CompactString::from(name),
                })
            }
        },

        other => {
            return Err(RuntimeError::NotAssignable {
                receiver_type: thunk.key.name(),
                member: CompactString::from(name),
                kind: other.kind(),
            })
        }
    };

    let Some(value) = coerce(&value, hint) else {
        return Err(type_mismatch(hint, &value));
    };

    let mut invocation = Invocation::new(
        lua,
        owner,
        name,
        receiver.map(|object| (object, path)),
        Vec::new(),
        &[],
    );

    guard(owner, name, || setter(&mut invocation, value))?;

    Ok(Vec::new())
}

fn read_array(
    thunk: &'static Thunk,
    lua: &Lua,
    target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    let Some(object) = target.as_object() else {
        return read(thunk, lua, target, arguments);
    };

    let key = arguments.first().cloned().unwrap_or_default();

    let Some(coordinates) = array_coordinates(lua, &key)? else {
        return read(thunk, lua, target, arguments);
    };

    let element = object.read(|array: &HostArray| array.get(&coordinates))??;

    Ok(vec![element])
}

fn write_array(
    thunk: &'static Thunk,
    lua: &Lua,
    target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    let Some(object) = target.as_object() else {
        return write(thunk, lua, target, arguments);
    };

    let key = arguments.first().cloned().unwrap_or_default();

    let Some(coordinates) = array_coordinates(lua, &key)? else {
        return write(thunk, lua, target, arguments);
    };

    let value = arguments.get(1).cloned().unwrap_or_default();

    object.write(|array: &mut HostArray| array.set(&coordinates, value))??;

    Ok(Vec::new())
}

fn call_instance(
    thunk: &'static Thunk,
    lua: &Lua,
    target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    let (Some(object), Some(invoke)) = (target.as_object(), thunk.binding.invoke()) else {
        return Err(RuntimeError::NotCallable {
            receiver_type: thunk.key.name(),
        });
    };

    guard(thunk.key, "invoke", || invoke(lua, object, arguments))
}

fn construct(
    thunk: &'static Thunk,
    lua: &Lua,
    _target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    resolve_and_invoke(
        lua,
        thunk.key,
        thunk.binding.constructors(),
        None,
        arguments,
        &[],
    )
}

fn instantiate_generic(
    thunk: &'static Thunk,
    _lua: &Lua,
    _target: &HostEntity,
    arguments: Vec<Value>,
) -> RuntimeResult<Vec<Value>> {
    let (Some(arity), Some(instantiate)) = (
        thunk.binding.generic_arity(),
        thunk.binding.instantiate(),
    ) else {
        return Err(RuntimeError::NotCallable {
            receiver_type: thunk.key.name(),
        });
    };

    if arguments.len() != arity {
        return Err(RuntimeError::GenericArity {
            receiver_type: thunk.key.name(),
            expected: arity,
            actual: arguments.len(),
        });
    }

    let mut type_arguments = Vec::with_capacity(arity);

    for argument in &arguments {
        match argument.as_type() {
            Some(key) => type_arguments.push(key),
            None => return Err(type_mismatch(&TypeHint::Type, argument)),
        }
    }

    match instantiate(&type_arguments) {
        Some(closed) => Ok(vec![Value::from(closed)]),

        None => Err(RuntimeError::GenericInstantiation {
            receiver_type: thunk.key.name(),
            arguments: type_arguments.iter().map(|key| key.name()).collect(),
        }),
    }
}

/// Calls the getter or the setter of an indexed property with the
/// uncoerced index arguments (followed by the value for the setter).
pub(crate) fn invoke_indexer(
    lua: &Lua,
    indexer: &'static MemberRef<IndexerDecl>,
    receiver: &HostObject,
    body: MethodBody,
    arguments: Vec<Value>,
    is_setter: bool,
) -> RuntimeResult<Vec<Value>> {
    let decl = &indexer.decl;

    let signature = match is_setter {
        true => decl.setter_signature(),
        false => decl.indices.clone(),
    };

    let Some(resolution) = score(&signature, &arguments) else {
        return Err(RuntimeError::NoMatchingOverload {
            receiver_type: indexer.owner.name(),
            member: CompactString::from(decl.name.as_str()),
            arguments: arguments.iter().map(Value::type_name).collect(),
        });
    };

    let mut invocation = Invocation::new(
        lua,
        indexer.owner,
        decl.name.as_str(),
        Some((receiver, &indexer.path)),
        resolution.arguments,
        &[],
    );

    let result = guard(indexer.owner, decl.name.as_str(), || body(&mut invocation))?;

    Ok(vec![result])
}

// A table key stands for the list of its sequence elements.
fn key_indices(lua: &Lua, key: Value) -> RuntimeResult<Vec<Value>> {
    match key {
        Value::Guest(GuestObject::Table(table)) => table.sequence(lua),
        other => Ok(vec![other]),
    }
}

fn array_coordinates(lua: &Lua, key: &Value) -> RuntimeResult<Option<Vec<i64>>> {
    match key {
        Value::Integer(index) => Ok(Some(vec![*index])),

        Value::Number(number) if number.fract() == 0.0 => Ok(Some(vec![*number as i64])),

        Value::Guest(GuestObject::Table(table)) => {
            let mut coordinates = Vec::new();

            for element in table.sequence(lua)? {
                match element {
                    Value::Integer(index) => coordinates.push(index),
                    other => return Err(type_mismatch(&TypeHint::I64, &other)),
                }
            }

            Ok(Some(coordinates))
        }

        _ => Ok(None),
    }
}
