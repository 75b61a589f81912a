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
    fmt::{Debug, Formatter},
    sync::{Arc, Mutex},
};

use ahash::AHashMap;
use lady_deirdre::sync::Lazy;
use log::debug;

use crate::{
    report::system_panic,
    runtime::{
        builder::{
            DisplayFn,
            DraftMember,
            EventDecl,
            FieldDecl,
            IndexerDecl,
            InvokeBody,
            MethodDecl,
            Param,
            PropertyDecl,
            TypeKind,
        },
        object::UpcastPath,
        ops::Operator,
        thunk::Scope,
        Ident,
        RustOrigin,
        TypeKey,
    },
};

static BINDINGS: Lazy<Mutex<AHashMap<TypeId, &'static TypeBinding>>> =
    Lazy::new(|| Mutex::new(AHashMap::new()));

/// A member declaration reachable from a type, together with the projection
/// from the type's data to the declaring type's data.
pub struct MemberRef<D> {
    pub(crate) decl: Arc<D>,
    pub(crate) path: UpcastPath,
    pub(crate) owner: TypeKey,
}

impl<D> Clone for MemberRef<D> {
    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            decl: self.decl.clone(),
            path: self.path.clone(),
            owner: self.owner,
        }
    }
}

impl<D> MemberRef<D> {
    #[inline(always)]
    pub fn decl(&self) -> &D {
        &self.decl
    }

    /// The type that declares the member.
    #[inline(always)]
    pub fn owner(&self) -> TypeKey {
        self.owner
    }

    /// Returns true if the member is declared by an ancestor type.
    #[inline(always)]
    pub fn is_inherited(&self) -> bool {
        self.path.depth() > 0
    }

    fn rebase(&self, step: &UpcastPath) -> Self {
        Self {
            decl: self.decl.clone(),
            path: step.join(&self.path),
            owner: self.owner,
        }
    }
}

/// A single overload of a [MethodGroup].
#[derive(Clone)]
pub struct Candidate {
    pub(crate) decl: Arc<MethodDecl>,
    pub(crate) path: UpcastPath,
}

impl Candidate {
    #[inline(always)]
    pub fn decl(&self) -> &MethodDecl {
        &self.decl
    }
}

/// Overloads sharing the same name, in declaration order. Overloads
/// inherited from ancestor types follow the type's own overloads.
#[derive(Clone)]
pub struct MethodGroup {
    pub(crate) name: Ident,
    pub(crate) owner: TypeKey,
    pub(crate) constructor: bool,
    pub(crate) candidates: Vec<Candidate>,
}

impl Debug for MethodGroup {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let signatures = self
            .candidates
            .iter()
            .map(|candidate| &candidate.decl.signature)
            .collect::<Vec<_>>();

        formatter
            .debug_struct("MethodGroup")
            .field("name", &self.name)
            .field("candidates", &signatures)
            .finish()
    }
}

impl MethodGroup {
    #[inline(always)]
    pub fn name(&self) -> &Ident {
        &self.name
    }

    #[inline(always)]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Returns true if any overload requires explicit type arguments.
    #[inline]
    pub fn is_generic(&self) -> bool {
        self.candidates
            .iter()
            .any(|candidate| candidate.decl.signature.type_params > 0)
    }

    fn rebase(&self, step: &UpcastPath) -> Self {
        Self {
            name: self.name.clone(),
            owner: self.owner,
            constructor: self.constructor,
            candidates: self
                .candidates
                .iter()
                .map(|candidate| Candidate {
                    decl: candidate.decl.clone(),
                    path: step.join(&candidate.path),
                })
                .collect(),
        }
    }
}

/// A member of a host type as seen by the guest.
#[derive(Clone)]
pub enum Member {
    Field(MemberRef<FieldDecl>),
    Property(MemberRef<PropertyDecl>),
    IndexedProperty(MemberRef<IndexerDecl>),
    Methods(MethodGroup),
    Event(MemberRef<EventDecl>),
    NestedType(TypeKey),
}

impl Member {
    /// A user-facing name of the member kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Field(_) => "field",
            Self::Property(_) => "property",
            Self::IndexedProperty(_) => "indexed property",
            Self::Methods(_) => "method",
            Self::Event(_) => "event",
            Self::NestedType(_) => "nested type",
        }
    }

    fn rebase(&self, step: &UpcastPath) -> Self {
        match self {
            Self::Field(member) => Self::Field(member.rebase(step)),
            Self::Property(member) => Self::Property(member.rebase(step)),
            Self::IndexedProperty(member) => Self::IndexedProperty(member.rebase(step)),
            Self::Methods(group) => Self::Methods(group.rebase(step)),
            Self::Event(member) => Self::Event(member.rebase(step)),
            Self::NestedType(key) => Self::NestedType(*key),
        }
    }
}

/// The cached reflection of a [HostType](crate::runtime::HostType).
///
/// The binding is built once per process on first request and lives for the
/// rest of the process. Concurrent first requests for the same type may build
/// the binding more than once, but exactly one result is cached and returned
/// to every caller.
///
/// Instance members include the instance members of all ancestor types,
/// except those hidden by a member of the same name declared closer to the
/// type. Static members include nested types and operator overloads.
pub struct TypeBinding {
    key: TypeKey,
    kind: TypeKind,
    base: Option<TypeKey>,
    ancestors: Vec<(TypeKey, UpcastPath)>,
    instance: AHashMap<Ident, Member>,
    statics: AHashMap<Ident, Member>,
    constructors: MethodGroup,
    operators: AHashMap<Operator, MethodGroup>,
    invoke: Option<InvokeBody>,
    display: Option<(DisplayFn, UpcastPath)>,
}

impl Debug for TypeBinding {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let mut instance = self.instance.keys().collect::<Vec<_>>();
        let mut statics = self.statics.keys().collect::<Vec<_>>();

        instance.sort();
        statics.sort();

        formatter
            .debug_struct("TypeBinding")
            .field("type", &self.key)
            .field("kind", &self.kind)
            .field("instance", &instance)
            .field("statics", &statics)
            .finish()
    }
}

impl TypeBinding {
    /// Returns the binding of the `key` type, building it on first request.
    pub fn of(key: TypeKey) -> &'static Self {
        {
            let bindings = BINDINGS
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());

            if let Some(binding) = bindings.get(&key.id()) {
                return *binding;
            }
        }

        // Base type bindings are requested recursively while building, so the
        // build runs outside of the lock.
        let binding = Self::build(key);

        let mut bindings = BINDINGS
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        match bindings.entry(key.id()) {
            Entry::Occupied(entry) => *entry.get(),

            Entry::Vacant(entry) => {
                debug!(
                    "Type '{key}' bound: {} instance and {} static members.",
                    binding.instance.len(),
                    binding.statics.len(),
                );

                *entry.insert(Box::leak(Box::new(binding)))
            }
        }
    }

    #[inline(always)]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline(always)]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline(always)]
    pub fn base(&self) -> Option<TypeKey> {
        self.base
    }

    #[inline(always)]
    pub fn is_value_type(&self) -> bool {
        matches!(self.kind, TypeKind::Value)
    }

    /// Returns the number of type parameters of a generic type definition.
    #[inline]
    pub fn generic_arity(&self) -> Option<usize> {
        match self.kind {
            TypeKind::Generic { arity, .. } => Some(arity),
            _ => None,
        }
    }

    /// Returns true if this type is `key` or derives from it.
    #[inline]
    pub fn is_subtype_of(&self, key: TypeKey) -> bool {
        self.ancestors.iter().any(|(ancestor, _)| *ancestor == key)
    }

    #[inline]
    pub fn instance_member(&self, name: &str) -> Option<&Member> {
        self.instance.get(name)
    }

    #[inline]
    pub fn static_member(&self, name: &str) -> Option<&Member> {
        self.statics.get(name)
    }

    #[inline(always)]
    pub fn constructors(&self) -> &MethodGroup {
        &self.constructors
    }

    #[inline(always)]
    pub fn operator(&self, operator: Operator) -> Option<&MethodGroup> {
        self.operators.get(&operator)
    }

    #[inline(always)]
    pub fn is_callable(&self) -> bool {
        self.invoke.is_some()
    }

    /// The number of members visible in the scope.
    #[inline(always)]
    pub fn member_count(&self, scope: Scope) -> usize {
        self.members(scope).len()
    }

    #[inline(always)]
    pub(crate) fn members(&self, scope: Scope) -> &AHashMap<Ident, Member> {
        match scope {
            Scope::Instance => &self.instance,
            Scope::Static => &self.statics,
        }
    }

    #[inline(always)]
    pub(crate) fn upcast_path(&self, id: TypeId) -> Option<&UpcastPath> {
        self.ancestors
            .iter()
            .find(|(ancestor, _)| ancestor.id() == id)
            .map(|(_, path)| path)
    }

    #[inline(always)]
    pub(crate) fn invoke(&self) -> Option<InvokeBody> {
        self.invoke
    }

    #[inline(always)]
    pub(crate) fn display(&self) -> Option<(&DisplayFn, &UpcastPath)> {
        self.display.as_ref().map(|(display, path)| (display, path))
    }

    #[inline(always)]
    pub(crate) fn instantiate(&self) -> Option<fn(&[TypeKey]) -> Option<TypeKey>> {
        match self.kind {
            TypeKind::Generic { instantiate, .. } => Some(instantiate),
            _ => None,
        }
    }

    fn build(key: TypeKey) -> Self {
        let draft = key.draft();

        let mut binding = Self {
            key,
            kind: draft.kind,
            base: None,
            ancestors: vec![(key, UpcastPath::default())],
            instance: AHashMap::new(),
            statics: AHashMap::new(),
            constructors: MethodGroup {
                name: Ident::new(key.name()),
                owner: key,
                constructor: true,
                candidates: Vec::new(),
            },
            operators: AHashMap::new(),
            invoke: draft.invoke,
            display: draft.display.map(|display| (display, UpcastPath::default())),
        };

        if let Some(base) = draft.base {
            let base_binding = base.key.binding();
            let step = UpcastPath::step(base.projection);

            binding.base = Some(base.key);

            for (ancestor, path) in &base_binding.ancestors {
                if *ancestor == key {
                    system_panic!("Type '{key}' is its own ancestor.");
                }

                binding.ancestors.push((*ancestor, step.join(path)));
            }

            for (name, member) in &base_binding.instance {
                let _ = binding.instance.insert(name.clone(), member.rebase(&step));
            }

            if binding.invoke.is_none() {
                binding.invoke = base_binding.invoke;
            }

            if binding.display.is_none() {
                if let Some((display, path)) = &base_binding.display {
                    binding.display = Some((display.clone(), step.join(path)));
                }
            }
        }

        let mut own_instance = OwnMembers::new(key);
        let mut own_statics = OwnMembers::new(key);

        for member in draft.members {
            if member.ignored {
                continue;
            }

            match member.decl.is_static() {
                true => own_statics.insert(member.decl),
                false => own_instance.insert(member.decl),
            }
        }

        for (name, member) in own_instance.members {
            let member = match (member, binding.instance.remove(&name)) {
                (Member::Methods(mut own), Some(Member::Methods(inherited))) => {
                    own.candidates.extend(inherited.candidates);

                    Member::Methods(own)
                }

                (member, _) => member,
            };

            let _ = binding.instance.insert(name, member);
        }

        binding.statics = own_statics.members;

        for (name, member) in &binding.statics {
            let Member::Methods(group) = member else {
                continue;
            };

            if let Some(operator) = Operator::from_method_name(name.as_str()) {
                let _ = binding.operators.insert(operator, group.clone());
            }
        }

        if let Some(base) = binding.base {
            for (operator, group) in &base.binding().operators {
                if !binding.operators.contains_key(operator) {
                    let _ = binding.operators.insert(*operator, group.clone());
                }
            }
        }

        for constructor in draft.constructors {
            if constructor.ignored {
                continue;
            }

            binding.constructors.candidates.push(Candidate {
                decl: Arc::new(constructor.decl),
                path: UpcastPath::default(),
            });
        }

        binding
    }
}

struct OwnMembers {
    key: TypeKey,
    members: AHashMap<Ident, Member>,
    origins: AHashMap<Ident, RustOrigin>,
}

impl OwnMembers {
    fn new(key: TypeKey) -> Self {
        Self {
            key,
            members: AHashMap::new(),
            origins: AHashMap::new(),
        }
    }

    fn insert(&mut self, decl: DraftMember) {
        let name = decl.name().clone();
        let origin = *decl.origin();

        if let Some(previous) = self.members.get_mut(&name) {
            if let (Member::Methods(group), DraftMember::Method(decl)) = (&mut *previous, &decl) {
                if group.candidates.iter().any(|candidate| {
                    same_params(&candidate.decl.signature.params, &decl.signature.params)
                        && candidate.decl.signature.type_params == decl.signature.type_params
                }) {
                    origin.blame::<()>(&format!(
                        "Method '{}.{name}' has two overloads with the same parameters.",
                        self.key,
                    ));
                }
            } else {
                let previous_origin = self.origins.get(&name).copied().unwrap_or(origin);

                origin.blame::<()>(&format!(
                    "Member '{}.{name}' conflicts with the {} declared at {previous_origin}.",
                    self.key,
                    previous.kind(),
                ));
            }
        }

        let path = UpcastPath::default();
        let owner = self.key;

        let member = match decl {
            DraftMember::Field(decl) => Member::Field(MemberRef {
                decl: Arc::new(decl),
                path,
                owner,
            }),

            DraftMember::Property(decl) => Member::Property(MemberRef {
                decl: Arc::new(decl),
                path,
                owner,
            }),

            DraftMember::Indexer(decl) => Member::IndexedProperty(MemberRef {
                decl: Arc::new(decl),
                path,
                owner,
            }),

            DraftMember::Event(decl) => Member::Event(MemberRef {
                decl: Arc::new(decl),
                path,
                owner,
            }),

            DraftMember::Nested(decl) => Member::NestedType(decl.key),

            DraftMember::Method(decl) => {
                let candidate = Candidate {
                    decl: Arc::new(decl),
                    path,
                };

                if let Some(Member::Methods(group)) = self.members.get_mut(&name) {
                    group.candidates.push(candidate);

                    return;
                }

                Member::Methods(MethodGroup {
                    name: name.clone(),
                    owner,
                    constructor: false,
                    candidates: vec![candidate],
                })
            }
        };

        let _ = self.origins.insert(name.clone(), origin);
        let _ = self.members.insert(name, member);
    }
}

fn same_params(a: &[Param], b: &[Param]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(a, b)| a.hint == b.hint && a.mode == b.mode && a.variadic == b.variadic)
}
