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
    any::Any,
    fmt::{Debug, Display, Formatter},
    marker::PhantomData,
    sync::Arc,
};

use mlua::Lua;

use crate::{
    runtime::{
        object::{BaseProjection, Projection},
        ops::Operator,
        Downcast,
        HostObject,
        HostType,
        Ident,
        Invocation,
        LuaFunction,
        RuntimeResult,
        RustOrigin,
        TypeHint,
        TypeKey,
        Upcast,
        Value,
    },
};

/// A body of a host method, constructor, or indexed property accessor.
///
/// The function receives the coerced arguments through the [Invocation]
/// object and returns the primary result ([Value::Nil] for methods without a
/// return value).
pub type MethodBody = fn(&mut Invocation<'_>) -> RuntimeResult<Value>;

/// A body of the callable-instance operator: `object(arguments...)`.
///
/// Unlike [MethodBody], the arguments are passed as supplied by the guest,
/// without overload resolution.
pub type InvokeBody = fn(&Lua, &HostObject, Vec<Value>) -> RuntimeResult<Vec<Value>>;

/// An instantiation function of a generic type definition.
///
/// Receives the type arguments (their number equals the declared arity) and
/// returns the closed type, or None if the arguments are not supported.
pub type Instantiate = fn(&[TypeKey]) -> Option<TypeKey>;

pub(crate) type Getter = Arc<dyn Fn(&mut Invocation<'_>) -> RuntimeResult<Value> + Send + Sync>;

pub(crate) type Setter =
    Arc<dyn Fn(&mut Invocation<'_>, Value) -> RuntimeResult<()> + Send + Sync>;

pub(crate) type EventHandler =
    Arc<dyn Fn(&mut Invocation<'_>, LuaFunction) -> RuntimeResult<()> + Send + Sync>;

pub(crate) type DisplayFn = Arc<dyn Fn(&dyn Any) -> String + Send + Sync>;

#[inline(always)]
fn getter(
    body: impl Fn(&mut Invocation<'_>) -> RuntimeResult<Value> + Send + Sync + 'static,
) -> Getter {
    Arc::new(body)
}

#[inline(always)]
fn setter(
    body: impl Fn(&mut Invocation<'_>, Value) -> RuntimeResult<()> + Send + Sync + 'static,
) -> Setter {
    Arc::new(body)
}

#[inline(always)]
fn event_handler(
    body: impl Fn(&mut Invocation<'_>, LuaFunction) -> RuntimeResult<()> + Send + Sync + 'static,
) -> EventHandler {
    Arc::new(body)
}

/// A kind of a host type.
#[derive(Clone, Copy)]
pub enum TypeKind {
    /// A reference type. Nil is accepted where the type is expected.
    Class,

    /// A value type. Nil is rejected where the type is expected.
    Value,

    /// An open generic type definition. Calling the type reference with type
    /// arguments instantiates a closed type.
    Generic {
        /// The number of type parameters.
        arity: usize,

        /// Produces the closed type.
        instantiate: Instantiate,
    },
}

impl Debug for TypeKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Class => formatter.write_str("Class"),
            Self::Value => formatter.write_str("Value"),
            Self::Generic { arity, .. } => formatter.write_fmt(format_args!("Generic({arity})")),
        }
    }
}

/// A passing mode of a method parameter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParamMode {
    /// The argument is passed in.
    In,

    /// The argument is passed in, and its final value is returned to the
    /// guest as an additional result.
    Ref,

    /// The guest does not supply the argument. The host sets it through
    /// [Invocation::set_output], and its value is returned to the guest as an
    /// additional result.
    Out,
}

/// A formal parameter of a host method.
#[derive(Clone)]
pub struct Param {
    pub(crate) name: Ident,
    pub(crate) hint: TypeHint,
    pub(crate) mode: ParamMode,
    pub(crate) default: Option<fn() -> Value>,
    pub(crate) variadic: bool,
}

impl Debug for Param {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Param {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            ParamMode::In => (),
            ParamMode::Ref => formatter.write_str("ref ")?,
            ParamMode::Out => formatter.write_str("out ")?,
        }

        if self.variadic {
            formatter.write_str("...")?;
        }

        formatter.write_fmt(format_args!("{}: {}", self.name, self.hint))?;

        if self.default.is_some() {
            formatter.write_str(" = default")?;
        }

        Ok(())
    }
}

impl Param {
    #[inline(always)]
    pub fn name(&self) -> &Ident {
        &self.name
    }

    /// The coercion target. For the variadic parameter, the element type.
    #[inline(always)]
    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }

    #[inline(always)]
    pub fn mode(&self) -> ParamMode {
        self.mode
    }

    #[inline(always)]
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }

    #[inline(always)]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }
}

/// A formal parameter list of a host method, together with its return type
/// and the number of generic type parameters.
///
/// ```ignore
/// let signature = Signature::new()
///     .param::<i64>("x")
///     .optional::<i64>("y", || Value::Integer(0))
///     .out::<bool>("clamped")
///     .returns::<i64>();
/// ```
#[derive(Clone, Default)]
pub struct Signature {
    pub(crate) params: Vec<Param>,
    pub(crate) returns: Option<TypeHint>,
    pub(crate) type_params: usize,
}

impl Debug for Signature {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, formatter)
    }
}

impl Display for Signature {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.type_params > 0 {
            formatter.write_fmt(format_args!("<{}>", self.type_params))?;
        }

        formatter.write_str("(")?;

        let mut first = true;

        for param in &self.params {
            if !first {
                formatter.write_str(", ")?;
            }

            first = false;

            Display::fmt(param, formatter)?;
        }

        formatter.write_str(")")?;

        if let Some(returns) = &self.returns {
            formatter.write_fmt(format_args!(" -> {returns}"))?;
        }

        Ok(())
    }
}

impl Signature {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a required parameter.
    #[track_caller]
    pub fn param<T: Downcast>(self, name: &str) -> Self {
        self.push(name, <T as Downcast>::hint(), ParamMode::In, None, false)
    }

    /// Appends a required parameter with an explicit coercion target.
    #[track_caller]
    pub fn param_hint(self, name: &str, hint: TypeHint) -> Self {
        self.push(name, hint, ParamMode::In, None, false)
    }

    /// Appends a parameter that takes the `default` value when the guest
    /// does not supply it.
    #[track_caller]
    pub fn optional<T: Downcast>(self, name: &str, default: fn() -> Value) -> Self {
        self.push(
            name,
            <T as Downcast>::hint(),
            ParamMode::In,
            Some(default),
            false,
        )
    }

    /// Appends a by-reference parameter.
    #[track_caller]
    pub fn by_ref<T: Downcast>(self, name: &str) -> Self {
        self.push(name, <T as Downcast>::hint(), ParamMode::Ref, None, false)
    }

    /// Appends an output-only parameter.
    #[track_caller]
    pub fn out<T: Downcast>(self, name: &str) -> Self {
        self.push(name, <T as Downcast>::hint(), ParamMode::Out, None, false)
    }

    /// Appends the trailing variadic parameter with `T` elements.
    ///
    /// The body receives the packed arguments as a
    /// [HostArray](crate::exports::HostArray) object, readable as `Vec<T>`.
    #[track_caller]
    pub fn variadic<T: Downcast>(self, name: &str) -> Self {
        self.push(name, <T as Downcast>::hint(), ParamMode::In, None, true)
    }

    /// Appends the trailing variadic parameter with an explicit element
    /// type.
    #[track_caller]
    pub fn variadic_hint(self, name: &str, element: TypeHint) -> Self {
        self.push(name, element, ParamMode::In, None, true)
    }

    /// Declares the return type.
    #[inline(always)]
    pub fn returns<T: Upcast>(mut self) -> Self {
        self.returns = Some(<T as Upcast>::hint());
        self
    }

    /// Declares the number of generic type parameters. The guest must supply
    /// exactly this number of type arguments to call the method.
    #[inline(always)]
    pub fn generic(mut self, type_params: usize) -> Self {
        self.type_params = type_params;
        self
    }

    #[inline(always)]
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    #[inline(always)]
    pub fn return_hint(&self) -> Option<&TypeHint> {
        self.returns.as_ref()
    }

    #[inline(always)]
    pub fn type_params(&self) -> usize {
        self.type_params
    }

    #[track_caller]
    fn push(
        mut self,
        name: &str,
        hint: TypeHint,
        mode: ParamMode,
        default: Option<fn() -> Value>,
        variadic: bool,
    ) -> Self {
        let origin = RustOrigin::here();

        if self.params.last().map(|param| param.variadic).unwrap_or(false) {
            origin.blame::<()>(&format!(
                "Parameter '{name}' is declared after the variadic parameter."
            ));
        }

        if self.params.iter().any(|param| param.name.as_str() == name) {
            origin.blame::<()>(&format!("Duplicate parameter '{name}'."));
        }

        self.params.push(Param {
            name: Ident::new(name),
            hint,
            mode,
            default,
            variadic,
        });

        self
    }
}

/// A field of a host type.
pub struct FieldDecl {
    pub(crate) name: Ident,
    pub(crate) hint: TypeHint,
    pub(crate) is_static: bool,
    pub(crate) get: Getter,
    pub(crate) set: Option<Setter>,
    pub(crate) origin: RustOrigin,
}

impl FieldDecl {
    #[inline(always)]
    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }

    #[inline(always)]
    pub fn is_read_only(&self) -> bool {
        self.set.is_none()
    }
}

/// A plain (non-indexed) property of a host type.
pub struct PropertyDecl {
    pub(crate) name: Ident,
    pub(crate) hint: TypeHint,
    pub(crate) get: Option<Getter>,
    pub(crate) set: Option<Setter>,
    pub(crate) origin: RustOrigin,
}

impl PropertyDecl {
    #[inline(always)]
    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }

    #[inline(always)]
    pub fn is_readable(&self) -> bool {
        self.get.is_some()
    }

    #[inline(always)]
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

/// An indexed property of a host type.
///
/// The getter receives the index arguments. The setter receives the index
/// arguments followed by the assigned value.
pub struct IndexerDecl {
    pub(crate) name: Ident,
    pub(crate) hint: TypeHint,
    pub(crate) indices: Signature,
    pub(crate) get: Option<MethodBody>,
    pub(crate) set: Option<MethodBody>,
    pub(crate) origin: RustOrigin,
}

impl IndexerDecl {
    #[inline(always)]
    pub fn hint(&self) -> &TypeHint {
        &self.hint
    }

    #[inline(always)]
    pub fn indices(&self) -> &Signature {
        &self.indices
    }

    /// The parameter list of the setter: the indices and the value.
    pub(crate) fn setter_signature(&self) -> Signature {
        let mut signature = self.indices.clone();

        signature.params.push(Param {
            name: Ident::new("value"),
            hint: self.hint.clone(),
            mode: ParamMode::In,
            default: None,
            variadic: false,
        });

        signature
    }
}

/// A method or constructor of a host type.
pub struct MethodDecl {
    pub(crate) name: Ident,
    pub(crate) signature: Signature,
    pub(crate) is_static: bool,
    pub(crate) body: MethodBody,
    pub(crate) origin: RustOrigin,
}

impl MethodDecl {
    #[inline(always)]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[inline(always)]
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    #[inline(always)]
    pub fn origin(&self) -> &RustOrigin {
        &self.origin
    }
}

/// An event of a host type.
pub struct EventDecl {
    pub(crate) name: Ident,
    pub(crate) add: EventHandler,
    pub(crate) remove: EventHandler,
    pub(crate) origin: RustOrigin,
}

pub(crate) struct NestedDecl {
    pub(crate) name: Ident,
    pub(crate) key: TypeKey,
    pub(crate) origin: RustOrigin,
}

pub(crate) enum DraftMember {
    Field(FieldDecl),
    Property(PropertyDecl),
    Indexer(IndexerDecl),
    Method(MethodDecl),
    Event(EventDecl),
    Nested(NestedDecl),
}

impl DraftMember {
    #[inline]
    pub(crate) fn name(&self) -> &Ident {
        match self {
            Self::Field(decl) => &decl.name,
            Self::Property(decl) => &decl.name,
            Self::Indexer(decl) => &decl.name,
            Self::Method(decl) => &decl.name,
            Self::Event(decl) => &decl.name,
            Self::Nested(decl) => &decl.name,
        }
    }

    #[inline]
    pub(crate) fn origin(&self) -> &RustOrigin {
        match self {
            Self::Field(decl) => &decl.origin,
            Self::Property(decl) => &decl.origin,
            Self::Indexer(decl) => &decl.origin,
            Self::Method(decl) => &decl.origin,
            Self::Event(decl) => &decl.origin,
            Self::Nested(decl) => &decl.origin,
        }
    }

    #[inline]
    pub(crate) fn is_static(&self) -> bool {
        match self {
            Self::Field(decl) => decl.is_static,
            Self::Method(decl) => decl.is_static,
            Self::Nested(_) => true,
            Self::Property(_) | Self::Indexer(_) | Self::Event(_) => false,
        }
    }
}

pub(crate) struct Draft<D> {
    pub(crate) decl: D,
    pub(crate) ignored: bool,
}

pub(crate) struct BaseDecl {
    pub(crate) key: TypeKey,
    pub(crate) projection: Arc<dyn Projection>,
}

/// A raw description of a host type collected by [TypeBuilder].
pub struct TypeDraft {
    pub(crate) kind: TypeKind,
    pub(crate) base: Option<BaseDecl>,
    pub(crate) members: Vec<Draft<DraftMember>>,
    pub(crate) constructors: Vec<Draft<MethodDecl>>,
    pub(crate) invoke: Option<InvokeBody>,
    pub(crate) display: Option<DisplayFn>,
}

pub(crate) fn draft_of<T: HostType>() -> TypeDraft {
    let mut builder = TypeBuilder::<T> {
        draft: TypeDraft {
            kind: TypeKind::Class,
            base: None,
            members: Vec::new(),
            constructors: Vec::new(),
            invoke: None,
            display: None,
        },
        marker: PhantomData,
    };

    T::describe(&mut builder);

    builder.draft
}

/// A handle to a just-declared member.
pub struct Declaration<'a> {
    ignored: &'a mut bool,
}

impl<'a> Declaration<'a> {
    /// Excludes the member from the type's binding.
    ///
    /// Ignored members are invisible to the guest.
    #[inline(always)]
    pub fn ignore(self) {
        *self.ignored = true;
    }
}

/// Collects the members of a [HostType].
///
/// All declaration functions capture the caller's source location. A
/// malformed declaration is a defect of the registering code, reported by a
/// panic that points to the declaration.
pub struct TypeBuilder<T: HostType> {
    draft: TypeDraft,
    marker: PhantomData<fn() -> T>,
}

impl<T: HostType> TypeBuilder<T> {
    /// Marks the type as a value type.
    #[inline(always)]
    pub fn value_type(&mut self) -> &mut Self {
        self.draft.kind = TypeKind::Value;
        self
    }

    /// Marks the type as an open generic type definition.
    #[inline(always)]
    pub fn generic(&mut self, arity: usize, instantiate: Instantiate) -> &mut Self {
        self.draft.kind = TypeKind::Generic { arity, instantiate };
        self
    }

    /// Declares the base type `B`.
    ///
    /// The projections give access to the `B` part of `T` data. The instance
    /// members of `B` and of its ancestors become members of `T` unless `T`
    /// declares members with the same names.
    #[track_caller]
    pub fn base<B: HostType>(&mut self, by_ref: fn(&T) -> &B, by_mut: fn(&mut T) -> &mut B) -> &mut Self {
        let origin = RustOrigin::here();

        if T::type_key() == B::type_key() {
            origin.blame::<()>(&format!("Type '{}' cannot derive from itself.", T::NAME));
        }

        if let Some(base) = &self.draft.base {
            origin.blame::<()>(&format!(
                "Type '{}' already derives from '{}'.",
                T::NAME,
                base.key,
            ));
        }

        self.draft.base = Some(BaseDecl {
            key: B::type_key(),
            projection: Arc::new(BaseProjection { by_ref, by_mut }),
        });

        self
    }

    /// Declares a constructor.
    ///
    /// The body returns the constructed object.
    #[track_caller]
    pub fn constructor(&mut self, signature: Signature, body: MethodBody) -> Declaration<'_> {
        let decl = MethodDecl {
            name: Ident::new(T::NAME),
            signature,
            is_static: true,
            body,
            origin: RustOrigin::here(),
        };

        self.draft.constructors.push(Draft {
            decl,
            ignored: false,
        });

        let last = self.draft.constructors.len() - 1;

        Declaration {
            ignored: &mut self.draft.constructors[last].ignored,
        }
    }

    /// Declares an instance method overload.
    #[track_caller]
    pub fn method(&mut self, name: &str, signature: Signature, body: MethodBody) -> Declaration<'_> {
        self.push(DraftMember::Method(MethodDecl {
            name: Ident::new(name),
            signature,
            is_static: false,
            body,
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a static method overload.
    #[track_caller]
    pub fn static_method(
        &mut self,
        name: &str,
        signature: Signature,
        body: MethodBody,
    ) -> Declaration<'_> {
        self.push(DraftMember::Method(MethodDecl {
            name: Ident::new(name),
            signature,
            is_static: true,
            body,
            origin: RustOrigin::here(),
        }))
    }

    /// Declares an operator overload: a static method with the operator's
    /// conventional name.
    #[track_caller]
    pub fn operator(
        &mut self,
        operator: Operator,
        signature: Signature,
        body: MethodBody,
    ) -> Declaration<'_> {
        self.static_method(operator.method_name(), signature, body)
    }

    /// Declares a read-write instance field.
    #[track_caller]
    pub fn field<F: Downcast + Upcast>(
        &mut self,
        name: &str,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> Declaration<'_> {
        self.push(DraftMember::Field(FieldDecl {
            name: Ident::new(name),
            hint: <F as Downcast>::hint(),
            is_static: false,
            get: Self::instance_getter(get),
            set: Some(Self::instance_setter(set)),
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a read-only instance field.
    #[track_caller]
    pub fn readonly_field<F: Upcast + 'static>(&mut self, name: &str, get: fn(&T) -> F) -> Declaration<'_> {
        self.push(DraftMember::Field(FieldDecl {
            name: Ident::new(name),
            hint: <F as Upcast>::hint(),
            is_static: false,
            get: Self::instance_getter(get),
            set: None,
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a read-write static field.
    #[track_caller]
    pub fn static_field<F: Downcast + Upcast>(
        &mut self,
        name: &str,
        get: fn() -> F,
        set: fn(F),
    ) -> Declaration<'_> {
        self.push(DraftMember::Field(FieldDecl {
            name: Ident::new(name),
            hint: <F as Downcast>::hint(),
            is_static: true,
            get: getter(move |_| get().upcast()),
            set: Some(setter(move |_, value| {
                set(F::downcast(value)?);

                Ok(())
            })),
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a static constant.
    #[track_caller]
    pub fn constant<F: Upcast + 'static>(&mut self, name: &str, get: fn() -> F) -> Declaration<'_> {
        self.push(DraftMember::Field(FieldDecl {
            name: Ident::new(name),
            hint: <F as Upcast>::hint(),
            is_static: true,
            get: getter(move |_| get().upcast()),
            set: None,
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a read-write property.
    #[track_caller]
    pub fn property<F: Downcast + Upcast>(
        &mut self,
        name: &str,
        get: fn(&T) -> F,
        set: fn(&mut T, F),
    ) -> Declaration<'_> {
        self.push(DraftMember::Property(PropertyDecl {
            name: Ident::new(name),
            hint: <F as Downcast>::hint(),
            get: Some(Self::instance_getter(get)),
            set: Some(Self::instance_setter(set)),
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a read-only property.
    #[track_caller]
    pub fn getter<F: Upcast + 'static>(&mut self, name: &str, get: fn(&T) -> F) -> Declaration<'_> {
        self.push(DraftMember::Property(PropertyDecl {
            name: Ident::new(name),
            hint: <F as Upcast>::hint(),
            get: Some(Self::instance_getter(get)),
            set: None,
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a write-only property.
    #[track_caller]
    pub fn setter<F: Downcast>(&mut self, name: &str, set: fn(&mut T, F)) -> Declaration<'_> {
        self.push(DraftMember::Property(PropertyDecl {
            name: Ident::new(name),
            hint: <F as Downcast>::hint(),
            get: None,
            set: Some(Self::instance_setter(set)),
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a read-write indexed property.
    ///
    /// The `indices` signature describes the index parameters; its return
    /// type is ignored in favor of `hint`.
    #[track_caller]
    pub fn indexed_property(
        &mut self,
        name: &str,
        indices: Signature,
        hint: TypeHint,
        get: MethodBody,
        set: MethodBody,
    ) -> Declaration<'_> {
        self.push_indexer(name, indices, hint, Some(get), Some(set))
    }

    /// Declares a read-only indexed property.
    #[track_caller]
    pub fn readonly_indexed_property(
        &mut self,
        name: &str,
        indices: Signature,
        hint: TypeHint,
        get: MethodBody,
    ) -> Declaration<'_> {
        self.push_indexer(name, indices, hint, Some(get), None)
    }

    /// Declares an event with the handler registration functions.
    #[track_caller]
    pub fn event(
        &mut self,
        name: &str,
        add: fn(&mut T, LuaFunction),
        remove: fn(&mut T, &LuaFunction),
    ) -> Declaration<'_> {
        let add = event_handler(move |invocation, handler| {
            invocation.with_receiver_mut(|this: &mut T| add(this, handler))
        });

        let remove = event_handler(move |invocation, handler| {
            invocation.with_receiver_mut(|this: &mut T| remove(this, &handler))
        });

        self.push(DraftMember::Event(EventDecl {
            name: Ident::new(name),
            add,
            remove,
            origin: RustOrigin::here(),
        }))
    }

    /// Declares a nested type, reachable from the static scope under the
    /// nested type's name.
    #[track_caller]
    pub fn nested<N: HostType>(&mut self) -> Declaration<'_> {
        self.push(DraftMember::Nested(NestedDecl {
            name: Ident::new(N::NAME),
            key: N::type_key(),
            origin: RustOrigin::here(),
        }))
    }

    /// Makes instances callable.
    #[inline(always)]
    pub fn invoke(&mut self, body: InvokeBody) -> &mut Self {
        self.draft.invoke = Some(body);
        self
    }

    /// Sets the string representation of instances.
    pub fn display(&mut self, display: fn(&T) -> String) -> &mut Self {
        self.draft.display = Some(Arc::new(move |data: &dyn Any| {
            match data.downcast_ref::<T>() {
                Some(data) => display(data),
                None => String::from(T::NAME),
            }
        }));

        self
    }

    fn instance_getter<F: Upcast + 'static>(get: fn(&T) -> F) -> Getter {
        getter(move |invocation| invocation.with_receiver(|this: &T| get(this))?.upcast())
    }

    fn instance_setter<F: Downcast>(set: fn(&mut T, F)) -> Setter {
        setter(move |invocation, value| {
            let value = F::downcast(value)?;

            invocation.with_receiver_mut(|this: &mut T| set(this, value))
        })
    }

    #[track_caller]
    fn push_indexer(
        &mut self,
        name: &str,
        indices: Signature,
        hint: TypeHint,
        get: Option<MethodBody>,
        set: Option<MethodBody>,
    ) -> Declaration<'_> {
        let origin = RustOrigin::here();

        if indices.params.is_empty() {
            origin.blame::<()>(&format!("Indexed property '{name}' has no index parameters."));
        }

        self.push(DraftMember::Indexer(IndexerDecl {
            name: Ident::new(name),
            hint,
            indices,
            get,
            set,
            origin,
        }))
    }

    fn push(&mut self, member: DraftMember) -> Declaration<'_> {
        self.draft.members.push(Draft {
            decl: member,
            ignored: false,
        });

        let last = self.draft.members.len() - 1;

        Declaration {
            ignored: &mut self.draft.members[last].ignored,
        }
    }
}
