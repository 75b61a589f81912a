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
    any::{type_name, Any, TypeId},
    fmt::{Debug, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::{Arc, RwLock, TryLockError},
};

use mlua::{
    Error as LuaError,
    Lua,
    MultiValue,
    Result as LuaResult,
    UserData,
    UserDataMethods,
    Value as LuaValue,
};

use crate::runtime::{
    coercion::type_mismatch,
    guest::to_lua_all,
    ops::{self, Operator},
    thunk::{Operation, Scope, Thunk},
    Access,
    Downcast,
    HostType,
    RuntimeError,
    RuntimeResult,
    TypeHint,
    TypeKey,
    Upcast,
    Value,
};

/// A step from a derived type's data to its base type's data.
pub(crate) trait Projection: Send + Sync + 'static {
    fn project_ref<'a>(&self, data: &'a dyn Any) -> Option<&'a dyn Any>;

    fn project_mut<'a>(&self, data: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

pub(crate) struct BaseProjection<T, B> {
    pub(crate) by_ref: fn(&T) -> &B,
    pub(crate) by_mut: fn(&mut T) -> &mut B,
}

impl<T: Any, B: Any> Projection for BaseProjection<T, B> {
    #[inline]
    fn project_ref<'a>(&self, data: &'a dyn Any) -> Option<&'a dyn Any> {
        let data = data.downcast_ref::<T>()?;

        Some((self.by_ref)(data))
    }

    #[inline]
    fn project_mut<'a>(&self, data: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let data = data.downcast_mut::<T>()?;

        Some((self.by_mut)(data))
    }
}

/// A chain of projections from an object's own type down to one of its
/// ancestors. The empty path addresses the object's own data.
#[derive(Clone, Default)]
pub(crate) struct UpcastPath(Arc<[Arc<dyn Projection>]>);

impl Debug for UpcastPath {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("UpcastPath({})", self.0.len()))
    }
}

impl UpcastPath {
    /// Returns a path that first applies `self` and then `other`.
    pub(crate) fn join(&self, other: &Self) -> Self {
        if self.0.is_empty() {
            return other.clone();
        }

        if other.0.is_empty() {
            return self.clone();
        }

        Self(self.0.iter().chain(other.0.iter()).cloned().collect())
    }

    #[inline(always)]
    pub(crate) fn step(projection: Arc<dyn Projection>) -> Self {
        Self(Arc::from([projection]))
    }

    #[inline(always)]
    pub(crate) fn depth(&self) -> usize {
        self.0.len()
    }

    fn project_ref<'a>(&self, mut data: &'a dyn Any) -> Option<&'a dyn Any> {
        for step in self.0.iter() {
            data = step.project_ref(data)?;
        }

        Some(data)
    }

    fn project_mut<'a>(&self, mut data: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        for step in self.0.iter() {
            data = step.project_mut(data)?;
        }

        Some(data)
    }
}

struct HostCell {
    ty: TypeKey,
    data: RwLock<Box<dyn Any + Send + Sync>>,
}

/// A shared instance of a [HostType].
///
/// Cloning the HostObject clones the reference, not the data. The data is
/// guarded by a read/write lock that never blocks: an access that conflicts
/// with an access already in progress fails with
/// [RuntimeError::BorrowConflict].
#[derive(Clone)]
pub struct HostObject(Arc<HostCell>);

impl Debug for HostObject {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("{}(0x{:08x})", self.0.ty, self.address()))
    }
}

impl PartialEq for HostObject {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for HostObject {}

impl Hash for HostObject {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state)
    }
}

impl HostObject {
    /// Moves `data` into a new shared host object.
    #[inline]
    pub fn new<T: HostType>(data: T) -> Self {
        Self(Arc::new(HostCell {
            ty: T::type_key(),
            data: RwLock::new(Box::new(data)),
        }))
    }

    /// Returns the exact type of the object's data.
    #[inline(always)]
    pub fn ty(&self) -> TypeKey {
        self.0.ty
    }

    /// Returns true if the object's exact type is `T`.
    #[inline(always)]
    pub fn is<T: Any>(&self) -> bool {
        self.0.ty.is::<T>()
    }

    /// Returns true if both references point to the same object.
    #[inline(always)]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// The address of the object, a process-unique token while the object is
    /// alive.
    #[inline(always)]
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const u8 as usize
    }

    /// Reads the object's data as `T`, which is either the object's own type
    /// or one of its ancestors.
    pub fn read<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> RuntimeResult<R> {
        let path = self.path_to::<T>()?;

        self.read_projected(&path, f)
    }

    /// Mutates the object's data as `T`, which is either the object's own type
    /// or one of its ancestors.
    pub fn write<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> RuntimeResult<R> {
        let path = self.path_to::<T>()?;

        self.write_projected(&path, f)
    }

    /// Returns a copy of the object's data viewed as `T`.
    #[inline]
    pub fn get<T: Any + Clone>(&self) -> RuntimeResult<T> {
        self.read(|data: &T| data.clone())
    }

    fn path_to<T: Any>(&self) -> RuntimeResult<UpcastPath> {
        if self.0.ty.id() == TypeId::of::<T>() {
            return Ok(UpcastPath::default());
        }

        match self.0.ty.binding().upcast_path(TypeId::of::<T>()) {
            Some(path) => Ok(path.clone()),
            None => Err(RuntimeError::TypeMismatch {
                expected: String::from(type_name::<T>()),
                actual: self.0.ty.name(),
            }),
        }
    }

    pub(crate) fn read_projected<T: Any, R>(
        &self,
        path: &UpcastPath,
        f: impl FnOnce(&T) -> R,
    ) -> RuntimeResult<R> {
        self.read_any(path, |data| match data.downcast_ref::<T>() {
            Some(data) => Ok(f(data)),
            None => Err(self.projection_mismatch::<T>()),
        })?
    }

    pub(crate) fn write_projected<T: Any, R>(
        &self,
        path: &UpcastPath,
        f: impl FnOnce(&mut T) -> R,
    ) -> RuntimeResult<R> {
        let mut guard = match self.0.data.try_write() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poison)) => poison.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(RuntimeError::BorrowConflict {
                    receiver_type: self.0.ty.name(),
                    access: Access::Write,
                })
            }
        };

        let data: &mut dyn Any = &mut **guard;

        match path.project_mut(data).and_then(|data| data.downcast_mut::<T>()) {
            Some(data) => Ok(f(data)),
            None => Err(self.projection_mismatch::<T>()),
        }
    }

    pub(crate) fn read_any<R>(
        &self,
        path: &UpcastPath,
        f: impl FnOnce(&dyn Any) -> R,
    ) -> RuntimeResult<R> {
        let guard = match self.0.data.try_read() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poison)) => poison.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(RuntimeError::BorrowConflict {
                    receiver_type: self.0.ty.name(),
                    access: Access::Read,
                })
            }
        };

        let data: &dyn Any = &**guard;

        match path.project_ref(data) {
            Some(data) => Ok(f(data)),
            None => Err(RuntimeError::TypeMismatch {
                expected: String::from("ancestor type"),
                actual: self.0.ty.name(),
            }),
        }
    }

    #[inline(always)]
    fn projection_mismatch<T: Any>(&self) -> RuntimeError {
        RuntimeError::TypeMismatch {
            expected: String::from(type_name::<T>()),
            actual: self.0.ty.name(),
        }
    }
}

/// A host entity crossing the boundary: either an object or a reference to a
/// host type itself.
///
/// Type references give the guest access to the type's static scope:
/// constructors, static members, nested types and generic instantiation.
///
/// Two entities are equal if they are the same object or reference the same
/// type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum HostEntity {
    Object(HostObject),
    Type(TypeKey),
}

impl Debug for HostEntity {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Object(object) => Debug::fmt(object, formatter),
            Self::Type(key) => formatter.write_fmt(format_args!("type {key}")),
        }
    }
}

impl HostEntity {
    /// The type of the object, or the referenced type.
    #[inline(always)]
    pub fn ty(&self) -> TypeKey {
        match self {
            Self::Object(object) => object.ty(),
            Self::Type(key) => *key,
        }
    }

    #[inline(always)]
    pub fn scope(&self) -> Scope {
        match self {
            Self::Object(_) => Scope::Instance,
            Self::Type(_) => Scope::Static,
        }
    }

    #[inline(always)]
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            Self::Object(object) => Some(object),
            Self::Type(_) => None,
        }
    }
}

/// A typed handle to a [HostObject] whose type is `T` or derives from `T`.
///
/// Use this type for host member parameters and return values that carry
/// host objects.
pub struct HostRef<T: HostType> {
    object: HostObject,
    marker: PhantomData<fn() -> T>,
}

impl<T: HostType> Clone for HostRef<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        Self {
            object: self.object.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: HostType> Debug for HostRef<T> {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.object, formatter)
    }
}

impl<T: HostType> Downcast for HostRef<T> {
    fn downcast(value: Value) -> RuntimeResult<Self> {
        if let Value::Host(HostEntity::Object(object)) = &value {
            if object.ty().binding().is_subtype_of(T::type_key()) {
                return Ok(Self {
                    object: object.clone(),
                    marker: PhantomData,
                });
            }
        }

        Err(type_mismatch(&TypeHint::Host(T::type_key()), &value))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Host(T::type_key())
    }
}

impl<T: HostType> Upcast for HostRef<T> {
    #[inline(always)]
    fn upcast(self) -> RuntimeResult<Value> {
        Ok(Value::from(self.object))
    }

    #[inline(always)]
    fn hint() -> TypeHint {
        TypeHint::Host(T::type_key())
    }
}

impl<T: HostType> HostRef<T> {
    /// Moves `data` into a new host object.
    #[inline(always)]
    pub fn new(data: T) -> Self {
        Self {
            object: HostObject::new(data),
            marker: PhantomData,
        }
    }

    #[inline(always)]
    pub fn object(&self) -> &HostObject {
        &self.object
    }

    #[inline(always)]
    pub fn into_object(self) -> HostObject {
        self.object
    }

    #[inline(always)]
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> RuntimeResult<R> {
        self.object.read(f)
    }

    #[inline(always)]
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> RuntimeResult<R> {
        self.object.write(f)
    }
}

impl UserData for HostEntity {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        let protocol = [
            ("__index", Operation::Read),
            ("__newindex", Operation::Write),
            ("__call", Operation::Call),
        ];

        for (event, operation) in protocol {
            methods.add_meta_function(event, move |lua, arguments: MultiValue| {
                dispatch(lua, operation, arguments)
            });
        }

        for operator in Operator::ALL {
            methods.add_meta_function(operator.event(), move |lua, arguments: MultiValue| {
                ops::dispatch(lua, operator, arguments)
            });
        }

        methods.add_meta_function("__len", |lua, arguments: MultiValue| {
            ops::length(lua, arguments)
        });

        methods.add_meta_function("__tostring", |lua, arguments: MultiValue| {
            ops::display(lua, arguments)
        });
    }
}

/// Turns a host entity into a guest userdata.
///
/// The userdata's metamethods route indexing, assignment, calls and
/// operators to the thunks of the entity's type and scope.
pub(crate) fn push_entity(lua: &Lua, entity: HostEntity) -> RuntimeResult<LuaValue> {
    Ok(LuaValue::UserData(lua.create_userdata(entity)?))
}

/// Returns the host entity carried by a userdata value.
pub(crate) fn load_entity(value: &LuaValue) -> Option<HostEntity> {
    match value {
        LuaValue::UserData(data) => match data.borrow::<HostEntity>() {
            Ok(entity) => Some(HostEntity::clone(&entity)),
            Err(_) => None,
        },

        _ => None,
    }
}

fn dispatch(lua: &Lua, operation: Operation, arguments: MultiValue) -> LuaResult<MultiValue> {
    let mut arguments = arguments.into_iter();
    let target = arguments.next().unwrap_or(LuaValue::Nil);

    let Some(entity) = load_entity(&target) else {
        return Err(LuaError::RuntimeError(format!(
            "bad self argument (host entity expected, got {})",
            target.type_name(),
        )));
    };

    let thunk = Thunk::get(entity.ty(), entity.scope(), operation);

    let mut values = Vec::new();

    for argument in arguments {
        values.push(Value::load(lua, argument)?);
    }

    let results = thunk.invoke(lua, &entity, values)?;

    Ok(to_lua_all(lua, results)?)
}

#[cfg(test)]
mod tests {
    use crate::runtime::{
        Access,
        HostObject,
        HostType,
        RuntimeError,
        Signature,
        TypeBuilder,
        Value,
    };

    struct Base {
        level: i64,
    }

    impl HostType for Base {
        const NAME: &'static str = "Base";

        fn describe(ty: &mut TypeBuilder<Self>) {
            let _ = ty.field(
                "level",
                |this: &Base| this.level,
                |this: &mut Base, level: i64| this.level = level,
            );
        }
    }

    struct Derived {
        base: Base,
    }

    impl HostType for Derived {
        const NAME: &'static str = "Derived";

        fn describe(ty: &mut TypeBuilder<Self>) {
            let _ = ty.base::<Base>(|this| &this.base, |this| &mut this.base);

            let _ = ty.constructor(Signature::new(), |_| {
                Ok(Value::host(Derived {
                    base: Base { level: 1 },
                }))
            });
        }
    }

    #[test]
    fn test_borrow_conflict() {
        let object = HostObject::new(Base { level: 3 });

        let nested = object
            .read(|_: &Base| object.write(|base: &mut Base| base.level += 1))
            .unwrap();

        assert!(matches!(
            nested,
            Err(RuntimeError::BorrowConflict {
                receiver_type: "Base",
                access: Access::Write,
            }),
        ));

        let shared = object
            .read(|_: &Base| object.read(|base: &Base| base.level))
            .unwrap();

        assert_eq!(shared.unwrap(), 3);
    }

    #[test]
    fn test_ancestor_projection() {
        let object = HostObject::new(Derived {
            base: Base { level: 1 },
        });

        object.write(|base: &mut Base| base.level = 5).unwrap();

        assert_eq!(object.read(|derived: &Derived| derived.base.level).unwrap(), 5);
        assert!(object.is::<Derived>());
        assert!(!object.is::<Base>());

        assert!(matches!(
            object.read(|_: &String| ()),
            Err(RuntimeError::TypeMismatch { .. }),
        ));
    }

    #[test]
    fn test_object_identity() {
        let first = HostObject::new(Base { level: 0 });
        let second = HostObject::new(Base { level: 0 });

        assert_eq!(first, first.clone());
        assert_ne!(first, second);
        assert_ne!(first.address(), second.address());
    }
}
