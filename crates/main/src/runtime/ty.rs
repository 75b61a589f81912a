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
    any::{Any, TypeId},
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use crate::runtime::{
    builder::{draft_of, TypeDraft},
    TypeBinding,
    TypeBuilder,
    TypeHint,
};

/// A Rust type exposed to the guest runtime.
///
/// The implementation names the type and describes its members through the
/// [TypeBuilder] API. The description runs lazily, once per process, when
/// the type is first touched by the guest or explicitly registered; the
/// result is cached in a [TypeBinding].
///
/// ```ignore
/// struct Counter {
///     value: i64,
/// }
///
/// impl HostType for Counter {
///     const NAME: &'static str = "Counter";
///
///     fn describe(ty: &mut TypeBuilder<Self>) {
///         ty.field("value", |this| this.value, |this, value| this.value = value);
///     }
/// }
/// ```
pub trait HostType: Any + Send + Sync + Sized {
    /// The user-facing name of the type.
    const NAME: &'static str;

    /// Declares the members of the type.
    fn describe(ty: &mut TypeBuilder<Self>);

    /// Returns the type identity of this type.
    #[inline(always)]
    fn type_key() -> TypeKey {
        TypeKey::of::<Self>()
    }

    /// Returns the cached binding of this type, building it on first use.
    #[inline(always)]
    fn binding() -> &'static TypeBinding {
        TypeBinding::of(Self::type_key())
    }
}

/// A type-erased identity of a [HostType].
///
/// Two keys are equal if they denote the same Rust type. The key also carries
/// everything needed to build the type's binding, so it can be passed around
/// as a runtime type reference (for example, as a generic type argument).
///
/// The [Display] implementation prints the user-facing name of the type.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
    draft: fn() -> TypeDraft,
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id)
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Debug for TypeKey {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name)
    }
}

impl Display for TypeKey {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name)
    }
}

impl TypeKey {
    /// Returns the key of the `T` type.
    #[inline(always)]
    pub fn of<T: HostType>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::NAME,
            draft: draft_of::<T>,
        }
    }

    #[inline(always)]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this key denotes the `T` type.
    #[inline(always)]
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Returns the cached binding of the type, building it on first use.
    #[inline(always)]
    pub fn binding(&self) -> &'static TypeBinding {
        TypeBinding::of(*self)
    }

    /// Returns the coercion target that accepts values of this type.
    #[inline(always)]
    pub fn hint(&self) -> TypeHint {
        TypeHint::of_type(*self)
    }

    #[inline(always)]
    pub(crate) fn draft(&self) -> TypeDraft {
        (self.draft)()
    }
}
