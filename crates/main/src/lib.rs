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

//! # Moonbridge
//!
//! An interop engine between an embedded Lua runtime and Rust host types.
//!
//! Host types describe themselves once through the
//! [HostType](runtime::HostType) trait: constructors, fields, properties,
//! indexed properties, methods with overloads, events, operators and nested
//! types. The crate turns these descriptions into process-wide reflection
//! bindings and into cached routines (thunks) that implement the guest's
//! indexing, assignment and call protocol on host objects and host types.
//!
//! Guest tables, functions and threads that flow into the host are wrapped
//! by handles that keep the guest objects alive. The handles are tracked by a
//! per-engine bridge that unpins the guest objects after the host drops the
//! handles, on the next guest collection cycle.
//!
//! ```
//! use moonbridge::{
//!     runtime::{Engine, HostType, Signature, TypeBuilder, Upcast, Value},
//! };
//!
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
//!
//! let engine = Engine::new().unwrap();
//!
//! engine.register_type::<Counter>().unwrap();
//!
//! let results = engine
//!     .eval(
//!         r#"
//!         local counter = Counter()
//!         counter.value = 5
//!         return counter:increment(3), counter.value
//!         "#,
//!     )
//!     .unwrap();
//!
//! assert_eq!(results, vec![Value::Integer(8), Value::Integer(8)]);
//! ```

mod report;

/// Built-in host types.
///
/// These types are registered with the same [TypeBuilder](runtime::TypeBuilder)
/// API available to the host program.
pub mod exports;

pub mod runtime;

pub use mlua;
