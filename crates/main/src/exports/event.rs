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

use crate::runtime::{
    binding::MemberRef,
    invoke::guard,
    EventDecl,
    HostObject,
    HostType,
    Invocation,
    LuaFunction,
    RuntimeResult,
    Signature,
    TypeBuilder,
    Value,
};

/// An event of a host object read by name.
///
/// The guest subscribes to the event through the wrapper:
/// `object.Clicked:add(handler)` and `object.Clicked:remove(handler)`.
#[derive(Clone)]
pub struct EventWrapper {
    event: &'static MemberRef<EventDecl>,
    receiver: HostObject,
}

impl EventWrapper {
    #[inline(always)]
    pub(crate) fn new(event: &'static MemberRef<EventDecl>, receiver: HostObject) -> Self {
        Self { event, receiver }
    }

    #[inline(always)]
    pub fn receiver(&self) -> &HostObject {
        &self.receiver
    }

    fn subscribe(invocation: &mut Invocation<'_>, add: bool) -> RuntimeResult<Value> {
        let this = invocation.with_receiver(|this: &EventWrapper| this.clone())?;
        let handler = invocation.argument::<LuaFunction>(0)?;

        let owner = this.event.owner();
        let decl = this.event.decl();
        let name = decl.name.as_str();

        let mut inner = Invocation::new(
            invocation.lua(),
            owner,
            name,
            Some((&this.receiver, &this.event.path)),
            Vec::new(),
            &[],
        );

        guard(owner, name, || match add {
            true => (decl.add)(&mut inner, handler),
            false => (decl.remove)(&mut inner, handler),
        })?;

        Ok(Value::Nil)
    }
}

impl HostType for EventWrapper {
    const NAME: &'static str = "Event";

    fn describe(ty: &mut TypeBuilder<Self>) {
        let _ = ty.method(
            "add",
            Signature::new().param::<LuaFunction>("handler"),
            |invocation| Self::subscribe(invocation, true),
        );

        let _ = ty.method(
            "remove",
            Signature::new().param::<LuaFunction>("handler"),
            |invocation| Self::subscribe(invocation, false),
        );

        let _ = ty.display(|this| {
            format!("event {}.{}", this.event.owner(), this.event.decl().name)
        });
    }
}
