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
    cell::{Cell, RefCell},
    fmt::{Debug, Display, Formatter},
    rc::{Rc, Weak},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Weak as ArcWeak,
    },
};

use ahash::AHashMap;
use log::{debug, warn};
use mlua::{Lua, MultiValue, RegistryKey, Value as LuaValue};

use crate::runtime::{guest::GuestHandle, GuestKind, GuestObject, RuntimeError, RuntimeResult};

static NEXT_ENGINE: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier of an engine instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EngineId(u64);

impl Display for EngineId {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("#{}", self.0))
    }
}

impl EngineId {
    #[inline(always)]
    fn next() -> Self {
        Self(NEXT_ENGINE.fetch_add(1, Ordering::Relaxed))
    }
}

/// The address of a guest object, stable while the object is pinned.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct GuestIdentity(usize);

impl GuestIdentity {
    #[inline(always)]
    fn of(value: &LuaValue) -> Self {
        Self(value.to_pointer() as usize)
    }
}

/// Counters of an [ObjectBridge].
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct BridgeStats {
    /// The number of wrappers created.
    pub created: usize,

    /// The number of loads answered with an existing wrapper.
    pub reused: usize,

    /// The number of entries removed by reclamation cycles.
    pub reclaimed: usize,

    /// The number of wrappers released explicitly.
    pub released: usize,

    /// The number of reclamation cycles.
    pub cycles: usize,
}

struct BridgeEntry {
    key: RegistryKey,
    wrapper: ArcWeak<GuestHandle>,
}

#[derive(Default)]
struct BridgeInner {
    objects: AHashMap<GuestIdentity, BridgeEntry>,
    stats: BridgeStats,
}

/// The Object Lifetime Bridge of one engine instance.
///
/// The bridge maps guest object identities to their host-side wrappers. Each
/// entry pins the guest object with a [RegistryKey] and refers to the
/// wrapper weakly. The entries whose wrappers were dropped are reclaimed by
/// a finalizer that runs once per guest collection cycle, so the guest
/// objects become collectable only after the host drops its wrappers and the
/// guest collector runs.
///
/// Guest allocations, which may run a collection step and the finalizer,
/// never happen while the bridge's table is borrowed.
pub struct ObjectBridge {
    engine: EngineId,
    inner: RefCell<BridgeInner>,
    armed: Cell<bool>,
}

impl Debug for ObjectBridge {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ObjectBridge")
            .field("engine", &self.engine)
            .field("tracked", &self.tracked())
            .field("stats", &self.stats())
            .finish()
    }
}

impl ObjectBridge {
    /// Attaches a new bridge to the guest runtime and arms the reclamation
    /// finalizer.
    ///
    /// Replaces the previously attached bridge, if any. The wrappers of the
    /// replaced bridge become foreign to the runtime.
    pub fn install(lua: &Lua) -> RuntimeResult<Rc<Self>> {
        let bridge = Rc::new(Self {
            engine: EngineId::next(),
            inner: RefCell::new(BridgeInner::default()),
            armed: Cell::new(false),
        });

        let _ = lua.set_app_data(bridge.clone());

        bridge.arm(lua)?;

        Ok(bridge)
    }

    /// Returns the bridge attached to the guest runtime.
    pub fn of(lua: &Lua) -> RuntimeResult<Rc<Self>> {
        match lua.app_data_ref::<Rc<Self>>() {
            Some(bridge) => Ok(Rc::clone(&bridge)),
            None => Err(RuntimeError::Detached),
        }
    }

    #[inline(always)]
    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// The number of guest objects currently pinned by the bridge.
    #[inline(always)]
    pub fn tracked(&self) -> usize {
        self.inner.borrow().objects.len()
    }

    #[inline(always)]
    pub fn stats(&self) -> BridgeStats {
        self.inner.borrow().stats
    }

    /// Returns the wrapper of a composite guest value.
    ///
    /// If a wrapper of the same guest object is alive, returns it. Otherwise,
    /// creates a new wrapper.
    pub fn load(&self, lua: &Lua, value: LuaValue) -> RuntimeResult<GuestObject> {
        let kind = match &value {
            LuaValue::Table(_) => GuestKind::Table,
            LuaValue::Function(_) => GuestKind::Function,
            LuaValue::Thread(_) => GuestKind::Thread,

            other => {
                return Err(RuntimeError::UnsupportedValue {
                    type_name: other.type_name(),
                })
            }
        };

        let identity = GuestIdentity::of(&value);

        let stale = {
            let mut inner = self.inner.borrow_mut();

            let alive = inner
                .objects
                .get(&identity)
                .and_then(|entry| entry.wrapper.upgrade());

            if let Some(wrapper) = alive {
                inner.stats.reused += 1;

                return Ok(GuestObject::from_handle(wrapper));
            }

            inner.objects.remove(&identity)
        };

        // The stale entry still pins the same object.
        let key = match stale {
            Some(entry) => entry.key,
            None => lua.create_registry_value(value)?,
        };

        let wrapper = Arc::new(GuestHandle {
            engine: self.engine,
            identity,
            kind,
            released: AtomicBool::new(false),
        });

        let mut inner = self.inner.borrow_mut();

        let _ = inner.objects.insert(
            identity,
            BridgeEntry {
                key,
                wrapper: Arc::downgrade(&wrapper),
            },
        );

        inner.stats.created += 1;

        Ok(GuestObject::from_handle(wrapper))
    }

    /// Unpins the guest object of the wrapper immediately.
    ///
    /// All clones of the wrapper become unusable. Returns false if the
    /// wrapper was already released.
    pub fn release(&self, lua: &Lua, object: &GuestObject) -> RuntimeResult<bool> {
        let handle = object.handle();

        if handle.engine != self.engine {
            return Err(RuntimeError::ForeignEngine {
                owner: handle.engine,
                current: self.engine,
            });
        }

        if !handle.mark_released() {
            return Ok(false);
        }

        let entry = {
            let mut inner = self.inner.borrow_mut();

            inner.stats.released += 1;

            let owned = match inner.objects.get(&handle.identity) {
                Some(entry) => entry.wrapper.as_ptr() == Arc::as_ptr(handle),
                None => false,
            };

            match owned {
                true => inner.objects.remove(&handle.identity),
                false => None,
            }
        };

        if let Some(entry) = entry {
            lua.remove_registry_value(entry.key)?;
        }

        Ok(true)
    }

    /// Unpins the guest objects whose wrappers were dropped.
    ///
    /// Returns the number of reclaimed entries.
    pub fn reclaim(&self, lua: &Lua) -> usize {
        let (keys, remain) = {
            let Ok(mut inner) = self.inner.try_borrow_mut() else {
                warn!("Engine {} skipped a reclamation cycle: the bridge is busy.", self.engine);

                return 0;
            };

            let dead = inner
                .objects
                .iter()
                .filter(|(_, entry)| entry.wrapper.strong_count() == 0)
                .map(|(identity, _)| *identity)
                .collect::<Vec<_>>();

            let mut keys = Vec::with_capacity(dead.len());

            for identity in dead {
                if let Some(entry) = inner.objects.remove(&identity) {
                    keys.push(entry.key);
                }
            }

            inner.stats.reclaimed += keys.len();
            inner.stats.cycles += 1;

            (keys, inner.objects.len())
        };

        let count = keys.len();

        for key in keys {
            if let Err(error) = lua.remove_registry_value(key) {
                warn!("Engine {} failed to unpin a guest object: {error}", self.engine);
            }
        }

        debug!(
            "Engine {} reclaimed {count} guest objects, {remain} remain tracked.",
            self.engine,
        );

        count
    }

    /// Returns the guest object pinned under the identity, if any.
    pub(crate) fn pinned(&self, lua: &Lua, identity: GuestIdentity) -> RuntimeResult<Option<LuaValue>> {
        let inner = self.inner.borrow();

        let Some(entry) = inner.objects.get(&identity) else {
            return Ok(None);
        };

        Ok(Some(lua.registry_value::<LuaValue>(&entry.key)?))
    }

    // Creates an unreachable sentinel table whose finalizer runs the
    // reclamation and arms a new sentinel for the next cycle.
    fn arm(self: &Rc<Self>, lua: &Lua) -> RuntimeResult<()> {
        let bridge: Weak<Self> = Rc::downgrade(self);

        let finalizer = lua.create_function(move |lua, _: MultiValue| {
            let Some(bridge) = bridge.upgrade() else {
                return Ok(());
            };

            let current = ObjectBridge::of(lua)
                .map(|current| Rc::ptr_eq(&current, &bridge))
                .unwrap_or(false);

            if !current {
                return Ok(());
            }

            let _ = bridge.reclaim(lua);

            if let Err(error) = bridge.arm(lua) {
                warn!("Engine {} failed to re-arm the reclamation: {error}", bridge.engine);
            }

            Ok(())
        })?;

        let metatable = lua.create_table()?;

        metatable.raw_set("__gc", finalizer)?;

        let sentinel = lua.create_table()?;

        sentinel.set_metatable(Some(metatable));

        self.armed.set(true);

        Ok(())
    }

    /// Returns true if the reclamation finalizer was armed at least once.
    #[inline(always)]
    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }
}
