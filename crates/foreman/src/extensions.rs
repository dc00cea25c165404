//! Values keyed by their type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::command::{Execution, Interrupt};

type Slot = Box<dyn Any + Send + Sync>;

/// One value per type, shared with commands and callbacks.
///
/// A [`Foreman`](crate::Foreman) keeps one as application state readable
/// from every run. Each [`Invocation`](crate::Invocation) keeps another for
/// values a callback hands to the body of the same run.
///
/// ```rust
/// use foreman::Extensions;
///
/// struct RequestId(u64);
///
/// let mut extensions = Extensions::new();
/// extensions.insert(RequestId(7));
/// assert_eq!(extensions.get::<RequestId>().map(|id| id.0), Some(7));
/// ```
#[derive(Default)]
pub struct Extensions {
    values: HashMap<TypeId, Slot>,
    /// Type names, for diagnostics.
    names: Vec<&'static str>,
}

fn unbox<T: 'static>(slot: Slot) -> Option<T> {
    slot.downcast::<T>().ok().map(|value| *value)
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, handing back the value of the same type it replaces.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        let previous = self.values.insert(TypeId::of::<T>(), Box::new(value));
        if previous.is_none() {
            self.names.push(type_name::<T>());
        }
        previous.and_then(unbox)
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>())?.downcast_ref()
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.values.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    /// Returns the stored `T`, inserting `init()` first if there is none.
    pub fn get_or_insert_with<T, F>(&mut self, init: F) -> &mut T
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if !self.contains::<T>() {
            self.insert(init());
        }
        match self.get_mut::<T>() {
            Some(value) => value,
            None => unreachable!("value of type {} was just inserted", type_name::<T>()),
        }
    }

    /// Returns the stored `T` or a fault naming the missing type, so a
    /// command body can write `run.extensions().require::<Db>()?`.
    pub fn require<T: 'static>(&self) -> Execution<&T> {
        self.get::<T>().ok_or_else(|| {
            Interrupt::fault(anyhow::anyhow!(
                "no {} was provided to this run",
                type_name::<T>()
            ))
        })
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        let removed = self.values.remove(&TypeId::of::<T>())?;
        self.names.retain(|name| *name != type_name::<T>());
        unbox(removed)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(&self.names).finish()
    }
}
