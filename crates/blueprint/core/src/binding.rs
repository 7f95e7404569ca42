//! Guarded properties and methods.
//!
//! A bound function declares the component kinds it depends on. Before it is
//! forwarded to the wrapped value, the system checks that every dependency is
//! attached and reports the first missing one otherwise.

use crate::error::{BindingError, HookError};
use crate::kind::Kind;
use crate::system::{Attachments, System};

/// Anything guarded by a list of required component kinds.
pub trait Bound<V: 'static> {
    fn name(&self) -> &'static str;

    fn depends(&self) -> &[Kind];

    /// First dependency not attached to the system, in declaration order.
    fn first_missing_required_kind(&self, attachments: &Attachments<V>) -> Option<Kind> {
        self.depends()
            .iter()
            .copied()
            .find(|kind| !attachments.has_component(*kind))
    }
}

type Reader<V, T> = fn(&V) -> T;
type Writer<V, T> = fn(&mut V, T) -> Result<(), HookError>;

/// A readable, and optionally writable, view into the wrapped value.
pub struct Property<V: 'static, T> {
    name: &'static str,
    depends: Vec<Kind>,
    read: Reader<V, T>,
    write: Option<Writer<V, T>>,
}

impl<V: 'static, T> Property<V, T> {
    pub fn read_only(name: &'static str, depends: &[Kind], read: Reader<V, T>) -> Self {
        Self {
            name,
            depends: depends.to_vec(),
            read,
            write: None,
        }
    }

    pub fn read_write(
        name: &'static str,
        depends: &[Kind],
        read: Reader<V, T>,
        write: Writer<V, T>,
    ) -> Self {
        Self {
            name,
            depends: depends.to_vec(),
            read,
            write: Some(write),
        }
    }

    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }
}

impl<V: 'static, T> Bound<V> for Property<V, T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn depends(&self) -> &[Kind] {
        &self.depends
    }
}

/// A function of the wrapped value and some arguments.
pub struct Method<V: 'static, A, R> {
    name: &'static str,
    depends: Vec<Kind>,
    func: fn(&V, A) -> R,
}

impl<V: 'static, A, R> Method<V, A, R> {
    pub fn new(name: &'static str, depends: &[Kind], func: fn(&V, A) -> R) -> Self {
        Self {
            name,
            depends: depends.to_vec(),
            func,
        }
    }
}

impl<V: 'static, A, R> Bound<V> for Method<V, A, R> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn depends(&self) -> &[Kind] {
        &self.depends
    }
}

/// A function allowed to mutate the wrapped value.
pub struct MethodMut<V: 'static, A, R> {
    name: &'static str,
    depends: Vec<Kind>,
    func: fn(&mut V, A) -> R,
}

impl<V: 'static, A, R> MethodMut<V, A, R> {
    pub fn new(name: &'static str, depends: &[Kind], func: fn(&mut V, A) -> R) -> Self {
        Self {
            name,
            depends: depends.to_vec(),
            func,
        }
    }
}

impl<V: 'static, A, R> Bound<V> for MethodMut<V, A, R> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn depends(&self) -> &[Kind] {
        &self.depends
    }
}

impl<V: 'static> System<V> {
    fn guard(&self, bound: &dyn Bound<V>) -> Result<(), BindingError> {
        match bound.first_missing_required_kind(&self.attachments) {
            Some(missing) => Err(BindingError::MissingComponent {
                name: bound.name(),
                missing,
            }),
            None => Ok(()),
        }
    }

    /// Read a property, if its dependencies are attached.
    pub fn get<T>(&self, property: &Property<V, T>) -> Result<T, BindingError> {
        self.guard(property)?;
        Ok((property.read)(&self.value))
    }

    /// Write a property, if it is writable and its dependencies are attached.
    pub fn set<T>(&mut self, property: &Property<V, T>, value: T) -> Result<(), BindingError> {
        if let Some(kind) = self.poisoned {
            return Err(BindingError::Poisoned(kind));
        }
        self.guard(property)?;
        let write = property.write.ok_or(BindingError::ReadOnly(property.name))?;
        write(&mut self.value, value).map_err(|e| BindingError::WriteRejected {
            name: property.name,
            message: match e {
                HookError::Check(message) => message,
                HookError::Unexpected(e) => format!("{e:#}"),
            },
        })
    }

    /// Call a method, if its dependencies are attached.
    pub fn call<A, R>(&self, method: &Method<V, A, R>, args: A) -> Result<R, BindingError> {
        self.guard(method)?;
        Ok((method.func)(&self.value, args))
    }

    /// Call a mutating method, if the system is sound and the method's
    /// dependencies are attached.
    pub fn call_mut<A, R>(
        &mut self,
        method: &MethodMut<V, A, R>,
        args: A,
    ) -> Result<R, BindingError> {
        if let Some(kind) = self.poisoned {
            return Err(BindingError::Poisoned(kind));
        }
        self.guard(method)?;
        Ok((method.func)(&mut self.value, args))
    }

    /// Names of the bound functions usable on this system right now.
    pub fn available(&self, bound: &[&dyn Bound<V>]) -> Vec<&'static str> {
        bound
            .iter()
            .filter(|b| b.first_missing_required_kind(&self.attachments).is_none())
            .map(|b| b.name())
            .collect()
    }
}
