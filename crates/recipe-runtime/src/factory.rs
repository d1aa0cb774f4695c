// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Name -> constructor registry producing pre-bound action instances.

use crate::action::Action;
use crate::context::AppContext;
use recipe_core::ActionName;
use std::collections::HashMap;
use thiserror::Error;

/// Failures raised by [`ActionFactory`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("{0} is already registered")]
    DuplicateRegistration(ActionName),
    #[error("{0} is not registered")]
    UnknownAction(ActionName),
}

type Constructor<D> = Box<dyn Fn(&AppContext) -> Box<dyn Action<D>> + Send + Sync>;

/// A mapping from [`ActionName`] to a zero-argument constructor.
/// Registration happens once per worker at construction; actions must
/// not capture `deps` at registration time, only at `create`, so one
/// factory definition can serve multiple `AppContext`s in tests.
pub struct ActionFactory<D> {
    constructors: HashMap<ActionName, Constructor<D>>,
}

impl<D: Send + 'static> ActionFactory<D> {
    pub fn new() -> Self {
        Self { constructors: HashMap::new() }
    }

    /// Register a constructor for `name`. Fails if `name` is already bound.
    pub fn register<F>(&mut self, name: ActionName, constructor: F) -> Result<(), FactoryError>
    where
        F: Fn(&AppContext) -> Box<dyn Action<D>> + Send + Sync + 'static,
    {
        if self.constructors.contains_key(&name) {
            return Err(FactoryError::DuplicateRegistration(name));
        }
        self.constructors.insert(name, Box::new(constructor));
        Ok(())
    }

    /// Build a fresh action instance bound to `deps`. Each call returns a
    /// new instance — the factory does not own action lifetime.
    pub fn create(&self, name: ActionName, deps: &AppContext) -> Result<Box<dyn Action<D>>, FactoryError> {
        let constructor = self.constructors.get(&name).ok_or(FactoryError::UnknownAction(name))?;
        Ok(constructor(deps))
    }

    /// The set of currently registered action names.
    pub fn registered_actions(&self) -> Vec<ActionName> {
        self.constructors.keys().copied().collect()
    }
}

impl<D: Send + 'static> Default for ActionFactory<D> {
    fn default() -> Self {
        Self::new()
    }
}
