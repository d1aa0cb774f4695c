// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! Per-worker ordered composition of actions from the factory.

use crate::action::Action;
use crate::context::AppContext;

/// An ordered, immutable sequence of actions for one job. Built fresh
/// per job by a [`PipelineBuilder`] — pipelines never create queues or
/// issue broadcasts directly, they only sequence actions.
pub struct Pipeline<D> {
    steps: Vec<Box<dyn Action<D>>>,
}

impl<D> Pipeline<D> {
    pub fn new(steps: Vec<Box<dyn Action<D>>>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Box<dyn Action<D>>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A pure function `(factory, deps, job_data) -> Pipeline`. Deterministic
/// given the same inputs; conditional steps (e.g. an optional
/// UPDATE_INGREDIENT_COUNT) are ordinary branches inside the builder.
pub type PipelineBuilder<D> =
    fn(&crate::factory::ActionFactory<D>, &AppContext, &D) -> anyhow::Result<Pipeline<D>>;
