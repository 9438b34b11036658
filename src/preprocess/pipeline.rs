//! Ordered transformer composition.

use tracing::{debug, info_span};

use super::error::{PreprocessError, PreprocessResult};
use super::Transformer;
use crate::relation::Table;

/// Ordered list of transformer steps.
///
/// Each step fits against its own source table, so fitting order does not
/// matter. Transforming threads one table through every step in order.
#[derive(Debug, Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_step<T: Transformer + 'static>(mut self, step: T) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Transformer>) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Box<dyn Transformer>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_fitted(&self) -> bool {
        self.steps.iter().all(|s| s.is_fitted())
    }

    pub fn fit(&mut self) -> PreprocessResult<()> {
        for step in &mut self.steps {
            let _span = info_span!("fit", step = step.name(), column = step.column()).entered();
            step.fit()?;
        }
        debug!(steps = self.steps.len(), "pipeline fitted");
        Ok(())
    }

    /// Transform starting from the first step's own source table
    pub fn transform(&self) -> PreprocessResult<Table> {
        let first = self.steps.first().ok_or(PreprocessError::EmptyPipeline)?;
        self.transform_table(first.source())
    }

    /// Apply every fitted step to `table`, in order
    pub fn transform_table(&self, table: &Table) -> PreprocessResult<Table> {
        if self.steps.is_empty() {
            return Err(PreprocessError::EmptyPipeline);
        }
        self.steps
            .iter()
            .try_fold(table.clone(), |t, step| step.transform(&t))
    }
}
