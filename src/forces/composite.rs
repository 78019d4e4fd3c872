use super::{ForceBuffer, ForceContext, ForceModel};
use rand::RngCore;

/// Sum of several models, evaluated in order into the same buffer.
pub struct Composite {
    models: Vec<Box<dyn ForceModel>>,
}

impl Composite {
    pub fn new(models: Vec<Box<dyn ForceModel>>) -> Self {
        Composite { models }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.name()).collect()
    }
}

impl ForceModel for Composite {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn accumulate(&mut self, ctx: &ForceContext<'_>, rng: &mut dyn RngCore, out: &mut ForceBuffer) {
        for model in &mut self.models {
            model.accumulate(ctx, rng, out);
        }
    }

    fn mean_density(&self) -> Option<f64> {
        self.models.iter().find_map(|m| m.mean_density())
    }
}
