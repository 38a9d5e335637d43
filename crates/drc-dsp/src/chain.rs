//! Ordered chain of streaming stages

use drc_core::{DrcResult, SampleBlock};

use crate::StreamProcessor;

/// Runs blocks through each stage in order, feeding every output block of
/// one stage into the next.
#[derive(Default)]
pub struct ProcessingChain {
    stages: Vec<Box<dyn StreamProcessor>>,
}

impl ProcessingChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage at the end of the chain
    pub fn with_stage(mut self, stage: Box<dyn StreamProcessor>) -> Self {
        self.push_stage(stage);
        self
    }

    pub fn push_stage(&mut self, stage: Box<dyn StreamProcessor>) {
        log::debug!(
            "ProcessingChain: stage {} '{}' (latency {} samples)",
            self.stages.len(),
            stage.name(),
            stage.latency()
        );
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names in processing order
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl StreamProcessor for ProcessingChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn push(&mut self, block: SampleBlock) -> DrcResult<Vec<SampleBlock>> {
        let mut carried = vec![block];
        for stage in &mut self.stages {
            let mut next = Vec::new();
            for block in carried {
                next.extend(stage.push(block)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            carried = next;
        }
        Ok(carried)
    }

    /// Flush stages in order; each stage's tail still passes through the
    /// stages after it before those are flushed
    fn flush(&mut self) -> DrcResult<Vec<SampleBlock>> {
        let mut carried: Vec<SampleBlock> = Vec::new();
        for stage in &mut self.stages {
            let mut next = Vec::new();
            for block in carried {
                next.extend(stage.push(block)?);
            }
            next.extend(stage.flush()?);
            carried = next;
        }
        Ok(carried)
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    fn latency(&self) -> usize {
        self.stages.iter().map(|s| s.latency()).sum()
    }
}
