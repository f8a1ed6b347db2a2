use crate::traits::Dataset;
use crate::types::Sample;

/// Dataset built from in-memory questions.
///
/// Plain strings get positional ids (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, Default)]
pub struct GenericQaDataset {
    samples: Vec<Sample>,
}

impl GenericQaDataset {
    pub fn from_queries<I, S>(queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let samples = queries.into_iter().enumerate().map(|(i, q)| Sample::new(i.to_string(), q)).collect();
        Self { samples }
    }

    pub fn from_samples(samples: Vec<Sample>) -> Self { Self { samples } }
}

impl Dataset for GenericQaDataset {
    fn len(&self) -> usize { self.samples.len() }

    fn samples(&self, range: std::ops::Range<usize>) -> &[Sample] {
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        &self.samples[start..end]
    }
}
