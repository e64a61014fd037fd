//! Correlate trait - the computation an operator runs per ready timestamp

use std::marker::PhantomData;

use contracts::LogicalTimestamp;

/// Correlation stage registered with a [`CorrelationEngine`](crate::CorrelationEngine).
///
/// `correlate` is called once per fully certified timestamp with exactly one
/// payload per registered channel, in channel registration order. The stage
/// owns the payloads it receives.
pub trait Correlate {
    /// Payload type buffered on every input channel
    type Input;
    /// Payload type emitted on the output channel
    type Output;
    /// Failure type of the computation
    type Error: std::error::Error + Send + Sync + 'static;

    /// Operator name used in logs and metric labels
    fn name(&self) -> &str;

    fn correlate(
        &mut self,
        timestamp: &LogicalTimestamp,
        inputs: Vec<Self::Input>,
    ) -> Result<Self::Output, Self::Error>;
}

/// Closure-backed stage
///
/// ```
/// use std::convert::Infallible;
/// use sync_engine::{Correlate, FnStage};
///
/// let mut sum = FnStage::new("sum", |_, inputs: Vec<u32>| {
///     Ok::<_, Infallible>(inputs.iter().sum::<u32>())
/// });
/// assert_eq!(sum.correlate(&5.into(), vec![1, 2]).unwrap(), 3);
/// ```
pub struct FnStage<F, I, O, E> {
    name: String,
    f: F,
    _marker: PhantomData<fn(Vec<I>) -> Result<O, E>>,
}

impl<F, I, O, E> FnStage<F, I, O, E>
where
    F: FnMut(&LogicalTimestamp, Vec<I>) -> Result<O, E>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _marker: PhantomData,
        }
    }
}

impl<F, I, O, E> Correlate for FnStage<F, I, O, E>
where
    F: FnMut(&LogicalTimestamp, Vec<I>) -> Result<O, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Input = I;
    type Output = O;
    type Error = E;

    fn name(&self) -> &str {
        &self.name
    }

    fn correlate(&mut self, timestamp: &LogicalTimestamp, inputs: Vec<I>) -> Result<O, E> {
        (self.f)(timestamp, inputs)
    }
}
