use crate::math::matrix::Matrix;

/// Intermediate values of one forward pass, handed back to `Network::backward`.
///
/// `activations[i]` is the input to transition `i` (so `activations[0]` is
/// the batch itself) and `pre_activations[i]` is the Z of hidden transition
/// `i`. The output layer's values are not stored here: `forward` returns
/// the softmax output alongside the trace.
#[derive(Debug, Clone)]
pub struct ForwardTrace {
    pub(crate) activations: Vec<Matrix>,
    pub(crate) pre_activations: Vec<Matrix>,
}

impl ForwardTrace {
    pub(crate) fn new(input: Matrix, transitions: usize) -> ForwardTrace {
        let mut activations = Vec::with_capacity(transitions);
        activations.push(input);
        ForwardTrace {
            activations,
            pre_activations: Vec::with_capacity(transitions.saturating_sub(1)),
        }
    }

    /// Records one hidden transition.
    pub(crate) fn push_hidden(&mut self, z: Matrix, a: Matrix) {
        self.pre_activations.push(z);
        self.activations.push(a);
    }

    /// The most recent activation, i.e. the input to the next transition.
    pub(crate) fn last_activation(&self) -> &Matrix {
        &self.activations[self.activations.len() - 1]
    }

    pub fn input(&self) -> &Matrix {
        &self.activations[0]
    }

    pub fn batch_size(&self) -> usize {
        self.input().rows()
    }

    /// Number of transitions whose inputs were recorded.
    pub fn depth(&self) -> usize {
        self.activations.len()
    }
}
