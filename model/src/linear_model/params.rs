use serde::{Deserialize, Serialize};

/// One linear Q-function: `q(s, a) = w_a · s + b_a`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    pub input_len: usize,
    pub n_actions: usize,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl LinearParams {
    pub fn zeroed(input_len: usize, n_actions: usize) -> Self {
        Self {
            input_len,
            n_actions,
            weights: vec![0.0; input_len * n_actions],
            bias: vec![0.0; n_actions],
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.weights.len() == self.input_len * self.n_actions && self.bias.len() == self.n_actions
    }

    fn row(&self, action: usize) -> &[f32] {
        &self.weights[action * self.input_len..(action + 1) * self.input_len]
    }

    pub fn q_value(&self, input: &[f32], action: usize) -> f32 {
        let dot: f32 = self.row(action).iter().zip(input).map(|(w, x)| w * x).sum();
        dot + self.bias[action]
    }

    pub fn q_values(&self, input: &[f32]) -> Vec<f32> {
        (0..self.n_actions)
            .map(|action| self.q_value(input, action))
            .collect()
    }

    pub fn max_q_value(&self, input: &[f32]) -> f32 {
        self.q_values(input)
            .into_iter()
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Index of the largest q-value; ties go to the lowest index.
    pub fn argmax(&self, input: &[f32]) -> usize {
        let mut best = 0;
        let mut best_q = f32::NEG_INFINITY;
        for (action, q) in self.q_values(input).into_iter().enumerate() {
            if q > best_q {
                best = action;
                best_q = q;
            }
        }
        best
    }

    /// `w_a += scale * input`, `b_a += scale`.
    pub fn nudge(&mut self, input: &[f32], action: usize, scale: f32) {
        let start = action * self.input_len;
        for (w, x) in self.weights[start..start + self.input_len]
            .iter_mut()
            .zip(input)
        {
            *w += scale * x;
        }
        self.bias[action] += scale;
    }
}
