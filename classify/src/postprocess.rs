/// Exponentiates, then normalizes. There is no max subtraction: large
/// scores overflow to infinity.
pub fn softmax_in_place(scores: &mut [f32]) {
    let mut sum = 0.0f32;
    for x in scores.iter_mut() {
        *x = x.exp();
        sum += *x;
    }
    for x in scores.iter_mut() {
        *x /= sum;
    }
}

/// One star per tenth of probability, rounded half up.
pub fn bar(probability: f32) -> String {
    let len = (probability * 10.0 + 0.5).floor().clamp(0.0, 10.0) as usize;
    "*".repeat(len)
}

pub fn render(probabilities: &[f32]) -> String {
    probabilities
        .iter()
        .enumerate()
        .map(|(ix, p)| format!(" Prob {ix}  {p:5.4} Class {ix}: {}\n", bar(*p)))
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub probabilities: Vec<f32>,
}

impl Classification {
    /// Most likely class and its probability.
    pub fn top(&self) -> Option<(usize, f32)> {
        let mut top: Option<(usize, f32)> = None;
        for (ix, &p) in self.probabilities.iter().enumerate() {
            if top.map(|(_, best)| p > best).unwrap_or(!p.is_nan()) {
                top = Some((ix, p));
            }
        }
        top
    }
}

/// Normalizes raw scores in place and logs the distribution. Never fails:
/// the result is advisory.
pub fn verify_output(scores: &mut [f32]) -> Classification {
    softmax_in_place(scores);
    info!("Output:\n{}", render(scores));
    let classification = Classification { probabilities: scores.to_vec() };
    if let Some((class, p)) = classification.top() {
        debug!("Top class {class} with {p:.4}");
    }
    classification
}
