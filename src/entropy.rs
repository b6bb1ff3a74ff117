use ndarray::ArrayView1;

/// Probabilities at or below this value contribute nothing to the entropy.
pub const EPSILON: f64 = 1e-12;

/// Shannon entropy in bits, `-Σ p·log2(p)` over entries above [`EPSILON`].
pub fn shannon_entropy(p: &ArrayView1<f64>) -> f64 {
    -p.iter()
        .filter(|&&pj| pj > EPSILON)
        .map(|&pj| pj * pj.log2())
        .sum::<f64>()
}

/// Converts an entropy in bits to a perplexity, `2^H`.
pub fn entropy_to_perplexity(entropy: f64) -> f64 {
    entropy.exp2()
}
