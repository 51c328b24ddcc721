/// Return nCk
///
/// Resilient (though not immune) to integer overflow
pub(crate) fn choose(n: usize, k: usize) -> usize {
    if k > n {
        0
    } else if n <= 1 {
        // Optimise by far the most common case
        1
    } else {
        ((k.max(n - k) + 1)..=n).product::<usize>()
            / (2..=k.min(n - k)).product::<usize>()
    }
}

/// Return nCk as a float, for the board-scale counts that overflow any
/// integer type: the product is accumulated as a running ratio so it stays
/// representable whenever the result itself is.
pub(crate) fn choose_f(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}
