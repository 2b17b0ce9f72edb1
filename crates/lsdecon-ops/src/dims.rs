//! FFT-friendly extent selection.
//!
//! rustfft is fastest on lengths built from its dedicated radix-2/3
//! butterflies, with at most one radix-5 and one radix-7 stage. Other
//! lengths fall back to mixed-radix or Bluestein plans that are several
//! times slower, so volumes are padded up to the next fast length.

/// Returns `true` if `n` is `2^a * 3^b * 5^c * 7^d` with `c <= 1` and `d <= 1`.
pub fn is_fast_size(n: usize) -> bool {
    if n == 0 {
        return false;
    }
    let mut m = n;
    for p in [2, 3] {
        while m % p == 0 {
            m /= p;
        }
    }
    for p in [5, 7] {
        if m % p == 0 {
            m /= p;
        }
    }
    m == 1
}

/// Smallest fast FFT length `>= n`.
///
/// Idempotent: `optimal_dimension(optimal_dimension(n)) == optimal_dimension(n)`.
/// Terminates because every power of two is a fast length.
///
/// # Example
///
/// ```rust
/// use lsdecon_ops::dims::optimal_dimension;
///
/// assert_eq!(optimal_dimension(256), 256);
/// assert_eq!(optimal_dimension(250), 252);
/// ```
pub fn optimal_dimension(n: usize) -> usize {
    let mut m = n.max(1);
    while !is_fast_size(m) {
        m += 1;
    }
    m
}
