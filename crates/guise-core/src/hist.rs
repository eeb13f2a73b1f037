//! Histogram comparison.

/// Pearson-style correlation between two intensity histograms, in [-1, 1].
///
/// Matches the classic `d(H1, H2) = Σ(H1' H2') / sqrt(Σ H1'² Σ H2'²)` form
/// with mean-centered bins. A zero-variance histogram yields 0.0 rather
/// than a numeric fault.
pub fn correlation(h1: &[f64; 256], h2: &[f64; 256]) -> f64 {
    let n = h1.len() as f64;
    let mean1: f64 = h1.iter().sum::<f64>() / n;
    let mean2: f64 = h2.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den1 = 0.0;
    let mut den2 = 0.0;
    for i in 0..h1.len() {
        let d1 = h1[i] - mean1;
        let d2 = h2[i] - mean2;
        num += d1 * d2;
        den1 += d1 * d1;
        den2 += d2 * d2;
    }

    let denom = (den1 * den2).sqrt();
    if denom > 0.0 {
        num / denom
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::GrayFrame;

    #[test]
    fn test_correlation_identical() {
        let frame = GrayFrame::from_raw(vec![0, 50, 100, 200], 2, 2).unwrap();
        let h = frame.histogram();
        assert!((correlation(&h, &h) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_symmetric() {
        let a = GrayFrame::from_raw(vec![0, 0, 10, 20], 2, 2).unwrap().histogram();
        let b = GrayFrame::from_raw(vec![5, 5, 5, 200], 2, 2).unwrap().histogram();
        assert!((correlation(&a, &b) - correlation(&b, &a)).abs() < 1e-12);
    }

    #[test]
    fn test_correlation_bounded() {
        let a = GrayFrame::from_raw(vec![0, 1, 2, 3], 2, 2).unwrap().histogram();
        let b = GrayFrame::from_raw(vec![252, 253, 254, 255], 2, 2).unwrap().histogram();
        let c = correlation(&a, &b);
        assert!((-1.0..=1.0).contains(&c));
    }

    #[test]
    fn test_correlation_zero_variance() {
        let flat = [1.0f64; 256];
        let other = GrayFrame::from_raw(vec![0, 0, 0, 255], 2, 2).unwrap().histogram();
        assert_eq!(correlation(&flat, &other), 0.0);
    }
}
