//! Scalar aggregation over a list of correlation scores.

/// Arithmetic mean; 0.0 for an empty set.
pub fn mean(set: &[f64]) -> f64 {
    if set.is_empty() {
        return 0.0;
    }
    set.iter().sum::<f64>() / set.len() as f64
}

/// Population standard deviation; 0.0 for an empty set.
pub fn std_dev(set: &[f64]) -> f64 {
    if set.is_empty() {
        return 0.0;
    }
    let m = mean(set);
    let variance = set.iter().map(|x| (x - m).powi(2)).sum::<f64>() / set.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_std_dev_population() {
        // Population (not sample) deviation: divide by n
        let set = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((std_dev(&set) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_std_dev_constant_set() {
        assert_eq!(std_dev(&[3.5, 3.5, 3.5]), 0.0);
    }
}
