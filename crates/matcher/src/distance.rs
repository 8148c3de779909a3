//! Distance and scoring primitives.

/// Euclidean (L2) distance between two equal-length vectors.
///
/// Accumulates in `f64` so 512 squared differences do not lose precision.
/// Callers check lengths first; extra elements of the longer slice would
/// otherwise be ignored.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Map a distance onto an approximate `[0, 1]` display score.
///
/// `max(0, 1 - distance / 2)`: linear, strictly decreasing on `[0, 2)`, and
/// zero from 2 upwards. Not a calibrated probability.
#[inline]
pub fn confidence(distance: f32) -> f32 {
    (1.0 - distance / 2.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pseudo_random(seed: u32, len: usize) -> Vec<f32> {
        // Small LCG keeps the test free of extra dependencies.
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v = pseudo_random(7, 512);
        assert_eq!(euclidean_distance(&v, &v), 0.0);
        assert_eq!(confidence(0.0), 1.0);
    }

    #[test]
    fn distance_is_symmetric() {
        for seed in 0..32 {
            let a = pseudo_random(seed, 512);
            let b = pseudo_random(seed + 1000, 512);
            assert_eq!(euclidean_distance(&a, &b), euclidean_distance(&b, &a));
        }
    }

    #[test]
    fn known_distances() {
        let zeros = vec![0.0; 512];
        let ones = vec![1.0; 512];
        let expected = (512f64).sqrt() as f32;
        assert_eq!(euclidean_distance(&zeros, &ones), expected);

        let mut five = vec![0.0; 512];
        five[0] = 3.0;
        five[1] = 4.0;
        assert_eq!(euclidean_distance(&zeros, &five), 5.0);
    }

    #[test]
    fn confidence_strictly_decreases_then_clamps() {
        let mut previous = confidence(0.0);
        let mut d = 0.05;
        while d < 2.0 {
            let c = confidence(d);
            assert!(c < previous, "confidence({d}) = {c} not below {previous}");
            assert!((0.0..=1.0).contains(&c));
            previous = c;
            d += 0.05;
        }
        for d in [2.0, 2.5, 5.0, 100.0] {
            assert_eq!(confidence(d), 0.0);
        }
    }
}
