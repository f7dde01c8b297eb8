//! Min-max score normalization.

/// Output for a list whose scores carry no ranking information.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Rescales `scores` onto [0, 1] by min-max. When every score is equal the
/// result is `NEUTRAL_SCORE` for each entry. Non-finite inputs are treated as
/// the list minimum. Apply per retriever, per query.
pub fn min_max(scores: &[f32]) -> Vec<f32> {
    let finite = scores.iter().copied().filter(|s| s.is_finite());
    let (min, max) = finite.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![NEUTRAL_SCORE; scores.len()];
    }
    scores
        .iter()
        .map(|&s| if s.is_finite() { ((s - min) / range).clamp(0.0, 1.0) } else { 0.0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scales_to_unit_interval() {
        assert_eq!(min_max(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn uniform_and_degenerate_lists_are_neutral() {
        assert!(min_max(&[]).is_empty());
        assert_eq!(min_max(&[7.0]), vec![0.5]);
        assert_eq!(min_max(&[0.3, 0.3, 0.3]), vec![0.5; 3]);
    }

    #[test]
    fn negative_scores_are_fine() {
        assert_eq!(min_max(&[-1.0, 1.0]), vec![0.0, 1.0]);
    }

    proptest! {
        #[test]
        fn output_is_bounded_and_order_preserving(scores in prop::collection::vec(-1.0e6f32..1.0e6, 1..40)) {
            let out = min_max(&scores);
            prop_assert_eq!(out.len(), scores.len());
            for v in &out { prop_assert!((0.0..=1.0).contains(v)); }
            for i in 0..scores.len() {
                for j in 0..scores.len() {
                    if scores[i] < scores[j] { prop_assert!(out[i] <= out[j]); }
                }
            }
        }

        #[test]
        fn uniform_input_is_half(value in -1.0e6f32..1.0e6, len in 1usize..20) {
            prop_assert!(min_max(&vec![value; len]).iter().all(|v| *v == 0.5));
        }
    }
}
