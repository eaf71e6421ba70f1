//! Descriptor matching between two keypoint sets.

use super::detect::Keypoint;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub source_idx: usize,
    pub reference_idx: usize,
    /// Squared descriptor distance.
    pub distance: f32,
}

/// Mutual nearest neighbours that also pass Lowe's ratio test.
///
/// `ratio` bounds `best / second_best` on (unsquared) descriptor distance.
pub fn match_keypoints(
    source: &[Keypoint],
    reference: &[Keypoint],
    ratio: f32,
) -> Vec<FeatureMatch> {
    let ratio_sq = ratio * ratio;

    let forward: Vec<Option<(usize, f32)>> = source
        .iter()
        .map(|kp| nearest(&kp.descriptor, reference, ratio_sq))
        .collect();
    let backward: Vec<Option<(usize, f32)>> = reference
        .iter()
        .map(|kp| nearest(&kp.descriptor, source, ratio_sq))
        .collect();

    forward
        .iter()
        .enumerate()
        .filter_map(|(source_idx, m)| {
            let (reference_idx, distance) = (*m)?;
            let (back_idx, _) = backward[reference_idx]?;
            (back_idx == source_idx).then_some(FeatureMatch {
                source_idx,
                reference_idx,
                distance,
            })
        })
        .collect()
}

/// Best candidate for `descriptor`, if it is distinctive against the runner-up.
fn nearest(descriptor: &[f32], candidates: &[Keypoint], ratio_sq: f32) -> Option<(usize, f32)> {
    let mut best = (usize::MAX, f32::INFINITY);
    let mut second = f32::INFINITY;

    for (i, kp) in candidates.iter().enumerate() {
        if kp.descriptor.len() != descriptor.len() {
            continue;
        }
        let d = squared_distance(descriptor, &kp.descriptor);
        if d < best.1 {
            second = best.1;
            best = (i, d);
        } else if d < second {
            second = d;
        }
    }

    if best.0 == usize::MAX {
        return None;
    }
    (second.is_infinite() || best.1 <= ratio_sq * second).then_some(best)
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;

    fn keypoint(descriptor: &[f32]) -> Keypoint {
        Keypoint {
            position: DVec2::ZERO,
            response: 1.0,
            descriptor: descriptor.to_vec(),
        }
    }

    #[test]
    fn test_mutual_matches() {
        let source = [keypoint(&[1.0, 0.0]), keypoint(&[0.0, 1.0])];
        let reference = [keypoint(&[0.0, 0.9]), keypoint(&[0.9, 0.1])];

        let matches = match_keypoints(&source, &reference, 0.8);
        assert_eq!(matches.len(), 2);
        assert_eq!((matches[0].source_idx, matches[0].reference_idx), (0, 1));
        assert_eq!((matches[1].source_idx, matches[1].reference_idx), (1, 0));
    }

    #[test]
    fn test_ratio_test_drops_ambiguous_matches() {
        let source = [keypoint(&[1.0, 0.0])];
        let reference = [keypoint(&[0.7, 0.7]), keypoint(&[0.7, -0.7])];
        assert!(match_keypoints(&source, &reference, 0.8).is_empty());
    }

    #[test]
    fn test_non_mutual_match_is_dropped() {
        // Both source points prefer reference 0, which prefers source 1.
        let source = [keypoint(&[1.0, 0.0]), keypoint(&[0.95, 0.05])];
        let reference = [keypoint(&[0.96, 0.04]), keypoint(&[-1.0, 0.0])];

        let matches = match_keypoints(&source, &reference, 1.0);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_idx, 1);
    }
}
