//! Pure window-selection logic: draws an admissible chip origin for a
//! given mode, raster size and coverage probe.

use crate::config::Mode;
use crate::pixel::CoverageStatus;

/// Number of rejected draws the selector tolerates before giving up and
/// returning control to the caller. This is a safety valve, not a semantic
/// change. The worker's own outer loop keeps retrying indefinitely by
/// calling the selector again.
const MAX_DRAWS_PER_CALL: u32 = 10_000;

/// `(i + j) mod 7 != 0` for Training, `== 0` for Evaluation. Inference has
/// no sampling predicate. It never spawns workers and never calls this.
pub fn is_admissible(mode: Mode, i: usize, j: usize) -> bool {
    let residue = (i + j) % 7;
    match mode {
        Mode::Training => residue != 0,
        Mode::Evaluation => residue == 0,
        Mode::Idle | Mode::Inference => false,
    }
}

/// Draws an admissible chip-coordinate origin, in pixels, or `None` if
/// `MAX_DRAWS_PER_CALL` consecutive draws were all rejected (caller should
/// re-check its termination condition and call again).
pub fn select_window<F>(
    mode: Mode,
    rng: &mut fastrand::Rng,
    width: usize,
    height: usize,
    window_size: usize,
    mut coverage_probe: F,
) -> Option<(usize, usize)>
where
    F: FnMut(usize, usize, usize, usize) -> CoverageStatus,
{
    let cols = width / window_size;
    let rows = height / window_size;
    if cols == 0 || rows == 0 {
        return None;
    }

    for _ in 0..MAX_DRAWS_PER_CALL {
        let i = rng.usize(0..cols);
        let j = rng.usize(0..rows);
        if !is_admissible(mode, i, j) {
            continue;
        }
        let (x, y) = (i * window_size, j * window_size);
        if coverage_probe(x, y, window_size, window_size).is_empty() {
            continue;
        }
        return Some((x, y));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_and_evaluation_predicates_are_disjoint_and_total() {
        for i in 0..50 {
            for j in 0..50 {
                let train = is_admissible(Mode::Training, i, j);
                let eval = is_admissible(Mode::Evaluation, i, j);
                assert_ne!(train, eval, "origin ({i},{j}) must be admissible in exactly one mode");
            }
        }
    }

    #[test]
    fn training_predicate_matches_anti_diagonal_split() {
        assert!(!is_admissible(Mode::Training, 0, 0));
        assert!(is_admissible(Mode::Training, 0, 1));
        assert!(!is_admissible(Mode::Training, 3, 4));
        assert!(is_admissible(Mode::Evaluation, 3, 4));
    }

    #[test]
    fn select_window_rejects_all_empty_coverage() {
        let mut rng = fastrand::Rng::with_seed(1);
        let result = select_window(Mode::Training, &mut rng, 700, 700, 100, |_, _, _, _| {
            CoverageStatus::Empty
        });
        assert!(result.is_none());
    }

    #[test]
    fn select_window_returns_aligned_origin() {
        let mut rng = fastrand::Rng::with_seed(42);
        let (x, y) = select_window(Mode::Training, &mut rng, 700, 700, 100, |_, _, _, _| {
            CoverageStatus::Full
        })
        .expect("should find an admissible window");
        assert_eq!(x % 100, 0);
        assert_eq!(y % 100, 0);
        assert!(is_admissible(Mode::Training, x / 100, y / 100));
    }

    #[test]
    fn window_size_equal_to_dimension_yields_single_chip() {
        let mut rng = fastrand::Rng::with_seed(7);
        // (0,0) has residue 0, so it is only admissible in Evaluation mode.
        let result = select_window(Mode::Evaluation, &mut rng, 256, 256, 256, |_, _, _, _| {
            CoverageStatus::Full
        });
        assert_eq!(result, Some((0, 0)));

        let result = select_window(Mode::Training, &mut rng, 256, 256, 256, |_, _, _, _| {
            CoverageStatus::Full
        });
        assert_eq!(result, None);
    }
}
