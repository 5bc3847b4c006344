//! Shuffle helpers.

use rand::seq::SliceRandom;
use rand::Rng;

/// Moves `items[pinned]` to the front and permutes the rest.
///
/// Out-of-range `pinned` values shuffle the whole slice.
pub fn shuffle_pinned<T, R: Rng + ?Sized>(items: &mut [T], pinned: usize, rng: &mut R) {
    if items.is_empty() {
        return;
    }

    if pinned >= items.len() {
        items.shuffle(rng);
        return;
    }

    items.swap(0, pinned);
    items[1..].shuffle(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pinned_item_goes_first() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut items: Vec<u32> = (0..10).collect();
            shuffle_pinned(&mut items, 7, &mut rng);

            assert_eq!(items[0], 7);
            let mut sorted = items.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..10).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_empty_and_single() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u32> = Vec::new();
        shuffle_pinned(&mut empty, 0, &mut rng);
        assert!(empty.is_empty());

        let mut single = vec![42];
        shuffle_pinned(&mut single, 0, &mut rng);
        assert_eq!(single, vec![42]);
    }
}
