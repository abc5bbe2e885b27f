// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]

//! Positional algebra over 0-indexed MMR node positions: height, parent,
//! children, siblings, and size validity. Ported from the reference
//! node's bit-peeling implementation (each position's height is found by
//! repeatedly subtracting the largest fitting peak size `2^k - 1`).

/// Height of the node at `index` (0-indexed).
pub fn height_at_index(index: u64) -> u64 {
    let mut height = index;
    if height != 0 {
        let mut peak_size: u64 = u64::MAX >> height.leading_zeros();
        while peak_size != 0 {
            if height >= peak_size {
                height -= peak_size;
            }
            peak_size >>= 1;
        }
    }
    height
}

/// Index of `index`'s left sibling (the sibling with the lower position).
pub fn left_sibling_index(index: u64) -> u64 {
    let height = height_at_index(index);
    index - ((1u64 << (height + 1)) - 1)
}

/// Index of `index`'s right sibling (the sibling with the higher position).
pub fn right_sibling_index(index: u64) -> u64 {
    let height = height_at_index(index);
    index + ((1u64 << (height + 1)) - 1)
}

/// Index of `index`'s parent.
pub fn parent_index(index: u64) -> u64 {
    let height = height_at_index(index);
    if height < height_at_index(index + 1) {
        index + 1
    } else {
        index + (1u64 << (height + 1))
    }
}

/// Index of `index`'s left child. Only meaningful for internal nodes.
pub fn left_child_index(index: u64) -> u64 {
    let height = height_at_index(index);
    index - (1u64 << height)
}

/// Index of `index`'s right child. Only meaningful for internal nodes.
pub fn right_child_index(index: u64) -> u64 {
    index - 1
}

/// Index of the peak immediately to the right of the peak containing `index`.
pub fn next_peak_index(index: u64) -> u64 {
    let mut peak_index = index + 1;
    while height_at_index(peak_index) <= height_at_index(peak_index + 1)
        || height_at_index(peak_index) <= height_at_index(index)
    {
        peak_index += 1;
    }
    peak_index
}

/// Whether `size` is a node count reachable by some append history: it is
/// valid iff peeling off peaks of maximal, then strictly decreasing,
/// heights reduces it to zero.
pub fn is_size_valid(size: u64) -> bool {
    let mut height = size;
    if height != 0 {
        let mut peak_size: u64 = u64::MAX >> height.leading_zeros();
        while peak_size != 0 {
            if height >= peak_size {
                height -= peak_size;
            }
            peak_size >>= 1;
        }
    }
    height == 0
}

/// Number of leaves present at a valid node count `size`.
///
/// # Panics
/// Panics if `size` is not a valid node count; callers must check
/// [`is_size_valid`] first (mirrors the reference implementation, which
/// throws on this precondition).
pub fn number_of_leaves_at_size(size: u64) -> u64 {
    assert!(is_size_valid(size), "size is invalid");
    let mut height = size;
    let mut number_of_leaves = 0u64;
    if height != 0 {
        let mut peak_size: u64 = u64::MAX >> height.leading_zeros();
        while peak_size != 0 {
            if height >= peak_size {
                number_of_leaves += (peak_size + 1) / 2;
                height -= peak_size;
            }
            peak_size >>= 1;
        }
    }
    if height != 0 {
        number_of_leaves + 1
    } else {
        number_of_leaves
    }
}

/// Node count `size` that holds exactly `number_of_leaves` leaves.
pub fn size_at_number_of_leaves(number_of_leaves: u64) -> u64 {
    if number_of_leaves == 0 {
        return 0;
    }
    let mut index = leaf_position(number_of_leaves - 1);
    while height_at_index(index) < height_at_index(index + 1) {
        index = parent_index(index);
    }
    index + 1
}

/// Node position of the leaf at `leaf_index` (0-indexed): `2L - popcount(L)`.
pub fn leaf_position(leaf_index: u64) -> u64 {
    2 * leaf_index - leaf_index.count_ones() as u64
}

/// Positions of every peak in a forest of total node count `size`, in
/// ascending position order (lowest/largest peak first).
pub fn peak_positions(size: u64) -> Vec<u64> {
    assert!(is_size_valid(size), "size is invalid");
    let mut peaks = Vec::new();
    if size == 0 {
        return peaks;
    }
    let mut remaining = size;
    let mut running_sum: u64 = 0;
    let mut peak_size: u64 = u64::MAX >> remaining.leading_zeros();
    while peak_size != 0 {
        if remaining >= peak_size {
            running_sum += peak_size;
            peaks.push(running_sum - 1);
            remaining -= peak_size;
        }
        peak_size >>= 1;
    }
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_matches_known_shape() {
        // Leaves at 0,1,3,4,7,8,10,11 for an 8-leaf MMR; internal nodes
        // at 2 (h1), 5,6 (h1/h2), 9 (h1), 12 (h3, the single peak).
        assert_eq!(height_at_index(0), 0);
        assert_eq!(height_at_index(1), 0);
        assert_eq!(height_at_index(2), 1);
        assert_eq!(height_at_index(3), 0);
        assert_eq!(height_at_index(4), 0);
        assert_eq!(height_at_index(5), 1);
        assert_eq!(height_at_index(6), 2);
    }

    #[test]
    fn size_validity() {
        assert!(is_size_valid(0));
        assert!(is_size_valid(1));
        assert!(is_size_valid(3));
        assert!(!is_size_valid(2));
        assert!(is_size_valid(7));
        assert!(is_size_valid(10));
    }

    #[test]
    fn leaves_at_size_round_trips_size_at_leaves() {
        for n in 0u64..64 {
            let size = size_at_number_of_leaves(n);
            assert!(is_size_valid(size));
            assert_eq!(number_of_leaves_at_size(size), n);
        }
    }

    #[test]
    fn leaf_position_matches_formula() {
        assert_eq!(leaf_position(0), 0);
        assert_eq!(leaf_position(1), 1);
        assert_eq!(leaf_position(2), 3);
        assert_eq!(leaf_position(3), 4);
        assert_eq!(leaf_position(4), 7);
    }

    #[test]
    fn peaks_sum_to_size() {
        for n in 1u64..100 {
            let size = size_at_number_of_leaves(n);
            let peaks = peak_positions(size);
            assert!(!peaks.is_empty());
            assert_eq!(*peaks.last().unwrap(), size - 1);
        }
    }

    #[test]
    fn parent_and_children_are_inverse() {
        for n in 1u64..40 {
            let size = size_at_number_of_leaves(n);
            for i in 0..size {
                let h = height_at_index(i);
                if h > 0 {
                    let l = left_child_index(i);
                    let r = right_child_index(i);
                    assert_eq!(parent_index(l), i);
                    assert_eq!(parent_index(r), i);
                }
            }
        }
    }
}
