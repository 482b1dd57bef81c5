//! XOR folding of hash outputs down to key and tag widths.

/// Fold `input` in half by XOR-ing its upper half onto its lower half,
/// repeatedly, until it is `width` bytes long.
///
/// # Panics
/// Panics if the input length or `width` is odd, or if halving the input
/// does not land exactly on `width`. Widths are fixed by the cipher suite
/// and never come from the network.
pub fn fold(input: &[u8], width: usize) -> Vec<u8> {
    assert!(input.len() % 2 == 0, "fold input length must be even");
    assert!(width % 2 == 0, "fold width must be even");

    let mut buf = input.to_vec();
    while buf.len() > width {
        let half = buf.len() / 2;
        assert!(half % 2 == 0 || half <= width, "fold cannot halve an odd length");
        for i in 0..half {
            buf[i] ^= buf[half + i];
        }
        buf.truncate(half);
    }
    assert_eq!(buf.len(), width, "fold cannot reach width {}", width);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_once() {
        assert_eq!(fold(&[0x01, 0x02, 0x10, 0x20], 2), vec![0x11, 0x22]);
    }

    #[test]
    fn test_fold_to_tag_width() {
        let input: Vec<u8> = (0u8..32).collect();
        let out = fold(&input, 4);
        assert_eq!(out.len(), 4);

        // 32 -> 16 -> 8 -> 4, each step xors the halves
        let mut expected = input.clone();
        for half in [16usize, 8, 4] {
            for i in 0..half {
                expected[i] ^= expected[half + i];
            }
            expected.truncate(half);
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn test_fold_to_own_length_is_identity() {
        assert_eq!(fold(&[1, 2, 3, 4], 4), vec![1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "cannot reach width")]
    fn test_fold_wider_than_input_panics() {
        fold(&[1, 2], 4);
    }

    #[test]
    #[should_panic(expected = "cannot reach width")]
    fn test_fold_past_width_panics() {
        fold(&[0u8; 32], 6);
    }

    #[test]
    #[should_panic(expected = "even")]
    fn test_fold_odd_width_panics() {
        fold(&[0u8; 32], 3);
    }

    #[test]
    #[should_panic(expected = "even")]
    fn test_fold_odd_input_panics() {
        fold(&[0u8; 33], 4);
    }
}
