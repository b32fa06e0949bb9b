/// Number of leading characters `a` and `b` have in common.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_share_everything() {
        assert_eq!(common_prefix_len("abc", "abc"), 3);
        assert_eq!(common_prefix_len("", ""), 0);
    }

    #[test]
    fn empty_string_shares_nothing() {
        assert_eq!(common_prefix_len("", "abc"), 0);
        assert_eq!(common_prefix_len("abc", ""), 0);
    }

    #[test]
    fn stops_at_first_difference() {
        assert_eq!(common_prefix_len("COSTCO #9876543", "COSTCO #1234"), 8);
        assert_eq!(common_prefix_len("cat", "bat"), 0);
    }

    #[test]
    fn case_sensitive() {
        assert_eq!(common_prefix_len("Metro", "METRO"), 1);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(common_prefix_len("café noir", "café crème"), 5);
    }

    #[test]
    fn commutative() {
        assert_eq!(
            common_prefix_len("amazon", "amzn"),
            common_prefix_len("amzn", "amazon")
        );
    }
}
