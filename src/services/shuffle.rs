use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};
use sha2::{Digest, Sha256};

/// Derives a 64-bit seed from stable identifiers. Each part is separated by a
/// NUL byte so ("ab", "c") and ("a", "bc") hash differently.
pub(crate) fn derive_seed(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

pub(crate) fn question_seed(quiz_id: &str, student_id: &str) -> u64 {
    derive_seed(&[quiz_id, student_id])
}

pub(crate) fn option_seed(question_id: &str, student_id: &str) -> u64 {
    derive_seed(&[question_id, student_id])
}

/// Returns a permutation of `items` driven by a generator local to this call.
/// The same seed always yields the same ordering; process-wide random state
/// is never touched.
pub(crate) fn shuffled<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut output = items.to_vec();
    if output.len() < 2 {
        return output;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    output.shuffle(&mut rng);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("question-{index}")).collect()
    }

    #[test]
    fn same_seed_is_deterministic() {
        let items = ids(20);
        let seed = question_seed("quiz-1", "student-1");
        assert_eq!(shuffled(&items, seed), shuffled(&items, seed));
    }

    #[test]
    fn output_is_a_permutation() {
        let items = ids(15);
        let mut output = shuffled(&items, question_seed("quiz-1", "student-1"));
        output.sort();
        let mut expected = items;
        expected.sort();
        assert_eq!(output, expected);
    }

    #[test]
    fn different_students_get_different_orderings() {
        let items = ids(20);
        let first = shuffled(&items, question_seed("quiz-1", "student-1"));
        let second = shuffled(&items, question_seed("quiz-1", "student-2"));
        assert_ne!(first, second);
    }

    #[test]
    fn question_and_option_scopes_use_distinct_seeds() {
        assert_ne!(question_seed("quiz-1", "student-1"), option_seed("quiz-1", "student-1"));
    }

    #[test]
    fn seed_parts_are_not_ambiguous() {
        assert_ne!(derive_seed(&["ab", "c"]), derive_seed(&["a", "bc"]));
    }

    #[test]
    fn empty_and_singleton_pass_through() {
        let empty: Vec<String> = Vec::new();
        assert!(shuffled(&empty, 7).is_empty());
        assert_eq!(shuffled(&["only".to_string()], 7), vec!["only".to_string()]);
    }
}
