use std::collections::HashMap;
use rand::seq::SliceRandom;
use rand::Rng;

/// Character count of a dish name, which is what the length cap applies to
pub fn name_len(name: &str) -> usize {
    name.chars().count()
}

/// Letters of a phrase with the word separators dropped, in a random order
pub fn shuffled_letters<R: Rng + ?Sized>(phrase: &str, rng: &mut R) -> Vec<char> {
    let mut letters: Vec<char> = phrase.chars().filter(|&c| c != ' ').collect();
    letters.shuffle(rng);
    letters
}

/// Remove a single instance of `letter` from the pool
pub fn take_one(pool: &mut Vec<char>, letter: char) -> bool {
    match pool.iter().position(|&c| c == letter) {
        Some(pos) => {
            pool.remove(pos);
            true
        }
        None => false,
    }
}

/// Check that two collections hold the same letters, counting duplicates
/// Spaces are ignored on both sides
pub fn same_letters<A, B>(left: A, right: B) -> bool
where
    A: IntoIterator<Item = char>,
    B: IntoIterator<Item = char>,
{
    let mut counts: HashMap<char, isize> = HashMap::new();

    for ch in left.into_iter().filter(|&c| c != ' ') {
        *counts.entry(ch).or_insert(0) += 1;
    }
    for ch in right.into_iter().filter(|&c| c != ' ') {
        *counts.entry(ch).or_insert(0) -= 1;
    }

    counts.values().all(|&n| n == 0)
}
