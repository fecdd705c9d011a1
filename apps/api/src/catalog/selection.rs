use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::question::BankQuestion;

/// Picks a random subset of `n` questions (or the whole bank when it is smaller).
/// The random source is explicit so tests can pass a seeded one.
pub fn select_questions<R: Rng + ?Sized>(
    bank: &[BankQuestion],
    n: usize,
    rng: &mut R,
) -> Vec<BankQuestion> {
    let mut picked = bank.to_vec();
    picked.shuffle(rng);
    picked.truncate(n);
    picked
}

/// Eight decimal digits with no leading zero.
pub fn generate_test_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(10_000_000u32..100_000_000).to_string()
}
