//! Opaque high-entropy token generation.
//!
//! Authorization codes, federation state, CSRF tokens and key ids all share
//! the same alphabet: 32 alphanumeric characters, ~190 bits of entropy.

use rand::Rng;
use rand_distr::Alphanumeric;

const TOKEN_LEN: usize = 32;

pub fn token() -> String {
    let rng = rand::rng();
    rng.sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
