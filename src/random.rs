//! Process-wide seed management for [`KeyMap`](crate::containers::key_map::KeyMap)'s
//! per-instance SipHash secrets.
//!
//! The only process-wide state in the crate (§5). Lazily seeded from the
//! OS CSPRNG on first use via a [`OnceLock`], which already gives us the
//! "serialized by a process-wide lock" requirement for free. Hosts without
//! OS entropy (or tests that need byte-identical output across runs) call
//! [`seed_deterministic`] before constructing any [`KeyMap`](crate::containers::key_map::KeyMap).

use std::sync::OnceLock;

use rand::RngCore;

static SEED: OnceLock<[u8; 16]> = OnceLock::new();

/// Explicitly seed the process-wide secret. Must be called before the first
/// [`KeyMap`](crate::containers::key_map::KeyMap) is constructed to take effect; a later call is a
/// no-op (the seed is fixed for the lifetime of the process).
pub fn seed_deterministic(seed: [u8; 16]) {
    let _ = SEED.set(seed);
}

/// Returns the process-wide secret, seeding it from OS entropy on first use.
pub fn secret() -> [u8; 16] {
    *SEED.get_or_init(|| {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    })
}

/// Derives a fresh per-instance 16-byte secret from the process-wide seed,
/// counter-mode style: `SipHash-2-4(seed, counter)` expanded to 16 bytes.
/// Each call advances a process-wide counter, so distinct `KeyMap`s get
/// distinct secrets without re-touching the OS entropy source.
pub fn next_instance_secret() -> [u8; 16] {
    use std::sync::atomic::{AtomicU64, Ordering};

    use siphasher::sip::SipHasher24;
    use std::hash::Hasher;

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let seed = secret();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    let key0 = u64::from_le_bytes(seed[0..8].try_into().unwrap());
    let key1 = u64::from_le_bytes(seed[8..16].try_into().unwrap());

    let mut low = SipHasher24::new_with_keys(key0, key1);
    low.write_u64(counter);
    low.write_u8(0);
    let lo = low.finish();

    let mut high = SipHasher24::new_with_keys(key0, key1);
    high.write_u64(counter);
    high.write_u8(1);
    let hi = high.finish();

    let mut out = [0u8; 16];
    out[0..8].copy_from_slice(&lo.to_le_bytes());
    out[8..16].copy_from_slice(&hi.to_le_bytes());
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instance_secrets_differ() {
        let a = next_instance_secret();
        let b = next_instance_secret();
        assert_ne!(a, b);
    }
}
