//! Per-slot deterministic random streams.
//!
//! Every environment slot owns an independent `ChaCha8Rng`. A slot's stream is
//! derived from its `u32` seed and the table's domain tag through HMAC-SHA256,
//! so tables built for different purposes never share a sequence even when they
//! are seeded with the same values. Draws only ever touch the slots named in the
//! call; everything else stays bit-for-bit unchanged.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::Sha256;
use std::f32::consts::TAU;

use crate::numbers::usize_to_u32;
use crate::slots::{ArgumentError, SlotIds};

/// Stream type owned by each slot.
pub type SlotRng = CountingRng<ChaCha8Rng>;

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha8Rng> {
    fn from_stream_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream since it was seeded.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

pub(crate) fn derive_stream_seed(seed: u32, domain_tag: &[u8]) -> u64 {
    let mut mac = Hmac::<Sha256>::new_from_slice(&seed.to_le_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

pub(crate) fn draw_uniform<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    rng.gen_range(lo..hi)
}

/// Box-Muller transform; `1 - u` keeps the logarithm away from zero.
pub(crate) fn draw_normal<R: Rng + ?Sized>(rng: &mut R, mean: f32, std: f32) -> f32 {
    let u1 = 1.0 - rng.r#gen::<f32>();
    let u2 = rng.r#gen::<f32>();
    mean + std * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

pub(crate) fn draw_integer<R: Rng + ?Sized>(rng: &mut R, lo: i64, hi: i64) -> i64 {
    rng.gen_range(lo..hi)
}

pub(crate) fn draw_sign<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    if rng.r#gen::<bool>() { 1.0 } else { -1.0 }
}

/// Table of independent per-slot random streams.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamTable {
    domain: &'static [u8],
    seeds: Vec<u32>,
    streams: Vec<SlotRng>,
}

impl StreamTable {
    /// Build a table for `num_slots` slots; slot `e` starts from `base_seed + e`.
    #[must_use]
    pub fn new(num_slots: usize, base_seed: u32, domain: &'static [u8]) -> Self {
        let seeds: Vec<u32> = (0..num_slots)
            .map(|slot| base_seed.wrapping_add(usize_to_u32(slot)))
            .collect();
        let streams = seeds
            .iter()
            .map(|&seed| SlotRng::from_stream_seed(derive_stream_seed(seed, domain)))
            .collect();
        Self {
            domain,
            seeds,
            streams,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[must_use]
    pub const fn domain(&self) -> &'static [u8] {
        self.domain
    }

    /// Seed last applied to `slot`.
    #[must_use]
    pub fn seed(&self, slot: usize) -> Option<u32> {
        self.seeds.get(slot).copied()
    }

    /// Draw calls made against `slot` since it was last seeded.
    #[must_use]
    pub fn draws(&self, slot: usize) -> Option<u64> {
        self.streams.get(slot).map(CountingRng::draws)
    }

    /// Read-only view of a slot's stream state.
    #[must_use]
    pub fn stream(&self, slot: usize) -> Option<&SlotRng> {
        self.streams.get(slot)
    }

    /// Overwrite the streams of exactly the slots named in `ids`.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` when `seeds` and `ids` differ in length or an id
    /// is out of range or repeated. No slot is touched on error.
    pub fn set_seeds(&mut self, seeds: &[u32], ids: &[u32]) -> Result<(), ArgumentError> {
        if seeds.len() != ids.len() {
            return Err(ArgumentError::LengthMismatch {
                what: "seeds",
                expected: ids.len(),
                actual: seeds.len(),
            });
        }
        let selection = SlotIds::new(ids, self.len())?;
        for (slot, &seed) in selection.iter().zip(seeds) {
            self.reseed(slot, seed);
        }
        Ok(())
    }

    /// Uniform `f32` draws in `[lo, hi)`, `product(shape)` values per slot, row-major by id.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for invalid ids, or for an empty range or one whose
    /// width overflows `f32`.
    pub fn sample_uniform(
        &mut self,
        lo: f32,
        hi: f32,
        shape: &[usize],
        ids: &[u32],
    ) -> Result<Vec<f32>, ArgumentError> {
        if !(lo.is_finite() && hi.is_finite() && lo < hi && (hi - lo).is_finite()) {
            return Err(ArgumentError::InvalidRange {
                what: "uniform",
                lo: f64::from(lo),
                hi: f64::from(hi),
            });
        }
        self.fill(shape, ids, |rng| draw_uniform(rng, lo, hi))
    }

    /// Gaussian `f32` draws with the given mean and standard deviation.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for invalid ids, a non-finite mean, or a negative
    /// or non-finite standard deviation.
    pub fn sample_normal(
        &mut self,
        mean: f32,
        std: f32,
        shape: &[usize],
        ids: &[u32],
    ) -> Result<Vec<f32>, ArgumentError> {
        if !(mean.is_finite() && std.is_finite() && std >= 0.0) {
            return Err(ArgumentError::InvalidRange {
                what: "normal",
                lo: f64::from(mean),
                hi: f64::from(std),
            });
        }
        self.fill(shape, ids, |rng| draw_normal(rng, mean, std))
    }

    /// Integer draws in `[lo, hi)`.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for invalid ids or when `lo >= hi`.
    #[allow(clippy::cast_precision_loss)]
    pub fn sample_integer(
        &mut self,
        lo: i64,
        hi: i64,
        shape: &[usize],
        ids: &[u32],
    ) -> Result<Vec<i64>, ArgumentError> {
        if lo >= hi {
            return Err(ArgumentError::InvalidRange {
                what: "integer",
                lo: lo as f64,
                hi: hi as f64,
            });
        }
        self.fill(shape, ids, |rng| draw_integer(rng, lo, hi))
    }

    /// One fair ±1 draw per named slot, taken from that slot's own stream.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError` for invalid ids.
    pub fn sample_sign(&mut self, ids: &[u32]) -> Result<Vec<f32>, ArgumentError> {
        self.fill(&[], ids, |rng| draw_sign(rng))
    }

    pub(crate) fn reseed(&mut self, slot: usize, seed: u32) {
        self.seeds[slot] = seed;
        self.streams[slot] = SlotRng::from_stream_seed(derive_stream_seed(seed, self.domain));
    }

    pub(crate) fn stream_mut(&mut self, slot: usize) -> &mut SlotRng {
        &mut self.streams[slot]
    }

    fn fill<T>(
        &mut self,
        shape: &[usize],
        ids: &[u32],
        mut draw: impl FnMut(&mut SlotRng) -> T,
    ) -> Result<Vec<T>, ArgumentError> {
        let selection = SlotIds::new(ids, self.len())?;
        let per_slot: usize = shape.iter().product();
        let mut out = Vec::with_capacity(selection.len() * per_slot);
        for slot in selection.iter() {
            let rng = &mut self.streams[slot];
            out.extend((0..per_slot).map(|_| draw(rng)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &[u8] = b"test.domain";

    #[test]
    fn stream_seed_uses_domain_hmac() {
        assert_eq!(
            derive_stream_seed(7, b"track"),
            derive_stream_seed(7, b"track")
        );
        assert_ne!(
            derive_stream_seed(7, b"track"),
            derive_stream_seed(7, b"spawn"),
            "domain tags must derive distinct seeds"
        );
    }

    #[test]
    fn counting_rng_tracks_draws() {
        let mut table = StreamTable::new(2, 1, DOMAIN);
        assert_eq!(table.draws(0), Some(0));
        table.sample_uniform(0.0, 1.0, &[3], &[0]).unwrap();
        assert_eq!(table.draws(0), Some(3));
        assert_eq!(table.draws(1), Some(0));
        assert_eq!(table.draws(2), None);
    }

    #[test]
    fn set_seeds_rejects_mismatched_lengths() {
        let mut table = StreamTable::new(4, 0, DOMAIN);
        let before = table.clone();
        let err = table.set_seeds(&[1, 2], &[0]).unwrap_err();
        assert!(matches!(err, ArgumentError::LengthMismatch { .. }));
        let err = table.set_seeds(&[1], &[9]).unwrap_err();
        assert!(matches!(err, ArgumentError::SlotOutOfRange { slot: 9, .. }));
        assert_eq!(table, before);
    }

    #[test]
    fn same_seed_same_sequence_regardless_of_slot() {
        let mut table = StreamTable::new(3, 100, DOMAIN);
        table.set_seeds(&[55, 55], &[0, 2]).unwrap();
        let draws = table.sample_uniform(-1.0, 1.0, &[4], &[0, 2]).unwrap();
        assert_eq!(&draws[..4], &draws[4..]);
        assert_eq!(table.seed(1), Some(101));
    }

    #[test]
    fn uniform_respects_bounds_and_shape() {
        let mut table = StreamTable::new(2, 9, DOMAIN);
        let draws = table.sample_uniform(2.0, 3.0, &[2, 5], &[1, 0]).unwrap();
        assert_eq!(draws.len(), 20);
        assert!(draws.iter().all(|v| (2.0..3.0).contains(v)));
    }

    #[test]
    fn integer_and_sign_draws_stay_in_domain() {
        let mut table = StreamTable::new(1, 3, DOMAIN);
        let ints = table.sample_integer(-2, 3, &[200], &[0]).unwrap();
        assert!(ints.iter().all(|v| (-2..3).contains(v)));
        assert!(ints.contains(&-2) && ints.contains(&2));
        let signs: Vec<f32> = (0..64)
            .flat_map(|_| table.sample_sign(&[0]).unwrap())
            .collect();
        assert!(signs.iter().all(|s| (s.abs() - 1.0).abs() < f32::EPSILON));
        assert!(signs.iter().any(|s| *s > 0.0) && signs.iter().any(|s| *s < 0.0));
    }

    #[test]
    fn normal_draws_center_on_mean() {
        let mut table = StreamTable::new(1, 11, DOMAIN);
        let draws = table.sample_normal(5.0, 0.5, &[4000], &[0]).unwrap();
        #[allow(clippy::cast_precision_loss)]
        let mean = draws.iter().sum::<f32>() / draws.len() as f32;
        assert!((mean - 5.0).abs() < 0.05, "mean drifted: {mean}");
        assert!(draws.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let mut table = StreamTable::new(1, 0, DOMAIN);
        assert!(table.sample_uniform(1.0, 1.0, &[], &[0]).is_err());
        assert!(matches!(
            table.sample_uniform(-f32::MAX, f32::MAX, &[1], &[0]),
            Err(ArgumentError::InvalidRange { what: "uniform", .. })
        ));
        assert!(table.sample_integer(4, 2, &[], &[0]).is_err());
        assert!(table.sample_normal(0.0, -1.0, &[], &[0]).is_err());
        assert_eq!(table.draws(0), Some(0));
    }
}
