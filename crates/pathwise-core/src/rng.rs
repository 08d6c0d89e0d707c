//! Seeded linear-congruential generator.
//!
//! The generator is a plain value. Anything that needs randomness takes
//! a `&mut DeterministicRng` argument; there is no process-wide RNG, so
//! concurrent jobs cannot disturb each other's sequences.
//!
//! The constants (`1664525`, `1013904223`, modulus `2^32`) are fixed so
//! that a seed produces the same stream in every implementation that
//! uses them.

/// LCG multiplier.
const MULTIPLIER: u32 = 1_664_525;
/// LCG increment.
const INCREMENT: u32 = 1_013_904_223;
/// `2^32` as a float, the uniform-draw divisor.
const TWO_POW_32: f64 = 4_294_967_296.0;

/// A deterministic pseudo-random generator owned by exactly one computation.
///
/// Deliberately not `Clone`: forking a stream must be explicit via
/// [`fork`](Self::fork).
///
/// # Examples
///
/// ```
/// use pathwise_core::DeterministicRng;
///
/// let mut a = DeterministicRng::new(42);
/// let mut b = DeterministicRng::new(42);
/// for _ in 0..10 {
///     assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
/// }
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct DeterministicRng {
    state: u32,
}

impl DeterministicRng {
    /// Create a generator whose first state is `seed`.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Current internal state.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// An independent copy continuing from the same state.
    pub fn fork(&self) -> Self {
        Self { state: self.state }
    }

    /// Advance and return the new 32-bit state.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform draw in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / TWO_POW_32
    }

    /// Uniform draw in `[lo, hi)`.
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Standard normal draw via the Box-Muller transform.
    ///
    /// Consumes two uniform draws per call; the first is kept away from
    /// zero so the logarithm stays finite.
    pub fn next_gaussian(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-300);
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}
