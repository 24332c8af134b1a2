//! Uniform pseudo-random numbers for light jitter.
//!
//! Park and Miller's minimal standard generator with a Bays-Durham shuffle
//! table. Deterministic for a given seed, which keeps jittered renders
//! reproducible.

const IA: i64 = 16807;
const IM: i64 = 2147483647;
const AM: f64 = 1.0 / IM as f64;
const IQ: i64 = 127773;
const IR: i64 = 2836;
const NTAB: usize = 32;
const NDIV: i64 = 1 + (IM - 1) / NTAB as i64;
const RNMX: f64 = 1.0 - 1.2e-7;

/// A shuffled minimal standard generator.
#[derive(Clone, Debug)]
pub struct Frand {
    seed: i64,
    iy: i64,
    iv: [i64; NTAB],
}

impl Default for Frand {
    fn default() -> Frand {
        Frand::new(-1)
    }
}

impl Frand {
    /// Creates a generator. Any seed is accepted; zero is bumped to one.
    pub fn new(seed: i64) -> Frand {
        let mut rng = Frand { seed: 0, iy: 0, iv: [0; NTAB] };
        rng.reseed(seed);

        rng
    }

    /// Reloads the shuffle table after eight warm-up draws.
    pub fn reseed(&mut self, seed: i64) {
        self.seed = if seed == 0 { 1 } else { seed.abs() };

        for j in (0..NTAB + 8).rev() {
            self.step();
            if j < NTAB {
                self.iv[j] = self.seed;
            }
        }
        self.iy = self.iv[0];
    }

    fn step(&mut self) {
        // Schrage's method keeps IA * seed inside 32 bits
        let k = self.seed / IQ;
        self.seed = IA * (self.seed - k * IQ) - IR * k;
        if self.seed < 0 {
            self.seed += IM;
        }
    }

    /// Next value in `(0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.step();

        let j = (self.iy / NDIV) as usize;
        self.iy = self.iv[j];
        self.iv[j] = self.seed;

        (AM * self.iy as f64).min(RNMX)
    }
}

/* Tests */

#[test]
fn values_stay_in_unit_interval() {
    let mut rng = Frand::default();

    for _ in 0..10_000 {
        let v = rng.next_f64();
        assert!(v > 0.0 && v < 1.0);
    }
}

#[test]
fn same_seed_same_sequence() {
    let mut a = Frand::new(42);
    let mut b = Frand::new(-42);

    for _ in 0..100 {
        assert_eq!(a.next_f64(), b.next_f64());
    }
}

#[test]
fn mean_is_near_half() {
    let mut rng = Frand::new(7);
    let n = 20_000;
    let mean = (0..n).map(|_| rng.next_f64()).sum::<f64>() / n as f64;

    assert!((mean - 0.5).abs() < 0.02);
}
