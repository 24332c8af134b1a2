//! Closed-form polynomial root finding.
//!
//! Coefficients are passed lowest order first:
//!
//! ```text
//! c[0] + c[1]*x + c[2]*x^2 + c[3]*x^3 + c[4]*x^4 = 0
//! ```
//!
//! The cubic and quartic solvers reduce to depressed form and use Cardano's
//! formula, the trigonometric three-root branch, or Ferrari's resolvent
//! cubic. The branch thresholds are part of the contract: curved surfaces
//! rely on the same root multiplicity near degenerate discriminants.

use std::ops::Deref;

use crate::consts::HUGE;

/// Minimum magnitude for a leading coefficient to count.
const COEFF_EPS: f64 = 1e-20;

/// Discriminant tolerance.
const EQN_EPS: f64 = 1e-10;

fn is_zero(a: f64) -> bool {
    a > -EQN_EPS && a < EQN_EPS
}

fn cube_root(x: f64) -> f64 {
    if x > 0.0 {
        x.powf(1.0 / 3.0)
    } else if x < 0.0 {
        -(-x).powf(1.0 / 3.0)
    } else {
        0.0
    }
}

/// Up to four real roots, held inline.
///
/// Dereferences to the slice of valid roots.
#[derive(Copy, Clone, Debug, Default)]
pub struct Roots {
    s: [f64; 4],
    n: usize,
}

impl Roots {
    fn push(&mut self, root: f64) {
        if self.n < 4 {
            self.s[self.n] = root;
            self.n += 1;
        }
    }

    fn shift(&mut self, sub: f64) {
        for r in self.s[..self.n].iter_mut() {
            *r -= sub;
        }
    }
}

impl Deref for Roots {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.s[..self.n]
    }
}

/// Finds the real roots of a polynomial of degree `c.len() - 1` (at most
/// four) lying inside `[lo, hi]`, sorted ascending.
///
/// Insignificant leading coefficients lower the degree first, so a quartic
/// with `c[4] == 0` is solved as a cubic.
pub fn solve_poly(c: &[f64], lo: f64, hi: f64) -> Roots {
    let mut order = c.len().saturating_sub(1).min(4);
    if order == 0 {
        return Roots::default();
    }

    while order > 0 && c[order].abs() < COEFF_EPS {
        order -= 1;
    }

    let mut roots = match order {
        1 => solve_linear(c),
        2 => solve_quadric(c),
        3 => solve_cubic(c),
        4 => solve_quartic(c),
        _ => return Roots::default(),
    };

    // Out of range roots become HUGE so they sort to the back
    let mut valid = roots.n;
    for r in roots.s[..roots.n].iter_mut() {
        if *r < lo || *r > hi {
            *r = HUGE;
            valid -= 1;
        }
    }

    roots.s[..roots.n].sort_by(|a, b|
        a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal)
    );
    roots.n = valid;

    roots
}

pub fn solve_linear(c: &[f64]) -> Roots {
    let mut roots = Roots::default();
    roots.push(-c[0] / c[1]);

    roots
}

pub fn solve_quadric(c: &[f64]) -> Roots {
    let mut roots = Roots::default();

    // normal form: x^2 + px + q = 0
    let p = c[1] / (2.0 * c[2]);
    let q = c[0] / c[2];
    let d = p * p - q;

    if is_zero(d) {
        roots.push(-p);
    } else if d > 0.0 {
        let sqrt_d = d.sqrt();
        roots.push(sqrt_d - p);
        roots.push(-sqrt_d - p);
    }

    roots
}

pub fn solve_cubic(c: &[f64]) -> Roots {
    let mut roots = Roots::default();

    // normal form: x^3 + Ax^2 + Bx + C = 0
    let a = c[2] / c[3];
    let b = c[1] / c[3];
    let cc = c[0] / c[3];

    // x = y - A/3 gives y^3 + py + q = 0
    let sq_a = a * a;
    let p = 1.0 / 3.0 * (-1.0 / 3.0 * sq_a + b);
    let q = 1.0 / 2.0 * (2.0 / 27.0 * a * sq_a - 1.0 / 3.0 * a * b + cc);

    let cb_p = p * p * p;
    let d = q * q + cb_p;

    if is_zero(d) {
        if is_zero(q) {
            // one triple root
            roots.push(0.0);
        } else {
            // one single and one double root
            let u = cube_root(-q);
            roots.push(2.0 * u);
            roots.push(-u);
        }
    } else if d < 0.0 {
        // three real roots
        let phi = 1.0 / 3.0 * (-q / (-cb_p).sqrt()).acos();
        let t = 2.0 * (-p).sqrt();
        let third = std::f64::consts::PI / 3.0;

        roots.push(t * phi.cos());
        roots.push(-t * (phi + third).cos());
        roots.push(-t * (phi - third).cos());
    } else {
        let sqrt_d = d.sqrt();
        let u = cube_root(sqrt_d - q);
        let v = -cube_root(sqrt_d + q);
        roots.push(u + v);
    }

    roots.shift(1.0 / 3.0 * a);
    roots
}

pub fn solve_quartic(c: &[f64]) -> Roots {
    let mut roots = Roots::default();

    // normal form: x^4 + Ax^3 + Bx^2 + Cx + D = 0
    let a = c[3] / c[4];
    let b = c[2] / c[4];
    let cc = c[1] / c[4];
    let d = c[0] / c[4];

    // x = y - A/4 gives y^4 + py^2 + qy + r = 0
    let sq_a = a * a;
    let p = -3.0 / 8.0 * sq_a + b;
    let q = 1.0 / 8.0 * sq_a * a - 1.0 / 2.0 * a * b + cc;
    let r = -3.0 / 256.0 * sq_a * sq_a + 1.0 / 16.0 * sq_a * b - 1.0 / 4.0 * a * cc + d;

    if is_zero(r) {
        // y(y^3 + py + q) = 0
        for s in solve_cubic(&[q, p, 0.0, 1.0]).iter() {
            roots.push(*s);
        }
        roots.push(0.0);
    } else {
        let resolvent = solve_cubic(&[
            1.0 / 2.0 * r * p - 1.0 / 8.0 * q * q,
            -r,
            -1.0 / 2.0 * p,
            1.0,
        ]);
        let z = match resolvent.first() {
            Some(z) => *z,
            None => return roots,
        };

        let mut u = z * z - r;
        let mut v = 2.0 * z - p;

        if is_zero(u) {
            u = 0.0;
        } else if u > 0.0 {
            u = u.sqrt();
        } else {
            return roots;
        }

        if is_zero(v) {
            v = 0.0;
        } else if v > 0.0 {
            v = v.sqrt();
        } else {
            return roots;
        }

        let first = solve_quadric(&[z - u, if q < 0.0 { -v } else { v }, 1.0]);
        let second = solve_quadric(&[z + u, if q < 0.0 { v } else { -v }, 1.0]);
        for s in first.iter().chain(second.iter()) {
            roots.push(*s);
        }
    }

    roots.shift(1.0 / 4.0 * a);
    roots
}

/* Tests */

#[cfg(test)]
fn expand(r: [f64; 4]) -> [f64; 5] {
    // (x - r0)(x - r1)(x - r2)(x - r3), lowest order first
    let mut c = [1.0, 0.0, 0.0, 0.0, 0.0];
    let mut deg = 0;
    for root in r.iter() {
        let mut next = [0.0; 5];
        for i in 0..=deg {
            next[i + 1] += c[i];
            next[i] -= c[i] * root;
        }
        c = next;
        deg += 1;
    }

    c
}

#[test]
fn quadric_two_roots() {
    // x^2 - 5x + 6
    let roots = solve_poly(&[6.0, -5.0, 1.0], -HUGE, HUGE);

    assert_eq!(roots.len(), 2);
    assert!((roots[0] - 2.0).abs() < 1e-9);
    assert!((roots[1] - 3.0).abs() < 1e-9);
}

#[test]
fn quadric_no_real_roots() {
    assert_eq!(solve_poly(&[1.0, 0.0, 1.0], -HUGE, HUGE).len(), 0);
}

#[test]
fn cubic_three_roots() {
    // (x + 1)(x - 2)(x - 4) = x^3 - 5x^2 + 2x + 8
    let roots = solve_poly(&[8.0, 2.0, -5.0, 1.0], -HUGE, HUGE);

    assert_eq!(roots.len(), 3);
    for (got, want) in roots.iter().zip([-1.0, 2.0, 4.0].iter()) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[test]
fn cubic_one_root() {
    // x^3 - 1
    let roots = solve_cubic(&[-1.0, 0.0, 0.0, 1.0]);

    assert_eq!(roots.len(), 1);
    assert!((roots[0] - 1.0).abs() < 1e-9);
}

#[test]
fn quartic_recovers_roots() {
    let want = [-3.0, -0.5, 1.25, 4.0];
    let c = expand([4.0, -0.5, 1.25, -3.0]);
    let roots = solve_poly(&c, -HUGE, HUGE);

    assert_eq!(roots.len(), 4);
    for (got, want) in roots.iter().zip(want.iter()) {
        assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
    }
}

#[test]
fn quartic_symmetric_roots() {
    // x (x - 1)(x - 2)(x - 3)
    let c = expand([0.0, 1.0, 2.0, 3.0]);
    let roots = solve_poly(&c, -HUGE, HUGE);

    assert_eq!(roots.len(), 4);
    for (got, want) in roots.iter().zip([0.0, 1.0, 2.0, 3.0].iter()) {
        assert!((got - want).abs() < 1e-6);
    }
}

#[test]
fn range_filter_drops_roots() {
    let c = expand([-2.0, -1.0, 1.0, 2.0]);
    let roots = solve_poly(&c, 0.0, 10.0);

    assert_eq!(roots.len(), 2);
    assert!((roots[0] - 1.0).abs() < 1e-6);
    assert!((roots[1] - 2.0).abs() < 1e-6);
}

#[test]
fn insignificant_leading_coefficient() {
    // 1e-30 x^2 + 2x - 4 is treated as linear
    let roots = solve_poly(&[-4.0, 2.0, 1e-30], -HUGE, HUGE);

    assert_eq!(roots.len(), 1);
    assert!((roots[0] - 2.0).abs() < 1e-12);
}
