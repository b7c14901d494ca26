//! One-dimensional minimization used by the direction-set optimizers.

use nalgebra::DVector;
use crate::error::Result;
use super::objective::Objective;

const GOLDEN: f64 = 1.618_034;
const GOLDEN_SECTION: f64 = 0.381_966_0;
const GROW_LIMIT: f64 = 100.0;
const TINY: f64 = 1e-20;
const ZEPS: f64 = 1e-10;
const BRENT_MAX_ITERATIONS: usize = 100;

/// Three abscissae with `f(b) <= f(a)` and `f(b) <= f(c)`.
#[derive(Debug, Clone, Copy)]
pub struct Bracket {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub fb: f64,
}

/// Bracket a minimum starting from `[a, b]` by golden expansion with parabolic steps.
pub fn bracket<F>(f: &mut F, mut a: f64, mut b: f64) -> Result<Bracket>
where
    F: FnMut(f64) -> Result<f64>,
{
    let mut fa = f(a)?;
    let mut fb = f(b)?;
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLDEN * (b - a);
    let mut fc = f(c)?;
    let mut guard = 0;
    while fb > fc && guard < 200 {
        guard += 1;
        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denom = 2.0 * (q - r).abs().max(TINY).copysign(q - r);
        let mut u = b - ((b - c) * q - (b - a) * r) / denom;
        let ulim = b + GROW_LIMIT * (c - b);
        let mut fu;
        if (b - u) * (u - c) > 0.0 {
            fu = f(u)?;
            if fu < fc {
                return Ok(ordered(b, u, c, fu));
            } else if fu > fb {
                return Ok(ordered(a, b, u, fb));
            }
            u = c + GOLDEN * (c - b);
            fu = f(u)?;
        } else if (c - u) * (u - ulim) > 0.0 {
            fu = f(u)?;
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLDEN * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u)?;
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u)?;
        } else {
            u = c + GOLDEN * (c - b);
            fu = f(u)?;
        }
        a = b;
        b = c;
        c = u;
        fa = fb;
        fb = fc;
        fc = fu;
    }
    Ok(ordered(a, b, c, fb))
}

fn ordered(a: f64, b: f64, c: f64, fb: f64) -> Bracket {
    if a <= c {
        Bracket { a, b, c, fb }
    } else {
        Bracket { a: c, b, c: a, fb }
    }
}

/// Brent's method inside `bracket`; returns `(x_min, f_min)`.
pub fn brent<F>(f: &mut F, bracket: Bracket, tolerance: f64) -> Result<(f64, f64)>
where
    F: FnMut(f64) -> Result<f64>,
{
    let (mut a, mut b) = (bracket.a, bracket.c);
    let mut x = bracket.b;
    let (mut w, mut v) = (x, x);
    let mut fx = bracket.fb;
    let (mut fw, mut fv) = (fx, fx);
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for _ in 0..BRENT_MAX_ITERATIONS {
        let xm = 0.5 * (a + b);
        let tol1 = tolerance * x.abs() + ZEPS;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let etemp = e;
            e = d;
            if p.abs() >= (0.5 * q * etemp).abs() || p <= q * (a - x) || p >= q * (b - x) {
                e = if x >= xm { a - x } else { b - x };
                d = GOLDEN_SECTION * e;
            } else {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
            }
        } else {
            e = if x >= xm { a - x } else { b - x };
            d = GOLDEN_SECTION * e;
        }
        let u = if d.abs() >= tol1 { x + d } else { x + tol1.copysign(d) };
        let fu = f(u)?;
        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            v = w;
            w = x;
            x = u;
            fv = fw;
            fw = fx;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                w = u;
                fv = fw;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }
    Ok((x, fx))
}

/// Minimize the objective along `direction` from `origin`.
///
/// Returns the step multiplier, the new point and its (minimized) value.
pub(crate) fn line_minimize(
    objective: &mut Objective<'_>,
    origin: &DVector<f64>,
    direction: &DVector<f64>,
    initial_step: f64,
    tolerance: f64,
) -> Result<(f64, DVector<f64>, f64)> {
    let mut along = |t: f64| objective.value(&(origin + direction * t));
    let found = bracket(&mut along, 0.0, initial_step)?;
    let (t, value) = brent(&mut along, found, tolerance)?;
    Ok((t, origin + direction * t, value))
}
