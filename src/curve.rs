/// Sample a Catmull-Rom spline through `points`.
///
/// `alpha` selects the parameterization (0 uniform, 0.5 centripetal, 1 chordal). The
/// curve passes through every input point; each segment contributes `samples` points.
pub fn catmull_rom(points: &[(f64, f64)], alpha: f64, samples: usize) -> Vec<(f64, f64)> {
    if points.len() < 3 || samples == 0 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity((points.len() - 1) * samples + 1);
    out.push(points[0]);
    for i in 0..points.len() - 1 {
        let p0 = if i == 0 { points[0] } else { points[i - 1] };
        let p1 = points[i];
        let p2 = points[i + 1];
        let p3 = points.get(i + 2).copied().unwrap_or(p2);
        for s in 1..=samples {
            out.push(segment_point(p0, p1, p2, p3, alpha, s as f64 / samples as f64));
        }
    }
    out
}

fn knot(a: (f64, f64), b: (f64, f64), alpha: f64) -> f64 {
    let d = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt().powf(alpha);
    if d < 1e-9 {
        1.0
    } else {
        d
    }
}

fn lerp(a: (f64, f64), b: (f64, f64), ta: f64, tb: f64, t: f64) -> (f64, f64) {
    let wa = (tb - t) / (tb - ta);
    let wb = (t - ta) / (tb - ta);
    (wa * a.0 + wb * b.0, wa * a.1 + wb * b.1)
}

// Barry-Goldman pyramid evaluation on [t1, t2], u in [0, 1].
fn segment_point(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), alpha: f64, u: f64) -> (f64, f64) {
    let t0 = 0.0;
    let t1 = t0 + knot(p0, p1, alpha);
    let t2 = t1 + knot(p1, p2, alpha);
    let t3 = t2 + knot(p2, p3, alpha);
    let t = t1 + (t2 - t1) * u;

    let a1 = lerp(p0, p1, t0, t1, t);
    let a2 = lerp(p1, p2, t1, t2, t);
    let a3 = lerp(p2, p3, t2, t3, t);
    let b1 = lerp(a1, a2, t0, t2, t);
    let b2 = lerp(a2, a3, t1, t3, t);
    lerp(b1, b2, t1, t2, t)
}
