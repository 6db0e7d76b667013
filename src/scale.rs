/// Continuous linear mapping from a data domain onto a pixel range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Map a domain value onto the range. A degenerate domain maps to the range midpoint.
    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    /// Extend the domain so both ends fall on round tick steps
    pub fn nice(mut self, count: usize) -> Self {
        self.domain = nice_domain(self.domain.0, self.domain.1, count);
        self
    }

    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (lo, hi) = if self.domain.0 <= self.domain.1 {
            self.domain
        } else {
            (self.domain.1, self.domain.0)
        };
        ticks(lo, hi, count)
    }
}

/// Step between round ticks. Negative results encode the reciprocal of a sub-unit step.
pub fn tick_increment(start: f64, stop: f64, count: usize) -> f64 {
    let step = (stop - start) / count.max(1) as f64;
    if !step.is_finite() || step <= 0.0 {
        return 0.0;
    }
    let power = step.log10().floor();
    let error = step / 10f64.powf(power);
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    if power >= 0.0 {
        factor * 10f64.powf(power)
    } else {
        -10f64.powf(-power) / factor
    }
}

/// Expand `[start, stop]` outward to round values, iterating until the step is stable
pub fn nice_domain(mut start: f64, mut stop: f64, count: usize) -> (f64, f64) {
    let reversed = stop < start;
    if reversed {
        std::mem::swap(&mut start, &mut stop);
    }
    let mut previous: Option<f64> = None;
    for _ in 0..10 {
        let step = tick_increment(start, stop, count);
        if previous == Some(step) {
            break;
        }
        if step > 0.0 {
            start = (start / step).floor() * step;
            stop = (stop / step).ceil() * step;
        } else if step < 0.0 {
            start = (start * step).ceil() / step;
            stop = (stop * step).floor() / step;
        } else {
            break;
        }
        previous = Some(step);
    }
    if reversed {
        (stop, start)
    } else {
        (start, stop)
    }
}

/// Round tick values inside `[start, stop]`
pub fn ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if start == stop {
        return vec![start];
    }
    let step = tick_increment(start, stop, count);
    if step > 0.0 {
        let i0 = (start / step).ceil() as i64;
        let i1 = (stop / step).floor() as i64;
        (i0..=i1).map(|i| i as f64 * step).collect()
    } else if step < 0.0 {
        let inc = -step;
        let i0 = (start * inc).ceil() as i64;
        let i1 = (stop * inc).floor() as i64;
        (i0..=i1).map(|i| i as f64 / inc).collect()
    } else {
        Vec::new()
    }
}

/// Short label for a tick value: integers without a fraction, others with up to 6 significant decimals
pub fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.6}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_increment() {
        assert_eq!(tick_increment(0.0, 10.0, 10), 1.0);
        assert_eq!(tick_increment(0.0, 100.0, 10), 10.0);
        assert_eq!(tick_increment(0.0, 1.0, 10), -10.0);
        assert_eq!(tick_increment(0.0, 0.0, 10), 0.0);
    }

    #[test]
    fn test_nice_domain() {
        assert_eq!(nice_domain(1.0, 10.0, 10), (1.0, 10.0));
        assert_eq!(nice_domain(0.5, 9.7, 10), (0.0, 10.0));
        assert_eq!(nice_domain(3.0, 97.0, 10), (0.0, 100.0));
        assert_eq!(nice_domain(97.0, 3.0, 10), (100.0, 0.0));
    }

    #[test]
    fn test_ticks() {
        assert_eq!(ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(ticks(0.0, 1.0, 4), vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
    }

    #[test]
    fn test_apply() {
        let s = LinearScale::new((0.0, 10.0), (100.0, 0.0));
        assert_eq!(s.apply(0.0), 100.0);
        assert_eq!(s.apply(5.0), 50.0);
        assert_eq!(LinearScale::new((3.0, 3.0), (0.0, 10.0)).apply(3.0), 5.0);
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(20.0), "20");
        assert_eq!(format_tick(0.25), "0.25");
        assert_eq!(format_tick(-3.0), "-3");
    }
}
