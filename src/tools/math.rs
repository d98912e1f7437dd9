/// calculate the how many bits are needed to represent the count(0->count-1),
/// like 8 levels to 3 bits, 32 levels to 5 bits
/// ```
/// use cim_sim::tools::math::count_to_log;
/// assert_eq!(count_to_log(8), 3);
/// assert_eq!(count_to_log(32), 5);
/// assert_eq!(count_to_log(1), 0);
/// ```
///
/// when count is not power of 2, it will be rounded up to the next power of 2
///
/// ```
/// use cim_sim::tools::math::count_to_log;
/// assert_eq!(count_to_log(9), 4);
/// assert_eq!(count_to_log(17), 5);
/// ```
pub fn count_to_log(count: usize) -> usize {
    if count <= 1 {
        return 0;
    }
    (usize::BITS - (count - 1).leading_zeros()) as usize
}

/// the horowitz approximation of a gate delay driven by a ramp input.
///
/// `tr` is the RC time constant of the stage and `ramp_input` the slope of the
/// incoming edge, returns the delay in seconds.
/// ```
/// use cim_sim::tools::math::horowitz;
/// // a step input degenerates to the ln(2) RC delay
/// let d = horowitz(1e-9, f64::INFINITY);
/// assert!((d - 1e-9 * 2f64.ln()).abs() < 1e-15);
/// ```
pub fn horowitz(tr: f64, ramp_input: f64) -> f64 {
    const VS: f64 = 0.5;
    const BETA: f64 = 0.5;
    if tr <= 0.0 {
        return 0.0;
    }
    let alpha = 1.0 / (ramp_input * tr);
    tr * (VS.ln().powi(2) + 2.0 * alpha * BETA * (1.0 - VS)).sqrt()
}

/// ceil of `value / period` as a cycle count, values that are already
/// integral multiples are not rounded up
pub fn cycles_of(value: f64, period: f64) -> f64 {
    assert!(period > 0.0, "clock period must be positive");
    let cycles = value / period;
    let rounded = cycles.round();
    if (cycles - rounded).abs() < 1e-9 {
        rounded
    } else {
        cycles.ceil()
    }
}
