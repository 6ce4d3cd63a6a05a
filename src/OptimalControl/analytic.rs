//! Closed-form solution of the frictionless problem (`R = 0`).
//!
//! The optimal control is bang-bang: `a = aU` until the switching time `ts`, then `a = aL`.
//! With peak velocity `vmax`:
//!
//! ```text
//! L    = vmax^2/(2*aU) - vmax^2/(2*aL)
//! vmax = sqrt(2L / (1/aU - 1/aL))
//! ts   = vmax/aU
//! tf   = vmax/aU - vmax/aL = sqrt(2L*(1/aU - 1/aL))
//! ```
use super::min_time_task::{MinTimeTask, OCPError};

#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BangBangReference {
    pub L: f64,
    pub aU: f64,
    pub aL: f64,
    pub tf: f64,
    pub switching_time: f64,
    pub peak_velocity: f64,
}

/// Minimum time of the frictionless problem; requires `aU > 0 > aL` and `L > 0`
#[allow(non_snake_case)]
pub fn frictionless_min_time(L: f64, aU: f64, aL: f64) -> Result<BangBangReference, OCPError> {
    if !(L > 0.0) || !(aU > 0.0) || !(aL < 0.0) || !L.is_finite() || !aU.is_finite() || !aL.is_finite()
    {
        return Err(OCPError::InvalidConfiguration(format!(
            "closed form needs L > 0 and aL < 0 < aU, got L = {}, aL = {}, aU = {}",
            L, aL, aU
        )));
    }
    let peak_velocity = (2.0 * L / (1.0 / aU - 1.0 / aL)).sqrt();
    let switching_time = peak_velocity / aU;
    let tf = switching_time - peak_velocity / aL;
    Ok(BangBangReference {
        L,
        aU,
        aL,
        tf,
        switching_time,
        peak_velocity,
    })
}

impl BangBangReference {
    pub fn from_task(task: &MinTimeTask) -> Result<Self, OCPError> {
        frictionless_min_time(task.L, task.aU, task.aL)
    }

    pub fn acceleration(&self, t: f64) -> f64 {
        if t < self.switching_time { self.aU } else { self.aL }
    }

    pub fn velocity(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.tf);
        if t < self.switching_time {
            self.aU * t
        } else {
            self.peak_velocity + self.aL * (t - self.switching_time)
        }
    }

    pub fn position(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, self.tf);
        if t < self.switching_time {
            0.5 * self.aU * t * t
        } else {
            let dt = t - self.switching_time;
            0.5 * self.aU * self.switching_time * self.switching_time
                + self.peak_velocity * dt
                + 0.5 * self.aL * dt * dt
        }
    }
}
