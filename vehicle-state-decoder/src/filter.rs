//! Speed estimation filter
//!
//! A steady-state 1-D Kalman filter over a constant-velocity model:
//!
//! ```text
//! x = [speed, acceleration]
//! A = [[1, dt], [0, 1]]     C = [1, 0]     K = [k0, k1]
//! x' = A·x + K·(z − C·A·x)
//! ```
//!
//! The gain is precomputed, so each update is a handful of multiplications.

/// Speed and acceleration estimate fed by the raw mean wheel speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedFilter {
    /// Estimated speed (m/s)
    speed: f64,
    /// Estimated acceleration (m/s²)
    accel: f64,
    dt: f64,
    gains: [f64; 2],
    reset_threshold: f64,
}

impl SpeedFilter {
    /// Create a filter at rest
    pub fn new(dt: f64, gains: [f64; 2], reset_threshold: f64) -> Self {
        Self {
            speed: 0.0,
            accel: 0.0,
            dt,
            gains,
            reset_threshold,
        }
    }

    /// Feed one raw speed sample, returning `(speed, acceleration)`
    ///
    /// A sample further than the reset threshold from the current estimate
    /// re-seeds the filter at that speed with zero acceleration first.
    pub fn update(&mut self, measured_speed: f64) -> (f64, f64) {
        if (measured_speed - self.speed).abs() > self.reset_threshold {
            log::debug!(
                "Speed filter reset: estimate {:.3} m/s, measured {:.3} m/s",
                self.speed,
                measured_speed
            );
            self.speed = measured_speed;
            self.accel = 0.0;
        }

        let predicted_speed = self.speed + self.dt * self.accel;
        let predicted_accel = self.accel;
        let innovation = measured_speed - predicted_speed;

        self.speed = predicted_speed + self.gains[0] * innovation;
        self.accel = predicted_accel + self.gains[1] * innovation;

        (self.speed, self.accel)
    }

    /// Return to rest
    pub fn reset(&mut self) {
        self.speed = 0.0;
        self.accel = 0.0;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn accel(&self) -> f64 {
        self.accel
    }
}
