//! Time-varying source waveforms.

use std::f64::consts::TAU;

use breadboard_core::{Error, Persist, Result, TokenReader, TokenWriter};

/// A source value as a function of simulation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Constant value.
    Dc(f64),

    /// `offset + amplitude * sin(2*pi*frequency*t + phase)`, phase in radians.
    Sine {
        offset: f64,
        amplitude: f64,
        frequency: f64,
        phase: f64,
    },

    /// Square pulse train between `low` and `high`; `duty` is the high
    /// fraction of each period.
    Pulse {
        low: f64,
        high: f64,
        frequency: f64,
        duty: f64,
    },
}

impl Waveform {
    /// A plain sine around zero.
    pub fn sine(amplitude: f64, frequency: f64) -> Self {
        Waveform::Sine {
            offset: 0.0,
            amplitude,
            frequency,
            phase: 0.0,
        }
    }

    /// A symmetric square wave between 0 and `high`.
    pub fn square(high: f64, frequency: f64) -> Self {
        Waveform::Pulse {
            low: 0.0,
            high,
            frequency,
            duty: 0.5,
        }
    }

    /// True when the value never changes.
    pub fn is_dc(&self) -> bool {
        matches!(self, Waveform::Dc(_))
    }

    /// Evaluate at a given time.
    pub fn value_at(&self, time: f64) -> f64 {
        match *self {
            Waveform::Dc(v) => v,
            Waveform::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => offset + amplitude * (TAU * frequency * time + phase).sin(),
            Waveform::Pulse {
                low,
                high,
                frequency,
                duty,
            } => {
                let cycle = (time * frequency).fract();
                let cycle = if cycle < 0.0 { cycle + 1.0 } else { cycle };
                if cycle < duty { high } else { low }
            }
        }
    }
}

impl Persist for Waveform {
    fn kind(&self) -> &'static str {
        "waveform"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        match *self {
            Waveform::Dc(v) => {
                w.push_token("dc");
                w.push_num(v);
            }
            Waveform::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => {
                w.push_token("sine");
                w.push_num(offset);
                w.push_num(amplitude);
                w.push_num(frequency);
                w.push_num(phase);
            }
            Waveform::Pulse {
                low,
                high,
                frequency,
                duty,
            } => {
                w.push_token("pulse");
                w.push_num(low);
                w.push_num(high);
                w.push_num(frequency);
                w.push_num(duty);
            }
        }
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        match r.next_token()? {
            "dc" => Ok(Waveform::Dc(r.num()?)),
            "sine" => Ok(Waveform::Sine {
                offset: r.num()?,
                amplitude: r.num()?,
                frequency: r.num()?,
                phase: r.num()?,
            }),
            "pulse" => Ok(Waveform::Pulse {
                low: r.num()?,
                high: r.num()?,
                frequency: r.num()?,
                duty: r.num()?,
            }),
            other => Err(Error::MalformedRecord(format!(
                "unknown waveform shape '{other}'"
            ))),
        }
    }
}
