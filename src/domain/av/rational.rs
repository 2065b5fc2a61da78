use std::fmt;
use std::str::FromStr;

/// A frame rate or time base as ffprobe prints it, e.g. `30000/1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn new(num: u32, den: u32) -> Option<Self> {
        if num == 0 || den == 0 {
            return None;
        }
        Some(Self { num, den })
    }
}

impl FromStr for Rational {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num, den),
            None => (s, "1"),
        };
        let num = num
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid numerator in {:?}: {}", s, e))?;
        let den = den
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid denominator in {:?}: {}", s, e))?;
        Rational::new(num, den).ok_or_else(|| format!("degenerate rational {:?}", s))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}
