use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_distr::StandardNormal;

use crate::core::error::{Error, Result};
use crate::utils::math::{
    find_categorical_section, normal_cdf, normal_log_pdf, normal_pdf, normal_quantile,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformDistribution {
    lower: f64,
    upper: f64,
}

impl UniformDistribution {
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        if !(lower < upper) {
            return Err(Error::InvalidDistribution(format!(
                "uniform bounds [{lower}, {upper}] are empty"
            )));
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if x < self.lower || x > self.upper {
            0.0
        } else {
            1.0 / (self.upper - self.lower)
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.random_range(self.lower..self.upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalDistribution {
    mean: f64,
    standard_deviation: f64,
}

impl NormalDistribution {
    pub fn new(mean: f64, standard_deviation: f64) -> Result<Self> {
        if !(standard_deviation >= 0.0) || !mean.is_finite() {
            return Err(Error::InvalidDistribution(format!(
                "normal distribution needs a finite mean and a non-negative stddev, got ({mean}, {standard_deviation})"
            )));
        }
        Ok(Self {
            mean,
            standard_deviation,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn standard_deviation(&self) -> f64 {
        self.standard_deviation
    }

    pub fn pdf(&self, x: f64) -> f64 {
        normal_pdf(x, self.mean, self.standard_deviation)
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        normal_log_pdf(x, self.mean, self.standard_deviation)
    }

    pub fn cdf(&self, x: f64) -> f64 {
        normal_cdf(x, self.mean, self.standard_deviation)
    }

    pub fn inverse_cdf(&self, p: f64) -> f64 {
        normal_quantile(p, self.mean, self.standard_deviation)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        self.mean + self.standard_deviation * z
    }
}

/// Normal distribution restricted to `[a, b]` and renormalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncatedNormalDistribution {
    normal: NormalDistribution,
    a: f64,
    b: f64,
    phi_a: f64,
    phi_b: f64,
}

impl TruncatedNormalDistribution {
    pub fn new(mean: f64, standard_deviation: f64, a: f64, b: f64) -> Result<Self> {
        let normal = NormalDistribution::new(mean, standard_deviation)?;
        if a > b {
            return Err(Error::InvalidDistribution(format!(
                "lower bound {a} is larger than upper bound {b}"
            )));
        }
        Ok(Self {
            normal,
            a,
            b,
            phi_a: normal.cdf(a),
            phi_b: normal.cdf(b),
        })
    }

    pub fn normal(&self) -> &NormalDistribution {
        &self.normal
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn pdf(&self, x: f64) -> f64 {
        if x < self.a || x > self.b {
            return 0.0;
        }
        let mass = self.phi_b - self.phi_a;
        if mass <= 0.0 {
            // the whole normal mass lies outside [a, b] numerically
            return 0.0;
        }
        self.normal.pdf(x) / mass
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        let mass = self.phi_b - self.phi_a;
        if x < self.a || x > self.b || mass <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.normal.log_pdf(x) - mass.ln()
    }

    pub fn cdf(&self, x: f64) -> f64 {
        if x < self.a {
            0.0
        } else if x >= self.b {
            1.0
        } else {
            (self.normal.cdf(x) - self.phi_a) / (self.phi_b - self.phi_a)
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.random();
        let p = self.phi_a + u * (self.phi_b - self.phi_a);
        self.normal.inverse_cdf(p).clamp(self.a, self.b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalDistribution {
    probabilities: Vec<f64>,
}

impl CategoricalDistribution {
    pub fn new(probabilities: Vec<f64>) -> Result<Self> {
        if probabilities.iter().any(|p| !(*p >= 0.0)) {
            return Err(Error::InvalidDistribution(format!(
                "categorical probabilities must be non-negative, got {probabilities:?}"
            )));
        }
        Ok(Self { probabilities })
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    /// Probability of category `x`. A value that is not one of the
    /// categories has probability zero.
    pub fn pdf(&self, x: f64) -> f64 {
        if x.fract() != 0.0 || x < 0.0 {
            return 0.0;
        }
        self.probabilities.get(x as usize).copied().unwrap_or(0.0)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let p: f64 = rng.random();
        find_categorical_section(&self.probabilities, p) as f64
    }
}

/// Generator for one dataset column.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Uniform(UniformDistribution),
    Normal(NormalDistribution),
    TruncatedNormal(TruncatedNormalDistribution),
    Categorical(CategoricalDistribution),
}

impl Distribution {
    /// Arity recorded for a column drawn from this distribution.
    pub fn category_count(&self) -> u32 {
        match self {
            Distribution::Categorical(d) => d.probabilities().len() as u32,
            _ => 0,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Distribution::Uniform(d) => d.sample(rng),
            Distribution::Normal(d) => d.sample(rng),
            Distribution::TruncatedNormal(d) => d.sample(rng),
            Distribution::Categorical(d) => d.sample(rng),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Uniform(d) => write!(f, "UniformDistribution({},{})", d.lower, d.upper),
            Distribution::Normal(d) => {
                write!(f, "NormalDistribution({},{})", d.mean, d.standard_deviation)
            }
            Distribution::TruncatedNormal(d) => write!(
                f,
                "TruncatedNormalDistribution({},{},{},{})",
                d.normal.mean, d.normal.standard_deviation, d.a, d.b
            ),
            Distribution::Categorical(d) => {
                let p: Vec<String> = d.probabilities.iter().map(|p| p.to_string()).collect();
                write!(f, "CategoricalDistribution({})", p.join(","))
            }
        }
    }
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidDistribution(format!("cannot parse '{s}'"));
        let open = s.find('(').ok_or_else(invalid)?;
        let name = &s[..open];
        let body = s[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
        let args: Vec<f64> = body
            .split(',')
            .map(|t| t.trim().parse::<f64>().map_err(|_| invalid()))
            .collect::<Result<_>>()?;

        match (name, args.as_slice()) {
            ("UniformDistribution", &[a, b]) => Ok(Distribution::Uniform(UniformDistribution::new(a, b)?)),
            ("NormalDistribution", &[mu, sigma]) => {
                Ok(Distribution::Normal(NormalDistribution::new(mu, sigma)?))
            }
            ("TruncatedNormalDistribution", &[mu, sigma, a, b]) => Ok(Distribution::TruncatedNormal(
                TruncatedNormalDistribution::new(mu, sigma, a, b)?,
            )),
            ("CategoricalDistribution", p) if !p.is_empty() => Ok(Distribution::Categorical(
                CategoricalDistribution::new(p.to_vec())?,
            )),
            _ => Err(invalid()),
        }
    }
}

/// Parses one distribution per non-empty line.
pub fn parse_distribution_list(text: &str) -> Result<Vec<Distribution>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            line.parse::<Distribution>()
                .map_err(|e| Error::parse(i + 1, e.to_string()))
        })
        .collect()
}
