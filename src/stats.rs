//! Statistical helpers shared by the plotting functions: summary
//! statistics, binning, kernel density estimation, bootstrap intervals and
//! regression fits.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::PlotError;

/// Fixed seed for every resampling and jitter step, so identical inputs
/// give identical scenes.
pub const SEED: u64 = 0x5eab_0a1d;

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Linear-interpolated percentile of sorted data, `p` in [0, 1].
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn median(values: &[f64]) -> f64 {
    percentile(&sorted(values), 0.5)
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

// =============================================================================
// Estimators and error bars
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimator {
    Mean,
    Median,
    Sum,
    Min,
    Max,
    Count,
}

impl Estimator {
    pub fn parse(name: &str) -> Result<Self, PlotError> {
        match name.to_ascii_lowercase().as_str() {
            "mean" => Ok(Estimator::Mean),
            "median" => Ok(Estimator::Median),
            "sum" => Ok(Estimator::Sum),
            "min" => Ok(Estimator::Min),
            "max" => Ok(Estimator::Max),
            "count" | "size" => Ok(Estimator::Count),
            other => Err(PlotError::invalid(
                "estimator",
                format!("unknown estimator '{}'", other),
            )),
        }
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            Estimator::Mean => mean(values),
            Estimator::Median => median(values),
            Estimator::Sum => values.iter().sum(),
            Estimator::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Estimator::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Estimator::Count => values.len() as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorBar {
    /// Bootstrap confidence interval at the given percent level.
    Ci(f64),
    /// Percentile interval of the data.
    Pi(f64),
    Se,
    Sd,
}

impl ErrorBar {
    pub fn parse(name: &str, level: Option<f64>) -> Result<Self, PlotError> {
        let level = level.unwrap_or(95.0);
        match name.to_ascii_lowercase().as_str() {
            "ci" => Ok(ErrorBar::Ci(level)),
            "pi" => Ok(ErrorBar::Pi(level)),
            "se" => Ok(ErrorBar::Se),
            "sd" => Ok(ErrorBar::Sd),
            other => Err(PlotError::invalid(
                "errorbar",
                format!("unknown error bar method '{}'", other),
            )),
        }
    }

    /// Interval around `estimate` for one group of observations.
    pub fn interval(
        &self,
        values: &[f64],
        estimator: Estimator,
        n_boot: usize,
        rng: &mut StdRng,
    ) -> Option<(f64, f64)> {
        if values.len() < 2 {
            return None;
        }
        let estimate = estimator.apply(values);
        match self {
            ErrorBar::Ci(level) => {
                let boots = bootstrap(values, estimator, n_boot, rng);
                let boots = sorted(&boots);
                let tail = (100.0 - level) / 200.0;
                Some((percentile(&boots, tail), percentile(&boots, 1.0 - tail)))
            }
            ErrorBar::Pi(level) => {
                let data = sorted(values);
                let tail = (100.0 - level) / 200.0;
                Some((percentile(&data, tail), percentile(&data, 1.0 - tail)))
            }
            ErrorBar::Se => {
                let se = std_dev(values) / (values.len() as f64).sqrt();
                Some((estimate - se, estimate + se))
            }
            ErrorBar::Sd => {
                let sd = std_dev(values);
                Some((estimate - sd, estimate + sd))
            }
        }
    }
}

/// Bootstrap distribution of `estimator` over resamples with replacement.
pub fn bootstrap(values: &[f64], estimator: Estimator, n_boot: usize, rng: &mut StdRng) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sample = vec![0.0; n];
    (0..n_boot.max(1))
        .map(|_| {
            for slot in sample.iter_mut() {
                *slot = values[rng.gen_range(0..n)];
            }
            estimator.apply(&sample)
        })
        .collect()
}

/// Indices of one resample with replacement.
pub fn resample_indices(n: usize, rng: &mut StdRng) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

// =============================================================================
// Histogram binning
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bins {
    Auto,
    Fd,
    Sturges,
    Sqrt,
    Rice,
    Scott,
    Count(usize),
}

impl Bins {
    pub fn parse(text: &str) -> Result<Self, PlotError> {
        let text = text.trim();
        if let Ok(n) = text.parse::<usize>() {
            if n == 0 {
                return Err(PlotError::invalid("bins", "number of bins must be positive"));
            }
            return Ok(Bins::Count(n));
        }
        match text.to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Bins::Auto),
            "fd" => Ok(Bins::Fd),
            "sturges" => Ok(Bins::Sturges),
            "sqrt" => Ok(Bins::Sqrt),
            "rice" => Ok(Bins::Rice),
            "scott" => Ok(Bins::Scott),
            other => Err(PlotError::invalid(
                "bins",
                format!("'{}' is not a bin count or a known binning rule", other),
            )),
        }
    }
}

/// Upper bound on the number of histogram bins.
pub const MAX_BINS: usize = 10_000;

/// Evenly spaced edges from `start` to `stop`, at most [`MAX_BINS`] bins.
fn even_edges(start: f64, stop: f64, count: usize) -> Vec<f64> {
    let count = count.clamp(1, MAX_BINS);
    let step = (stop - start) / count as f64;
    (0..=count).map(|i| start + i as f64 * step).collect()
}

/// Bin edges covering `values`. `binwidth` wins over `bins`; `discrete`
/// centres one bin on each integer. Bin counts are capped at [`MAX_BINS`].
pub fn bin_edges(values: &[f64], bins: Bins, binwidth: Option<f64>, discrete: bool) -> Vec<f64> {
    let data = sorted(values);
    if data.is_empty() {
        return vec![0.0, 1.0];
    }
    let min = data[0];
    let max = data[data.len() - 1];

    if discrete {
        let start = min.round() - 0.5;
        let stop = max.round() + 0.5;
        let n = ((stop - start).round() as usize).max(1);
        if n > MAX_BINS {
            return even_edges(start, stop, MAX_BINS);
        }
        return (0..=n).map(|i| start + i as f64).collect();
    }

    if min == max {
        return vec![min - 0.5, max + 0.5];
    }

    let range = max - min;
    if let Some(width) = binwidth.filter(|w| *w > 0.0) {
        let n = (range / width).ceil().max(1.0);
        if n > MAX_BINS as f64 {
            return even_edges(min, max, MAX_BINS);
        }
        return (0..=n as usize).map(|i| min + i as f64 * width).collect();
    }

    let n = data.len() as f64;
    let sturges = range / (n.log2() + 1.0);
    let fd = 2.0 * (percentile(&data, 0.75) - percentile(&data, 0.25)) * n.powf(-1.0 / 3.0);
    let width = match bins {
        Bins::Count(count) => range / count as f64,
        Bins::Auto => {
            if fd > 0.0 {
                fd.min(sturges)
            } else {
                sturges
            }
        }
        Bins::Fd => {
            if fd > 0.0 {
                fd
            } else {
                sturges
            }
        }
        Bins::Sturges => sturges,
        Bins::Sqrt => range / n.sqrt(),
        Bins::Rice => range / (2.0 * n.cbrt()),
        Bins::Scott => (24.0 * std::f64::consts::PI.sqrt() / n).cbrt() * std_dev(&data),
    };
    let count = if width > 0.0 {
        (range / width).ceil().min(MAX_BINS as f64) as usize
    } else {
        1
    };
    even_edges(min, max, count)
}

/// Counts per bin; the last bin includes its right edge.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<f64> {
    let n_bins = edges.len().saturating_sub(1);
    let mut counts = vec![0.0; n_bins];
    if n_bins == 0 {
        return counts;
    }
    let last = edges[n_bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        if v < edges[0] || v > last {
            continue;
        }
        let idx = match edges.partition_point(|e| *e <= v) {
            0 => 0,
            i => (i - 1).min(n_bins - 1),
        };
        counts[idx] += 1.0;
    }
    counts
}

// =============================================================================
// Kernel density estimation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BwMethod {
    Scott,
    Silverman,
    Factor(f64),
}

impl BwMethod {
    pub fn parse(text: &str) -> Result<Self, PlotError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "scott" => Ok(BwMethod::Scott),
            "silverman" => Ok(BwMethod::Silverman),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|f| *f > 0.0)
                .map(BwMethod::Factor)
                .ok_or_else(|| {
                    PlotError::invalid("bw_method", format!("unknown bandwidth rule '{}'", other))
                }),
        }
    }

    fn factor(&self, n: f64) -> f64 {
        match self {
            BwMethod::Scott => n.powf(-0.2),
            BwMethod::Silverman => (n * 3.0 / 4.0).powf(-0.2),
            BwMethod::Factor(f) => *f,
        }
    }
}

/// Kernel standard deviation for `data`, or `None` when the data has no
/// spread.
pub fn bandwidth(data: &[f64], method: BwMethod, adjust: f64) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let sd = std_dev(data);
    if sd <= 0.0 || !sd.is_finite() {
        return None;
    }
    Some(method.factor(data.len() as f64) * sd * adjust)
}

/// Gaussian kernel function
fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Evaluation grid extending `cut` bandwidths past the data, optionally
/// clipped.
pub fn kde_support(data: &[f64], bw: f64, cut: f64, gridsize: usize, clip: Option<(f64, f64)>) -> Vec<f64> {
    let mm_min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let mm_max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut lo = mm_min - cut * bw;
    let mut hi = mm_max + cut * bw;
    if let Some((clip_lo, clip_hi)) = clip {
        lo = lo.max(clip_lo);
        hi = hi.min(clip_hi);
    }
    linspace(lo, hi, gridsize.max(2))
}

/// Gaussian KDE evaluated on `grid`; integrates to one over the real line.
pub fn kde_eval(data: &[f64], bw: f64, grid: &[f64]) -> Vec<f64> {
    let n = data.len() as f64;
    grid.iter()
        .map(|&g| {
            data.iter().map(|&xi| gaussian_kernel((g - xi) / bw)).sum::<f64>() / (n * bw)
        })
        .collect()
}

/// Running trapezoid integral of `density` over `grid`.
pub fn cumulative_trapezoid(grid: &[f64], density: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(density.len());
    let mut acc = 0.0;
    for i in 0..density.len() {
        if i > 0 {
            acc += 0.5 * (density[i] + density[i - 1]) * (grid[i] - grid[i - 1]);
        }
        out.push(acc);
    }
    out
}

pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + i as f64 * step).collect()
        }
    }
}

/// Product-kernel 2D density on a grid; `result[j][i]` is the density at
/// `(gx[i], gy[j])`.
pub fn kde2d(xs: &[f64], ys: &[f64], bw: (f64, f64), gx: &[f64], gy: &[f64]) -> Vec<Vec<f64>> {
    let n = xs.len() as f64;
    gy.iter()
        .map(|&y| {
            gx.iter()
                .map(|&x| {
                    xs.iter()
                        .zip(ys)
                        .map(|(&xi, &yi)| {
                            gaussian_kernel((x - xi) / bw.0) * gaussian_kernel((y - yi) / bw.1)
                        })
                        .sum::<f64>()
                        / (n * bw.0 * bw.1)
                })
                .collect()
        })
        .collect()
}

/// Density thresholds enclosing given proportions of probability mass,
/// from the outermost contour inwards.
pub fn iso_proportion_levels(grid: &[Vec<f64>], levels: usize, thresh: f64) -> Vec<f64> {
    let mut values: Vec<f64> = grid.iter().flatten().copied().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let total: f64 = values.iter().sum();
    if total <= 0.0 || values.is_empty() {
        return Vec::new();
    }
    let mut cumulative = Vec::with_capacity(values.len());
    let mut acc = 0.0;
    for v in &values {
        acc += v;
        cumulative.push(acc / total);
    }
    let levels = levels.max(1);
    let mut out: Vec<f64> = linspace(thresh, 1.0, levels + 1)
        .into_iter()
        .take(levels)
        .map(|p| {
            let idx = cumulative.partition_point(|c| *c < p).min(values.len() - 1);
            values[idx]
        })
        .collect();
    out.dedup();
    out
}

/// Line segments of the `level` iso-contour of a gridded field
/// (marching squares).
pub fn contour_segments(
    field: &[Vec<f64>],
    gx: &[f64],
    gy: &[f64],
    level: f64,
) -> Vec<[(f64, f64); 2]> {
    let mut segments = Vec::new();
    if gy.len() < 2 || gx.len() < 2 {
        return segments;
    }
    let interp = |p1: (f64, f64), v1: f64, p2: (f64, f64), v2: f64| {
        let t = if (v2 - v1).abs() < f64::EPSILON {
            0.5
        } else {
            (level - v1) / (v2 - v1)
        };
        (p1.0 + t * (p2.0 - p1.0), p1.1 + t * (p2.1 - p1.1))
    };

    for j in 0..gy.len() - 1 {
        for i in 0..gx.len() - 1 {
            let corners = [
                ((gx[i], gy[j]), field[j][i]),
                ((gx[i + 1], gy[j]), field[j][i + 1]),
                ((gx[i + 1], gy[j + 1]), field[j + 1][i + 1]),
                ((gx[i], gy[j + 1]), field[j + 1][i]),
            ];
            let mut crossings = Vec::with_capacity(4);
            for k in 0..4 {
                let (p1, v1) = corners[k];
                let (p2, v2) = corners[(k + 1) % 4];
                if (v1 >= level) != (v2 >= level) {
                    crossings.push(interp(p1, v1, p2, v2));
                }
            }
            match crossings.len() {
                2 => segments.push([crossings[0], crossings[1]]),
                4 => {
                    segments.push([crossings[0], crossings[1]]);
                    segments.push([crossings[2], crossings[3]]);
                }
                _ => {}
            }
        }
    }
    segments
}

// =============================================================================
// Distribution summaries
// =============================================================================

/// Sorted values and their cumulative proportions.
pub fn ecdf(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let xs = sorted(values);
    let n = xs.len() as f64;
    let ps = (1..=xs.len()).map(|i| i as f64 / n).collect();
    (xs, ps)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_lo: f64,
    pub whisker_hi: f64,
    pub outliers: Vec<f64>,
}

/// Quartiles, whiskers at `whis` times the IQR, and the points beyond.
pub fn box_stats(values: &[f64], whis: f64) -> Option<BoxStats> {
    let ys = sorted(values);
    if ys.is_empty() {
        return None;
    }

    let q1 = percentile(&ys, 0.25);
    let median = percentile(&ys, 0.50);
    let q3 = percentile(&ys, 0.75);
    let iqr = q3 - q1;

    let lower_fence = q1 - whis * iqr;
    let upper_fence = q3 + whis * iqr;

    let whisker_lo = ys.iter().copied().find(|&v| v >= lower_fence).unwrap_or(q1);
    let whisker_hi = ys.iter().rev().copied().find(|&v| v <= upper_fence).unwrap_or(q3);

    let outliers = ys
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();

    Some(BoxStats {
        q1,
        median,
        q3,
        whisker_lo,
        whisker_hi,
        outliers,
    })
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
pub fn normal_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -normal_ppf(1.0 - p)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KDepth {
    Tukey,
    Proportion(f64),
    Trustworthy(f64),
    Full,
    Fixed(usize),
}

/// Number of letter-value boxes for `n` observations.
pub fn letter_value_depth(n: usize, rule: KDepth) -> usize {
    if n == 0 {
        return 1;
    }
    let log_n = (n as f64).log2();
    let k = match rule {
        KDepth::Tukey => log_n.floor() - 3.0,
        KDepth::Proportion(prop) => {
            log_n.floor() - (n as f64 * prop).max(1.0).log2().floor() + 1.0
        }
        KDepth::Trustworthy(alpha) => {
            let z = normal_ppf(1.0 - alpha / 2.0);
            (n as f64 / (2.0 * z * z)).log2().floor() + 1.0
        }
        KDepth::Full => log_n.floor() + 1.0,
        KDepth::Fixed(k) => k as f64,
    };
    (k.max(1.0)) as usize
}

/// Letter-value boxes from the innermost (quartiles) outwards.
pub fn letter_values(sorted_data: &[f64], k: usize) -> Vec<(f64, f64)> {
    (1..=k)
        .map(|i| {
            let tail = 0.5f64.powi(i as i32 + 1);
            (percentile(sorted_data, tail), percentile(sorted_data, 1.0 - tail))
        })
        .collect()
}

// =============================================================================
// Regression
// =============================================================================

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Weighted least-squares polynomial; coefficients lowest order first.
pub fn polyfit(x: &[f64], y: &[f64], order: usize, weights: Option<&[f64]>) -> Option<Vec<f64>> {
    let terms = order + 1;
    if x.len() < terms {
        return None;
    }
    let mut ata = vec![vec![0.0; terms]; terms];
    let mut aty = vec![0.0; terms];
    for (idx, (&xi, &yi)) in x.iter().zip(y).enumerate() {
        let w = weights.map_or(1.0, |w| w[idx]);
        let powers: Vec<f64> = (0..terms).map(|p| xi.powi(p as i32)).collect();
        for r in 0..terms {
            aty[r] += w * powers[r] * yi;
            for c in 0..terms {
                ata[r][c] += w * powers[r] * powers[c];
            }
        }
    }
    solve(ata, aty)
}

/// Residuals of `y` after an ordinary least-squares fit on an intercept
/// plus each covariate column.
pub fn residualize(y: &[f64], covariates: &[Vec<f64>]) -> Option<Vec<f64>> {
    let terms = covariates.len() + 1;
    if y.len() < terms {
        return None;
    }
    let row = |i: usize| -> Vec<f64> {
        std::iter::once(1.0)
            .chain(covariates.iter().map(|c| c[i]))
            .collect()
    };
    let mut ata = vec![vec![0.0; terms]; terms];
    let mut aty = vec![0.0; terms];
    for (i, yi) in y.iter().enumerate() {
        let r = row(i);
        for a in 0..terms {
            aty[a] += r[a] * yi;
            for b in 0..terms {
                ata[a][b] += r[a] * r[b];
            }
        }
    }
    let beta = solve(ata, aty)?;
    Some(
        y.iter()
            .enumerate()
            .map(|(i, yi)| yi - row(i).iter().zip(&beta).map(|(a, b)| a * b).sum::<f64>())
            .collect(),
    )
}

pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Locally weighted linear regression (tricube kernel, bisquare
/// robustness steps). Returns fitted values at the sorted `x`.
pub fn lowess(x: &[f64], y: &[f64], frac: f64, iterations: usize) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    let n = xs.len();
    if n < 2 {
        return (xs, ys);
    }
    let r = ((frac * n as f64).ceil() as usize).clamp(2, n);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for _ in 0..=iterations {
        for i in 0..n {
            let mut distances: Vec<f64> = xs.iter().map(|xj| (xj - xs[i]).abs()).collect();
            distances.sort_by(|a, b| a.total_cmp(b));
            let h = distances[r - 1].max(1e-12);
            let weights: Vec<f64> = xs
                .iter()
                .zip(&robustness)
                .map(|(xj, rw)| {
                    let u = ((xj - xs[i]).abs() / h).min(1.0);
                    rw * (1.0 - u.powi(3)).powi(3)
                })
                .collect();
            fitted[i] = match polyfit(&xs, &ys, 1, Some(&weights)) {
                Some(coeffs) => polyval(&coeffs, xs[i]),
                None => {
                    let wsum: f64 = weights.iter().sum();
                    if wsum > 0.0 {
                        weights.iter().zip(&ys).map(|(w, y)| w * y).sum::<f64>() / wsum
                    } else {
                        ys[i]
                    }
                }
            };
        }
        let residuals: Vec<f64> = ys.iter().zip(&fitted).map(|(y, f)| (y - f).abs()).collect();
        let s = median(&residuals);
        if s <= 1e-12 {
            break;
        }
        robustness = residuals
            .iter()
            .map(|res| {
                let u = (res / (6.0 * s)).min(1.0);
                (1.0 - u * u).powi(2)
            })
            .collect();
    }
    (xs, fitted)
}

/// Robust straight-line fit by iteratively reweighted least squares with
/// Tukey's bisquare weights.
pub fn robust_fit(x: &[f64], y: &[f64]) -> Option<Vec<f64>> {
    let mut coeffs = polyfit(x, y, 1, None)?;
    for _ in 0..20 {
        let residuals: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| yi - polyval(&coeffs, *xi))
            .collect();
        let abs_res: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let scale = median(&abs_res) / 0.6745;
        if scale <= 1e-12 {
            break;
        }
        let weights: Vec<f64> = residuals
            .iter()
            .map(|r| {
                let u = r / (4.685 * scale);
                if u.abs() < 1.0 {
                    (1.0 - u * u).powi(2)
                } else {
                    0.0
                }
            })
            .collect();
        let next = polyfit(x, y, 1, Some(&weights))?;
        let converged = next
            .iter()
            .zip(&coeffs)
            .all(|(a, b)| (a - b).abs() < 1e-9);
        coeffs = next;
        if converged {
            break;
        }
    }
    Some(coeffs)
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Logistic regression of a 0/1 response by Newton iterations.
pub fn logistic_fit(x: &[f64], y: &[f64]) -> Option<Vec<f64>> {
    let mut beta = vec![0.0, 0.0];
    for _ in 0..50 {
        let mut ata = vec![vec![0.0; 2]; 2];
        let mut grad = vec![0.0; 2];
        for (&xi, &yi) in x.iter().zip(y) {
            let p = sigmoid(beta[0] + beta[1] * xi);
            let w = (p * (1.0 - p)).max(1e-9);
            let row = [1.0, xi];
            for r in 0..2 {
                grad[r] += (yi - p) * row[r];
                for c in 0..2 {
                    ata[r][c] += w * row[r] * row[c];
                }
            }
        }
        let step = solve(ata, grad)?;
        beta[0] += step[0];
        beta[1] += step[1];
        if step.iter().all(|s| s.abs() < 1e-8) {
            break;
        }
        if !beta.iter().all(|b| b.is_finite()) {
            return None;
        }
    }
    Some(beta)
}

/// Draw `n` uniform offsets in `[-width, width]`; zero width gives zeros.
pub fn jitter(n: usize, width: f64, rng: &mut StdRng) -> Vec<f64> {
    if width <= 0.0 {
        return vec![0.0; n];
    }
    (0..n).map(|_| rng.gen_range(-width..width)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 1.0), 4.0);
        assert!((percentile(&data, 0.5) - 2.5).abs() < 1e-12);
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_estimators() {
        let data = [3.0, 1.0, 2.0, 10.0];
        assert_eq!(Estimator::Mean.apply(&data), 4.0);
        assert_eq!(Estimator::Median.apply(&data), 2.5);
        assert_eq!(Estimator::Count.apply(&data), 4.0);
        assert!(Estimator::parse("mode").is_err());
    }

    #[test]
    fn test_bootstrap_ci_contains_mean() {
        let data: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let mut rng = rng();
        let (lo, hi) = ErrorBar::Ci(95.0)
            .interval(&data, Estimator::Mean, 500, &mut rng)
            .unwrap();
        assert!(lo < 24.5 && hi > 24.5);
    }

    #[test]
    fn test_bootstrap_is_deterministic() {
        let data = [1.0, 5.0, 2.0, 8.0, 3.0];
        let a = bootstrap(&data, Estimator::Mean, 20, &mut rng());
        let b = bootstrap(&data, Estimator::Mean, 20, &mut rng());
        assert_eq!(a, b);
    }

    #[test]
    fn test_ecdf() {
        let (xs, ps) = ecdf(&[3.0, 1.0, 2.0, 2.0]);
        assert_eq!(xs, vec![1.0, 2.0, 2.0, 3.0]);
        assert_eq!(ps, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let data: Vec<f64> = (0..100).map(|i| (i % 17) as f64).collect();
        let edges = bin_edges(&data, Bins::Count(5), None, false);
        assert_eq!(edges.len(), 6);
        let counts = histogram(&data, &edges);
        assert_eq!(counts.iter().sum::<f64>(), 100.0);
    }

    #[test]
    fn test_discrete_bins() {
        let edges = bin_edges(&[1.0, 2.0, 3.0], Bins::Auto, None, true);
        assert_eq!(edges, vec![0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_binwidth_overrides_bins() {
        let edges = bin_edges(&[0.0, 10.0], Bins::Count(3), Some(2.5), false);
        assert_eq!(edges, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn test_tiny_binwidth_is_capped() {
        let values: Vec<f64> = (0..20).map(|i| i as f64 * 5.0).collect();
        let edges = bin_edges(&values, Bins::Auto, Some(1e-9), false);
        assert_eq!(edges.len(), MAX_BINS + 1);
        assert_eq!(edges[0], 0.0);
        assert!((edges[MAX_BINS] - 95.0).abs() < 1e-6);
    }

    #[test]
    fn test_wide_discrete_range_is_capped() {
        let edges = bin_edges(&[0.0, 1e12], Bins::Auto, None, true);
        assert_eq!(edges.len(), MAX_BINS + 1);
        assert_eq!(edges[0], -0.5);
        assert!((edges[MAX_BINS] - (1e12 + 0.5)).abs() < 1.0);
    }

    #[test]
    fn test_bins_parse() {
        assert_eq!(Bins::parse("auto").unwrap(), Bins::Auto);
        assert_eq!(Bins::parse("12").unwrap(), Bins::Count(12));
        assert!(Bins::parse("lots").is_err());
    }

    #[test]
    fn test_kde_normalisation() {
        let data = [0.0, 1.0, 1.5, 2.0, 4.0];
        let bw = bandwidth(&data, BwMethod::Scott, 1.0).unwrap();
        let grid = kde_support(&data, bw, 6.0, 400, None);
        let density = kde_eval(&data, bw, &grid);
        let total = *cumulative_trapezoid(&grid, &density).last().unwrap();
        assert!((total - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_bandwidth_requires_spread() {
        assert!(bandwidth(&[2.0, 2.0, 2.0], BwMethod::Scott, 1.0).is_none());
    }

    #[test]
    fn test_box_stats() {
        let mut data: Vec<f64> = (1..=9).map(|i| i as f64).collect();
        data.push(100.0);
        let stats = box_stats(&data, 1.5).unwrap();
        assert_eq!(stats.outliers, vec![100.0]);
        assert_eq!(stats.whisker_hi, 9.0);
        assert_eq!(stats.whisker_lo, 1.0);
    }

    #[test]
    fn test_polyfit_recovers_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        let coeffs = polyfit(&x, &y, 1, None).unwrap();
        assert!((coeffs[0] - 1.0).abs() < 1e-9);
        assert!((coeffs[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyfit_quadratic() {
        let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v * v - v + 3.0).collect();
        let coeffs = polyfit(&x, &y, 2, None).unwrap();
        assert!((polyval(&coeffs, 10.0) - 193.0).abs() < 1e-6);
    }

    #[test]
    fn test_polyfit_underdetermined() {
        assert!(polyfit(&[1.0], &[1.0], 1, None).is_none());
    }

    #[test]
    fn test_residualize_removes_covariate() {
        let z: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let y: Vec<f64> = z.iter().map(|v| 3.0 * v - 2.0).collect();
        let residuals = residualize(&y, &[z]).unwrap();
        assert!(residuals.iter().all(|r| r.abs() < 1e-9));
    }

    #[test]
    fn test_robust_fit_ignores_outlier() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x.iter().map(|v| 2.0 * v).collect();
        y[9] = 100.0;
        let coeffs = robust_fit(&x, &y).unwrap();
        assert!((coeffs[1] - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_logistic_fit_direction() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let y = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        let beta = logistic_fit(&x, &y).unwrap();
        assert!(beta[1] > 0.0);
    }

    #[test]
    fn test_lowess_on_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.5 * v + 1.0).collect();
        let (_, fitted) = lowess(&x, &y, 2.0 / 3.0, 3);
        for (f, expected) in fitted.iter().zip(&y) {
            assert!((f - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normal_ppf() {
        assert!((normal_ppf(0.975) - 1.959964).abs() < 1e-4);
        assert!(normal_ppf(0.5).abs() < 1e-9);
    }

    #[test]
    fn test_letter_value_depth() {
        assert_eq!(letter_value_depth(1000, KDepth::Tukey), 6);
        assert_eq!(letter_value_depth(1000, KDepth::Full), 10);
        assert_eq!(letter_value_depth(4, KDepth::Tukey), 1);
    }

    #[test]
    fn test_contour_segments() {
        let gx = [0.0, 1.0];
        let gy = [0.0, 1.0];
        let field = vec![vec![0.0, 1.0], vec![0.0, 1.0]];
        let segments = contour_segments(&field, &gx, &gy, 0.5);
        assert_eq!(segments.len(), 1);
        assert!((segments[0][0].0 - 0.5).abs() < 1e-12);
    }
}
