//! Fixed hypothesis-test battery.
//!
//! Runs an ordered battery over a primary series and optional comparison
//! groups: Shapiro-Wilk normality, mean comparison (Welch two-sample or
//! one-sample against a reference), chi-squared independence on
//! quantile-binned pairs, one-way ANOVA, and Levene variance equality
//! (Brown-Forsythe median-centered variant).
//!
//! Sub-tests fail individually with a flagged outcome; one inapplicable
//! test never aborts the rest of the battery.

use crate::errors::{AnalyticsError, AnalyticsResult};
use crate::math;
use crate::series::SampleSeries;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};

/// Closed set of tests the battery runs, in battery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TestKind {
    /// Shapiro-Wilk normality test
    Normality,
    /// Welch two-sample or one-sample t-test
    MeanComparison,
    /// Chi-squared independence on binned pairs
    Independence,
    /// One-way ANOVA across groups
    Anova,
    /// Levene (Brown-Forsythe) variance equality
    VarianceEquality,
}

impl TestKind {
    /// Stable name for reports and error messages.
    pub fn name(self) -> &'static str {
        match self {
            TestKind::Normality => "shapiro_wilk",
            TestKind::MeanComparison => "t_test",
            TestKind::Independence => "chi_squared",
            TestKind::Anova => "anova",
            TestKind::VarianceEquality => "levene",
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A completed hypothesis test.
///
/// The verdict is derived from statistic, p-value, and threshold; it is
/// never stored independently.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HypothesisTestResult {
    /// Which test ran
    pub test: TestKind,
    /// Test statistic
    pub statistic: f64,
    /// Two-sided p-value in [0, 1]
    pub p_value: f64,
    /// Significance threshold the verdict derives from
    pub alpha: f64,
}

impl HypothesisTestResult {
    /// Derived verdict: reject the null at the configured threshold.
    pub fn is_significant(&self) -> bool {
        self.p_value < self.alpha
    }
}

/// Outcome of one battery slot: a result, or a flagged inapplicability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BatteryOutcome {
    /// The test ran to completion
    Completed(HypothesisTestResult),
    /// The test could not run for this input; the rest of the battery
    /// is unaffected
    NotApplicable {
        /// Which test was skipped
        test: TestKind,
        /// Why it could not run
        reason: String,
    },
}

impl BatteryOutcome {
    /// The test this outcome belongs to.
    pub fn test(&self) -> TestKind {
        match self {
            BatteryOutcome::Completed(r) => r.test,
            BatteryOutcome::NotApplicable { test, .. } => *test,
        }
    }

    /// The completed result, if the test ran.
    pub fn result(&self) -> Option<&HypothesisTestResult> {
        match self {
            BatteryOutcome::Completed(r) => Some(r),
            BatteryOutcome::NotApplicable { .. } => None,
        }
    }
}

/// Full battery report, in battery order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatteryReport {
    /// One outcome per battery slot
    pub outcomes: Vec<BatteryOutcome>,
    /// Significance threshold applied to every verdict
    pub alpha: f64,
}

impl BatteryReport {
    /// Completed results only.
    pub fn completed(&self) -> impl Iterator<Item = &HypothesisTestResult> {
        self.outcomes.iter().filter_map(BatteryOutcome::result)
    }

    /// Tests that could not run, with their reasons.
    pub fn not_applicable(&self) -> impl Iterator<Item = (TestKind, &str)> {
        self.outcomes.iter().filter_map(|o| match o {
            BatteryOutcome::NotApplicable { test, reason } => Some((*test, reason.as_str())),
            BatteryOutcome::Completed(_) => None,
        })
    }
}

/// Runs the fixed test battery.
#[derive(Debug, Clone)]
pub struct HypothesisTestSuite {
    alpha: f64,
    reference_mean: f64,
}

impl Default for HypothesisTestSuite {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            reference_mean: 0.0,
        }
    }
}

impl HypothesisTestSuite {
    /// Suite with an explicit significance threshold.
    pub fn new(alpha: f64) -> AnalyticsResult<Self> {
        crate::errors::validate_probability(alpha, "alpha")?;
        Ok(Self {
            alpha,
            reference_mean: 0.0,
        })
    }

    /// Reference mean for the one-sample t-test used when no comparison
    /// group is supplied. Zero by default (the natural null for returns).
    pub fn with_reference_mean(mut self, reference: f64) -> Self {
        self.reference_mean = reference;
        self
    }

    /// Run the fixed, ordered battery.
    ///
    /// `groups` supplies comparison samples: the first group partners the
    /// mean-comparison and independence tests; ANOVA and Levene run over
    /// the primary series plus all groups. Inapplicable sub-tests are
    /// flagged in place, never dropped.
    pub fn run_battery(
        &self,
        series: &SampleSeries,
        groups: &[SampleSeries],
    ) -> AnalyticsResult<BatteryReport> {
        crate::errors::validate_data_length(series.values(), 3, "hypothesis battery")?;

        let mut outcomes = Vec::with_capacity(5);

        outcomes.push(self.outcome(TestKind::Normality, shapiro_wilk(series.values())));

        let mean_cmp = match groups.first() {
            Some(other) => welch_t_test(series.values(), other.values()),
            None => one_sample_t_test(series.values(), self.reference_mean),
        };
        outcomes.push(self.outcome(TestKind::MeanComparison, mean_cmp));

        let independence = match groups.first() {
            Some(other) => chi_squared_independence(series.values(), other.values()),
            None => Err(AnalyticsError::TestNotApplicable {
                test: TestKind::Independence.name().to_string(),
                reason: "requires a paired second series".to_string(),
            }),
        };
        outcomes.push(self.outcome(TestKind::Independence, independence));

        let mut all_groups: Vec<&[f64]> = Vec::with_capacity(groups.len() + 1);
        all_groups.push(series.values());
        all_groups.extend(groups.iter().map(SampleSeries::values));

        outcomes.push(self.outcome(TestKind::Anova, one_way_anova(&all_groups)));
        outcomes.push(self.outcome(TestKind::VarianceEquality, levene_test(&all_groups)));

        Ok(BatteryReport {
            outcomes,
            alpha: self.alpha,
        })
    }

    /// Wrap a raw (statistic, p-value) computation into a battery
    /// outcome, isolating per-test failures.
    fn outcome(&self, test: TestKind, raw: AnalyticsResult<(f64, f64)>) -> BatteryOutcome {
        match raw {
            Ok((statistic, p_value)) => BatteryOutcome::Completed(HypothesisTestResult {
                test,
                statistic,
                p_value: p_value.clamp(0.0, 1.0),
                alpha: self.alpha,
            }),
            Err(e) => {
                log::debug!("battery test {} skipped: {}", test, e);
                BatteryOutcome::NotApplicable {
                    test,
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn not_applicable(test: TestKind, reason: impl Into<String>) -> AnalyticsError {
    AnalyticsError::TestNotApplicable {
        test: test.name().to_string(),
        reason: reason.into(),
    }
}

fn standard_normal() -> Normal {
    // Fixed valid parameters; construction cannot fail
    Normal::new(0.0, 1.0).expect("standard normal parameters are valid")
}

/// Shapiro-Wilk normality test (Royston 1995 approximation, AS R94).
///
/// Valid for 3 <= n <= 5000. Returns `(W, p_value)` where W near 1
/// indicates consistency with normality.
pub fn shapiro_wilk(data: &[f64]) -> AnalyticsResult<(f64, f64)> {
    let n = data.len();
    if n < 3 {
        return Err(not_applicable(
            TestKind::Normality,
            format!("needs at least 3 observations, got {}", n),
        ));
    }
    if n > 5000 {
        return Err(not_applicable(
            TestKind::Normality,
            format!("approximation valid up to 5000 observations, got {}", n),
        ));
    }

    let x = math::sorted_copy(data);
    let range = x[n - 1] - x[0];
    if range <= 0.0 {
        return Err(not_applicable(
            TestKind::Normality,
            "all observations identical".to_string(),
        ));
    }

    // Expected normal order statistics (Blom scores)
    let normal = standard_normal();
    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| normal.inverse_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let m_sum_sq: f64 = m.iter().map(|v| v * v).sum();

    // Royston polynomial corrections for the extreme coefficients
    let rsn = 1.0 / nf.sqrt();
    let mut a = vec![0.0; n];
    if n > 5 {
        let a_n = -2.706056 * rsn.powi(5) + 4.434685 * rsn.powi(4) - 2.071190 * rsn.powi(3)
            - 0.147981 * rsn.powi(2)
            + 0.221157 * rsn
            + m[n - 1] / m_sum_sq.sqrt();
        let a_n1 = -3.582633 * rsn.powi(5) + 5.682633 * rsn.powi(4) - 1.752461 * rsn.powi(3)
            - 0.293762 * rsn.powi(2)
            + 0.042981 * rsn
            + m[n - 2] / m_sum_sq.sqrt();
        let phi = (m_sum_sq - 2.0 * m[n - 1] * m[n - 1] - 2.0 * m[n - 2] * m[n - 2])
            / (1.0 - 2.0 * a_n * a_n - 2.0 * a_n1 * a_n1);
        if phi <= 0.0 {
            return Err(AnalyticsError::NumericalInstability {
                operation: "shapiro_wilk".to_string(),
                reason: "non-positive normalizing constant".to_string(),
            });
        }
        a[n - 1] = a_n;
        a[n - 2] = a_n1;
        a[0] = -a_n;
        a[1] = -a_n1;
        let phi_sqrt = phi.sqrt();
        for i in 2..n - 2 {
            a[i] = m[i] / phi_sqrt;
        }
    } else {
        let a_n = -2.706056 * rsn.powi(5) + 4.434685 * rsn.powi(4) - 2.071190 * rsn.powi(3)
            - 0.147981 * rsn.powi(2)
            + 0.221157 * rsn
            + m[n - 1] / m_sum_sq.sqrt();
        let phi = (m_sum_sq - 2.0 * m[n - 1] * m[n - 1]) / (1.0 - 2.0 * a_n * a_n);
        a[n - 1] = a_n;
        a[0] = -a_n;
        if phi > 0.0 {
            let phi_sqrt = phi.sqrt();
            for i in 1..n - 1 {
                a[i] = m[i] / phi_sqrt;
            }
        }
    }

    let mean_x = math::mean(&x);
    let numerator: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum::<f64>().powi(2);
    let denominator: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let w = (numerator / denominator).clamp(0.0, 1.0);

    // P-value transform
    let p_value = if n == 3 {
        // Exact small-sample formula
        let p = 6.0 / std::f64::consts::PI * (w.sqrt().asin() - (0.75f64).sqrt().asin());
        p.clamp(0.0, 1.0)
    } else if n <= 11 {
        let gamma = -2.273 + 0.459 * nf;
        let arg = gamma - (1.0 - w).ln();
        if arg <= 0.0 {
            0.0
        } else {
            let w1 = -arg.ln();
            let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf * nf - 0.0006714 * nf * nf * nf;
            let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf * nf - 0.0020322 * nf * nf * nf).exp();
            1.0 - math::standard_normal_cdf((w1 - mu) / sigma)
        }
    } else {
        let ln_n = nf.ln();
        let w1 = (1.0 - w).ln();
        let mu = -1.5861 - 0.31082 * ln_n - 0.083751 * ln_n * ln_n + 0.0038915 * ln_n.powi(3);
        let sigma = (-0.4803 - 0.082676 * ln_n + 0.0030302 * ln_n * ln_n).exp();
        1.0 - math::standard_normal_cdf((w1 - mu) / sigma)
    };

    Ok((w, p_value))
}

/// Welch two-sample t-test (unequal variances).
pub fn welch_t_test(x: &[f64], y: &[f64]) -> AnalyticsResult<(f64, f64)> {
    if x.len() < 2 || y.len() < 2 {
        return Err(not_applicable(
            TestKind::MeanComparison,
            "both samples need at least 2 observations",
        ));
    }

    let (n1, n2) = (x.len() as f64, y.len() as f64);
    let (v1, v2) = (math::sample_variance(x), math::sample_variance(y));
    let se_sq = v1 / n1 + v2 / n2;
    if se_sq <= 0.0 {
        return Err(not_applicable(
            TestKind::MeanComparison,
            "both samples are constant",
        ));
    }

    let t = (math::mean(x) - math::mean(y)) / se_sq.sqrt();
    // Welch-Satterthwaite degrees of freedom
    let df = se_sq * se_sq
        / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));

    two_sided_t_p_value(t, df).map(|p| (t, p))
}

/// One-sample t-test against a reference mean.
pub fn one_sample_t_test(x: &[f64], reference_mean: f64) -> AnalyticsResult<(f64, f64)> {
    if x.len() < 2 {
        return Err(not_applicable(
            TestKind::MeanComparison,
            "needs at least 2 observations",
        ));
    }
    let n = x.len() as f64;
    let sd = math::sample_std_dev(x);
    if sd <= 0.0 {
        return Err(not_applicable(
            TestKind::MeanComparison,
            "sample is constant",
        ));
    }
    let t = (math::mean(x) - reference_mean) / (sd / n.sqrt());
    two_sided_t_p_value(t, n - 1.0).map(|p| (t, p))
}

fn two_sided_t_p_value(t: f64, df: f64) -> AnalyticsResult<f64> {
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|_| AnalyticsError::NumericalInstability {
        operation: "t_test".to_string(),
        reason: format!("invalid degrees of freedom {}", df),
    })?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Chi-squared independence test on quantile-binned pairs.
///
/// Both series are discretized into equal-probability bins sized so the
/// expected cell counts stay reasonable, then tested on the resulting
/// contingency table.
pub fn chi_squared_independence(x: &[f64], y: &[f64]) -> AnalyticsResult<(f64, f64)> {
    if x.len() != y.len() {
        return Err(not_applicable(
            TestKind::Independence,
            format!("paired series lengths differ ({} vs {})", x.len(), y.len()),
        ));
    }
    let n = x.len();
    if n < 20 {
        return Err(not_applicable(
            TestKind::Independence,
            format!("needs at least 20 paired observations, got {}", n),
        ));
    }

    // Bin count keeps expected cell counts near 5 or above
    let bins = ((n as f64 / 5.0).sqrt().floor() as usize).clamp(2, 4);
    let x_edges = quantile_edges(x, bins);
    let y_edges = quantile_edges(y, bins);
    if x_edges.is_empty() || y_edges.is_empty() {
        return Err(not_applicable(
            TestKind::Independence,
            "a series is too heavily tied to bin",
        ));
    }

    let rows = x_edges.len() + 1;
    let cols = y_edges.len() + 1;
    let mut observed = vec![vec![0.0f64; cols]; rows];
    for (&xi, &yi) in x.iter().zip(y) {
        observed[bin_index(xi, &x_edges)][bin_index(yi, &y_edges)] += 1.0;
    }

    let row_totals: Vec<f64> = observed.iter().map(|r| r.iter().sum()).collect();
    let col_totals: Vec<f64> = (0..cols).map(|j| observed.iter().map(|r| r[j]).sum()).collect();
    let total = n as f64;

    let mut statistic = 0.0;
    for i in 0..rows {
        for j in 0..cols {
            let expected = row_totals[i] * col_totals[j] / total;
            if expected > 0.0 {
                let diff = observed[i][j] - expected;
                statistic += diff * diff / expected;
            }
        }
    }

    let df = ((rows - 1) * (cols - 1)) as f64;
    if df < 1.0 {
        return Err(not_applicable(
            TestKind::Independence,
            "degenerate contingency table",
        ));
    }
    let dist = ChiSquared::new(df).map_err(|_| AnalyticsError::NumericalInstability {
        operation: "chi_squared".to_string(),
        reason: format!("invalid degrees of freedom {}", df),
    })?;
    Ok((statistic, (1.0 - dist.cdf(statistic)).clamp(0.0, 1.0)))
}

/// Interior quantile edges for equal-probability binning, deduplicated
/// against ties. Empty result means the data cannot support 2 bins.
fn quantile_edges(data: &[f64], bins: usize) -> Vec<f64> {
    let sorted = math::sorted_copy(data);
    let mut edges: Vec<f64> = (1..bins)
        .map(|j| math::percentile_of_sorted(&sorted, j as f64 / bins as f64))
        .collect();
    edges.dedup();
    // An edge equal to the minimum or maximum would create an empty bin
    edges.retain(|&e| e > sorted[0] && e < sorted[sorted.len() - 1]);
    edges
}

fn bin_index(value: f64, edges: &[f64]) -> usize {
    edges.iter().filter(|&&e| value > e).count()
}

/// One-way ANOVA F-test across groups.
pub fn one_way_anova(groups: &[&[f64]]) -> AnalyticsResult<(f64, f64)> {
    anova_f_test(groups, TestKind::Anova)
}

/// Levene variance-equality test, Brown-Forsythe variant.
///
/// Runs the ANOVA F-test on absolute deviations from group medians, which
/// is robust to the heavy tails typical of return series.
pub fn levene_test(groups: &[&[f64]]) -> AnalyticsResult<(f64, f64)> {
    if groups.len() < 2 {
        return Err(not_applicable(
            TestKind::VarianceEquality,
            format!("needs at least 2 groups, got {}", groups.len()),
        ));
    }
    let deviations: Vec<Vec<f64>> = groups
        .iter()
        .map(|g| {
            let med = math::median(g);
            g.iter().map(|&v| (v - med).abs()).collect()
        })
        .collect();
    let refs: Vec<&[f64]> = deviations.iter().map(Vec::as_slice).collect();
    anova_f_test(&refs, TestKind::VarianceEquality)
}

fn anova_f_test(groups: &[&[f64]], test: TestKind) -> AnalyticsResult<(f64, f64)> {
    if groups.len() < 2 {
        return Err(not_applicable(
            test,
            format!("needs at least 2 groups, got {}", groups.len()),
        ));
    }
    if let Some(small) = groups.iter().position(|g| g.len() < 2) {
        return Err(not_applicable(
            test,
            format!("group {} has fewer than 2 observations", small),
        ));
    }

    let k = groups.len() as f64;
    let total_n: usize = groups.iter().map(|g| g.len()).sum();
    let nf = total_n as f64;
    let grand_mean =
        groups.iter().flat_map(|g| g.iter()).sum::<f64>() / nf;

    let ss_between: f64 = groups
        .iter()
        .map(|g| g.len() as f64 * (math::mean(g) - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .map(|g| {
            let m = math::mean(g);
            g.iter().map(|&v| (v - m).powi(2)).sum::<f64>()
        })
        .sum();

    let df_between = k - 1.0;
    let df_within = nf - k;
    let ms_within = ss_within / df_within;
    if ms_within <= math::MIN_VARIANCE {
        return Err(not_applicable(test, "within-group variance is zero"));
    }

    let f = (ss_between / df_between) / ms_within;
    let dist = FisherSnedecor::new(df_between, df_within).map_err(|_| {
        AnalyticsError::NumericalInstability {
            operation: test.name().to_string(),
            reason: format!("invalid F degrees of freedom ({}, {})", df_between, df_within),
        }
    })?;
    Ok((f, (1.0 - dist.cdf(f)).clamp(0.0, 1.0)))
}
