//! # 最小二乘求解
//!
//! - `linear_least_squares`: 正规方程 (XᵀX)⁻¹Xᵀy，用于光谱线性基线拟合
//! - `curve_fit`: Levenberg-Marquardt 非线性最小二乘，前向差分雅可比，
//!   支持截止时间；超时、发散、奇异均以 `FitError` 返回，由调用方决定回退策略
//!
//! ## 算法概述
//! 每次迭代求解 (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr：
//! 1. 若代价下降则接受步长并缩小 λ
//! 2. 否则放大 λ 重试，λ 超过上限视为已到达局部极小
//! 3. 代价相对下降小于 `ftol` 或步长相对小于 `xtol` 时收敛
//!
//! ## 依赖关系
//! - 被 `models/spectrum.rs` 与 `phaser/mixture.rs` 调用
//! - 使用 `nalgebra` 的 LU 分解

use nalgebra::{DMatrix, DVector};
use std::time::{Duration, Instant};
use thiserror::Error;

/// 非线性拟合失败原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("fit exceeded its time budget of {0:?}")]
    Timeout(Duration),

    #[error("optimal parameters not found within {0} iterations")]
    MaxIterations(usize),

    #[error("normal equations are singular")]
    Singular,

    #[error("model produced non-finite residuals")]
    NonFinite,

    #[error("{samples} samples cannot constrain {params} parameters")]
    TooFewSamples { samples: usize, params: usize },

    #[error("xs and ys differ in length ({0} vs {1})")]
    LengthMismatch(usize, usize),
}

/// 拟合配置
#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    max_iter: usize,
    ftol: f64,
    xtol: f64,
    timeout: Option<Duration>,
}

impl FitConfig {
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            ftol: 1.5e-8,
            xtol: 1.5e-8,
            timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// 拟合结果
#[derive(Debug, Clone)]
pub struct FitOutput {
    /// 最优参数
    pub params: Vec<f64>,
    /// 参数协方差；自由度不足或 JᵀJ 奇异时为 `None`
    pub covariance: Option<DMatrix<f64>>,
    /// 0.5 · Σ r²
    pub cost: f64,
    /// 实际迭代次数
    pub iterations: usize,
}

impl FitOutput {
    /// 参数标准误差（协方差对角线开方）
    pub fn std_errors(&self) -> Option<Vec<f64>> {
        self.covariance
            .as_ref()
            .map(|cov| (0..cov.nrows()).map(|i| cov[(i, i)].abs().sqrt()).collect())
    }
}

/// 线性最小二乘，矩阵接近奇异时返回 `None`
pub fn linear_least_squares(design: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let xt = design.transpose();
    let xtx = &xt * design;
    let scale = xtx.norm();
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    let det = xtx.determinant();
    if det.abs() <= f64::EPSILON * scale.powi(xtx.nrows() as i32) {
        return None;
    }
    let inv = xtx.try_inverse()?;
    Some(inv * (xt * y))
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;

/// Levenberg-Marquardt 曲线拟合
///
/// `model(x, params)` 返回模型在 `x` 处的取值。
pub fn curve_fit<F>(
    model: F,
    xs: &[f64],
    ys: &[f64],
    p0: &[f64],
    config: &FitConfig,
) -> Result<FitOutput, FitError>
where
    F: Fn(f64, &[f64]) -> f64,
{
    if xs.len() != ys.len() {
        return Err(FitError::LengthMismatch(xs.len(), ys.len()));
    }
    let n = xs.len();
    let m = p0.len();
    if n < m || m == 0 {
        return Err(FitError::TooFewSamples {
            samples: n,
            params: m,
        });
    }

    let started = Instant::now();
    let timed_out = || config.timeout.is_some_and(|t| started.elapsed() >= t);

    let residuals = |p: &[f64]| -> DVector<f64> {
        DVector::from_iterator(n, xs.iter().zip(ys).map(|(&x, &y)| y - model(x, p)))
    };

    let mut params = p0.to_vec();
    let mut r = residuals(&params);
    let mut cost = 0.5 * r.norm_squared();
    if !cost.is_finite() {
        return Err(FitError::NonFinite);
    }

    let mut lambda = LAMBDA_INIT;

    for iter in 0..config.max_iter {
        if timed_out() {
            return Err(FitError::Timeout(config.timeout.unwrap_or_default()));
        }
        if cost <= f64::MIN_POSITIVE {
            return Ok(finish(&model, xs, params, cost, iter));
        }

        let jac = jacobian(&model, xs, &params);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &r;

        let mut accepted = false;
        let mut converged = false;
        while lambda <= LAMBDA_MAX {
            if timed_out() {
                return Err(FitError::Timeout(config.timeout.unwrap_or_default()));
            }

            let mut a = jtj.clone();
            for i in 0..m {
                a[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }

            let Some(delta) = a.lu().solve(&grad) else {
                lambda *= 10.0;
                continue;
            };

            let trial: Vec<f64> = params.iter().zip(delta.iter()).map(|(p, d)| p + d).collect();
            let trial_r = residuals(&trial);
            let trial_cost = 0.5 * trial_r.norm_squared();

            if !trial_cost.is_finite() || trial_cost >= cost {
                lambda *= 10.0;
                continue;
            }

            let p_norm = params.iter().map(|p| p * p).sum::<f64>().sqrt();
            let step_small = delta.norm() <= config.xtol * (p_norm + config.xtol);
            let cost_small = (cost - trial_cost) <= config.ftol * cost;

            params = trial;
            r = trial_r;
            cost = trial_cost;
            lambda = (lambda / 10.0).max(1e-15);
            accepted = true;
            converged = step_small || cost_small;
            break;
        }

        if !accepted {
            // λ 已达上限仍无法下降：雅可比有限则视为局部极小
            if !jtj.iter().all(|v| v.is_finite()) {
                return Err(FitError::Singular);
            }
            return Ok(finish(&model, xs, params, cost, iter + 1));
        }
        if converged {
            return Ok(finish(&model, xs, params, cost, iter + 1));
        }
    }

    Err(FitError::MaxIterations(config.max_iter))
}

fn finish<F>(model: &F, xs: &[f64], params: Vec<f64>, cost: f64, iterations: usize) -> FitOutput
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = xs.len();
    let m = params.len();
    let covariance = if n > m {
        let jac = jacobian(model, xs, &params);
        let s2 = 2.0 * cost / (n - m) as f64;
        (jac.transpose() * &jac).try_inverse().map(|inv| inv * s2)
    } else {
        None
    };
    FitOutput {
        params,
        covariance,
        cost,
        iterations,
    }
}

/// 前向差分雅可比 (n × m)
fn jacobian<F>(model: &F, xs: &[f64], params: &[f64]) -> DMatrix<f64>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = xs.len();
    let m = params.len();
    let eps = f64::EPSILON.sqrt();
    let base: Vec<f64> = xs.iter().map(|&x| model(x, params)).collect();

    let mut jac = DMatrix::zeros(n, m);
    let mut shifted = params.to_vec();
    for j in 0..m {
        let h = eps * params[j].abs().max(1.0);
        shifted[j] = params[j] + h;
        for (i, &x) in xs.iter().enumerate() {
            jac[(i, j)] = (model(x, &shifted) - base[i]) / h;
        }
        shifted[j] = params[j];
    }
    jac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(x: f64, p: &[f64]) -> f64 {
        p[0] * (-(x - p[1]).powi(2) / (2.0 * p[2] * p[2])).exp()
    }

    #[test]
    fn test_linear_least_squares_line() {
        let design = DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 3.0, 5.0]);
        let coef = linear_least_squares(&design, &y).unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-10);
        assert!((coef[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_linear_least_squares_singular() {
        // 所有 x 相同，斜率无法确定
        let design = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 3.0, 1.0]);
        let y = DVector::from_vec(vec![1.0, 2.0]);
        assert!(linear_least_squares(&design, &y).is_none());
    }

    #[test]
    fn test_curve_fit_recovers_gaussian() {
        let xs: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let truth = [3.0, 28.0, 4.0];
        let ys: Vec<f64> = xs.iter().map(|&x| gaussian(x, &truth)).collect();

        let out = curve_fit(gaussian, &xs, &ys, &[2.0, 25.0, 6.0], &FitConfig::default()).unwrap();
        assert!((out.params[0] - 3.0).abs() < 1e-4);
        assert!((out.params[1] - 28.0).abs() < 1e-4);
        assert!((out.params[2].abs() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_curve_fit_zero_timeout_fails() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| gaussian(x, &[1.0, 10.0, 2.0])).collect();
        let cfg = FitConfig::default().timeout(Some(Duration::ZERO));
        let err = curve_fit(gaussian, &xs, &ys, &[1.0, 9.0, 2.0], &cfg).unwrap_err();
        assert!(matches!(err, FitError::Timeout(_)));
    }

    #[test]
    fn test_curve_fit_rejects_nan_data() {
        let xs = vec![0.0, 1.0, 2.0, 3.0];
        let ys = vec![0.0, f64::NAN, 1.0, 0.0];
        let err = curve_fit(gaussian, &xs, &ys, &[1.0, 1.5, 1.0], &FitConfig::default()).unwrap_err();
        assert_eq!(err, FitError::NonFinite);
    }

    #[test]
    fn test_curve_fit_too_few_samples() {
        let err = curve_fit(gaussian, &[0.0, 1.0], &[0.0, 1.0], &[1.0, 1.0, 1.0], &FitConfig::default())
            .unwrap_err();
        assert!(matches!(err, FitError::TooFewSamples { .. }));
    }
}
