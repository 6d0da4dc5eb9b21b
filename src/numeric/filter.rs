//! # 平滑与插值
//!
//! - `gaussian_filter1d`: 一维高斯卷积，边界采用半采样对称反射 (d c b a | a b c d | d c b a)，
//!   核半径 `int(4σ + 0.5)`
//! - `quadratic_interpolate`: 以相邻三点二次多项式做分段插值，区间外使用端部三点外推
//!
//! ## 依赖关系
//! - 被 `models/spectrum.rs` 调用
//! - 无外部模块依赖

/// 高斯核截断倍数
const TRUNCATE: f64 = 4.0;

/// 一维高斯平滑
pub fn gaussian_filter1d(input: &[f64], sigma: f64) -> Vec<f64> {
    if input.is_empty() || sigma <= 0.0 {
        return input.to_vec();
    }

    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let kernel = gaussian_kernel(sigma, radius);
    let n = input.len();

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let offset = k as isize - radius as isize;
                    w * input[reflect_index(i as isize + offset, n)]
                })
                .sum()
        })
        .collect()
}

fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f64> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let x = k as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

/// 半采样对称反射下的索引
fn reflect_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m >= n {
        2 * n - 1 - m
    } else {
        m
    }
}

/// 分段二次插值
///
/// `xs` 必须严格递增且至少包含 3 个点，否则返回 `None`。
pub fn quadratic_interpolate(xs: &[f64], ys: &[f64], at: &[f64]) -> Option<Vec<f64>> {
    if xs.len() < 3 || xs.len() != ys.len() {
        return None;
    }
    if xs.windows(2).any(|w| w[1] <= w[0]) {
        return None;
    }

    let last_start = xs.len() - 3;
    let out = at
        .iter()
        .map(|&x| {
            // 选取以 x 所在区间为中心的三点窗口
            let k = xs.partition_point(|&v| v < x);
            let start = k.saturating_sub(1).min(last_start);
            lagrange3(&xs[start..start + 3], &ys[start..start + 3], x)
        })
        .collect();
    Some(out)
}

fn lagrange3(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let (x0, x1, x2) = (xs[0], xs[1], xs[2]);
    let l0 = (x - x1) * (x - x2) / ((x0 - x1) * (x0 - x2));
    let l1 = (x - x0) * (x - x2) / ((x1 - x0) * (x1 - x2));
    let l2 = (x - x0) * (x - x1) / ((x2 - x0) * (x2 - x1));
    ys[0] * l0 + ys[1] * l1 + ys[2] * l2
}
