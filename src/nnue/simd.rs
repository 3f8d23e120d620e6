//! SIMD kernels for NNUE inference.
//!
//! Provides the fused accumulator updates (add/sub combinations matching
//! quiet moves, captures, and castling) and the SCReLU dot product.
//!
//! Supports:
//! - `x86_64` with AVX2 (runtime-detected)
//! - Scalar fallback everywhere else

use super::{Align64, HIDDEN_SIZE, QA};

type Row = Align64<[i16; HIDDEN_SIZE]>;

// ============================================================================
// Public API - dispatches to platform-specific implementations
// ============================================================================

/// `acc += add`
#[inline]
pub fn add(acc: &mut Row, add: &Row) {
    dispatch_update(acc, &[add], &[]);
}

/// `acc -= sub`
#[inline]
pub fn sub(acc: &mut Row, sub: &Row) {
    dispatch_update(acc, &[], &[sub]);
}

/// `acc += add - sub` (quiet move)
#[inline]
pub fn add_sub(acc: &mut Row, add: &Row, sub: &Row) {
    dispatch_update(acc, &[add], &[sub]);
}

/// `acc += add - sub1 - sub2` (capture)
#[inline]
pub fn add_sub_sub(acc: &mut Row, add: &Row, sub1: &Row, sub2: &Row) {
    dispatch_update(acc, &[add], &[sub1, sub2]);
}

/// `acc += add1 + add2 - sub1 - sub2` (castling)
#[inline]
pub fn add_add_sub_sub(acc: &mut Row, add1: &Row, add2: &Row, sub1: &Row, sub2: &Row) {
    dispatch_update(acc, &[add1, add2], &[sub1, sub2]);
}

/// SCReLU dot product: `sum(clamp(acc[i], 0, QA)^2 * weights[i])`.
#[inline]
#[must_use]
pub fn screlu_dot(acc: &Row, weights: &Row) -> i64 {
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            return unsafe { screlu_dot_avx2(acc, weights) };
        }
    }
    screlu_dot_scalar(acc, weights)
}

#[inline]
fn dispatch_update(acc: &mut Row, adds: &[&Row], subs: &[&Row]) {
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") {
            unsafe { update_avx2(acc, adds, subs) };
            return;
        }
    }
    update_scalar(acc, adds, subs);
}

// ============================================================================
// Scalar implementations
// ============================================================================

fn update_scalar(acc: &mut Row, adds: &[&Row], subs: &[&Row]) {
    for row in adds {
        for (value, delta) in acc.iter_mut().zip(row.iter()) {
            *value = value.wrapping_add(*delta);
        }
    }
    for row in subs {
        for (value, delta) in acc.iter_mut().zip(row.iter()) {
            *value = value.wrapping_sub(*delta);
        }
    }
}

fn screlu_dot_scalar(acc: &Row, weights: &Row) -> i64 {
    let mut sum = 0i64;
    for (&value, &weight) in acc.iter().zip(weights.iter()) {
        let clamped = i64::from(value.clamp(0, QA as i16));
        sum += clamped * clamped * i64::from(weight);
    }
    sum
}

// ============================================================================
// AVX2 implementations (16 i16 lanes per register)
// ============================================================================

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn update_avx2(acc: &mut Row, adds: &[&Row], subs: &[&Row]) {
    use std::arch::x86_64::{
        __m256i, _mm256_add_epi16, _mm256_load_si256, _mm256_store_si256, _mm256_sub_epi16,
    };

    const LANES: usize = 16;
    let acc_ptr = acc.as_mut_ptr().cast::<__m256i>();

    for chunk in 0..HIDDEN_SIZE / LANES {
        let mut vector = _mm256_load_si256(acc_ptr.add(chunk));
        for row in adds {
            let delta = _mm256_load_si256(row.as_ptr().cast::<__m256i>().add(chunk));
            vector = _mm256_add_epi16(vector, delta);
        }
        for row in subs {
            let delta = _mm256_load_si256(row.as_ptr().cast::<__m256i>().add(chunk));
            vector = _mm256_sub_epi16(vector, delta);
        }
        _mm256_store_si256(acc_ptr.add(chunk), vector);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn screlu_dot_avx2(acc: &Row, weights: &Row) -> i64 {
    use std::arch::x86_64::{
        __m256i, _mm256_add_epi32, _mm256_extracti128_si256, _mm256_load_si256, _mm256_madd_epi16,
        _mm256_max_epi16, _mm256_min_epi16, _mm256_mullo_epi16, _mm256_set1_epi16,
        _mm256_setzero_si256, _mm_add_epi32, _mm_cvtsi128_si32, _mm_shuffle_epi32,
    };

    const LANES: usize = 16;
    let zero = _mm256_setzero_si256();
    let qa = _mm256_set1_epi16(QA as i16);
    let mut sum = _mm256_setzero_si256();

    let acc_ptr = acc.as_ptr().cast::<__m256i>();
    let w_ptr = weights.as_ptr().cast::<__m256i>();

    for chunk in 0..HIDDEN_SIZE / LANES {
        let value = _mm256_load_si256(acc_ptr.add(chunk));
        let weight = _mm256_load_si256(w_ptr.add(chunk));

        let clamped = _mm256_min_epi16(_mm256_max_epi16(value, zero), qa);
        // clamped * weight stays within i16 for trained (clipped) weights;
        // the second multiply widens through madd into i32 lanes
        let partial = _mm256_mullo_epi16(clamped, weight);
        let product = _mm256_madd_epi16(clamped, partial);
        sum = _mm256_add_epi32(sum, product);
    }

    // Horizontal reduction of 8 i32 lanes
    let low = _mm256_extracti128_si256::<0>(sum);
    let high = _mm256_extracti128_si256::<1>(sum);
    let mut total = _mm_add_epi32(low, high);
    total = _mm_add_epi32(total, _mm_shuffle_epi32::<0b01_00_11_10>(total));
    total = _mm_add_epi32(total, _mm_shuffle_epi32::<0b10_11_00_01>(total));
    i64::from(_mm_cvtsi128_si32(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(f: impl Fn(usize) -> i16) -> Box<Row> {
        let mut row = Box::new(Align64([0i16; HIDDEN_SIZE]));
        for (i, value) in row.iter_mut().enumerate() {
            *value = f(i);
        }
        row
    }

    #[test]
    fn fused_updates_match_naive() {
        let mut acc = row(|i| (i % 97) as i16 - 48);
        let reference = acc.clone();
        let a1 = row(|i| (i % 13) as i16 - 6);
        let a2 = row(|i| (i % 7) as i16);
        let s1 = row(|i| (i % 11) as i16 - 5);
        let s2 = row(|i| (i % 5) as i16 - 2);

        add_add_sub_sub(&mut acc, &a1, &a2, &s1, &s2);

        for i in 0..HIDDEN_SIZE {
            let expected = reference[i] + a1[i] + a2[i] - s1[i] - s2[i];
            assert_eq!(acc[i], expected, "lane {i}");
        }
    }

    #[test]
    fn add_then_sub_round_trips() {
        let mut acc = row(|i| (i % 31) as i16);
        let reference = acc.clone();
        let delta = row(|i| (i % 17) as i16 - 8);
        add(&mut acc, &delta);
        sub(&mut acc, &delta);
        for i in 0..HIDDEN_SIZE {
            assert_eq!(acc[i], reference[i]);
        }
    }

    #[test]
    fn screlu_matches_reference() {
        let acc = row(|i| ((i * 37) % 600) as i16 - 150);
        let weights = row(|i| ((i * 11) % 101) as i16 - 50);

        let got = screlu_dot(&acc, &weights);

        let mut expected = 0i64;
        for i in 0..HIDDEN_SIZE {
            let c = i64::from(acc[i].clamp(0, QA as i16));
            expected += c * c * i64::from(weights[i]);
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn screlu_clamps_both_sides() {
        let acc = row(|i| if i == 0 { 1000 } else { -1000 });
        let weights = row(|_| 1);
        // Only lane 0 survives the clamp, at QA^2
        assert_eq!(screlu_dot(&acc, &weights), i64::from(QA) * i64::from(QA));
    }
}
