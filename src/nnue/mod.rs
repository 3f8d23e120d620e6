//! NNUE evaluation.
//!
//! The network is a perspective pair of feature-transformer subnets with
//! input buckets keyed on the friendly king's square (horizontally mirrored
//! when the king stands on files e-h) and output buckets keyed on the total
//! piece count. Inference is fully quantized: `i16` weights, `i16`
//! accumulators, `i32` output, SCReLU activation.
//!
//! The evaluator itself is incremental: see [`accumulator`] for the
//! accumulator stack and the per-(bucket, mirror) refresh cache.

pub mod accumulator;
pub mod simd;

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::board::{Color, Piece, Square};
use crate::score::MAX_EVAL;

pub use accumulator::EvalState;

/// Hidden layer width of each perspective subnet.
pub const HIDDEN_SIZE: usize = 1536;

/// Number of king-square input buckets (after mirroring).
pub const INPUT_BUCKETS: usize = 4;

/// Features per input bucket: 2 colors x 6 kinds x 64 squares.
pub const FEATURES_PER_BUCKET: usize = 768;

/// Number of piece-count output buckets.
pub const OUTPUT_BUCKETS: usize = 8;

/// Feature-transformer quantization factor.
pub const QA: i32 = 255;

/// Output-layer quantization factor.
pub const QB: i32 = 64;

/// Conversion from network units to centipawns.
pub const EVAL_SCALE: i32 = 400;

/// Cache-line alignment wrapper; keeps the hot accumulator and weight rows
/// from straddling lines shared between workers.
#[derive(Clone, Copy, Debug)]
#[repr(C, align(64))]
pub struct Align64<T>(pub T);

impl<T> Deref for Align64<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Align64<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Input bucket of a (perspective-relative, already mirrored) king square.
/// Files e-h never index this table directly.
#[inline]
#[must_use]
pub(crate) fn king_bucket(rank: usize, file: usize) -> usize {
    debug_assert!(file < 4);
    match rank {
        0 => usize::from(file >= 2),
        1 => 2,
        _ => 3,
    }
}

/// Index of the feature (piece kind, piece color, square) as seen from
/// `perspective` whose king stands on `king` (absolute square).
#[inline]
#[must_use]
pub(crate) fn feature_index(
    perspective: Color,
    king: Square,
    piece_color: Color,
    piece: Piece,
    sq: Square,
) -> usize {
    let mut ksq = match perspective {
        Color::White => king,
        Color::Black => king.flip_vertical(),
    };
    let mirror = ksq.file() >= 4;
    if mirror {
        ksq = ksq.flip_horizontal();
    }
    let bucket = king_bucket(ksq.rank(), ksq.file());

    let mut rel = match perspective {
        Color::White => sq,
        Color::Black => sq.flip_vertical(),
    };
    if mirror {
        rel = rel.flip_horizontal();
    }

    let color_term = usize::from(piece_color != perspective);
    bucket * FEATURES_PER_BUCKET + color_term * 384 + piece.index() * 64 + rel.as_index()
}

/// Output bucket by total piece count.
#[inline]
#[must_use]
pub(crate) fn output_bucket(piece_count: u32) -> usize {
    ((piece_count.saturating_sub(2)) / 4).min(OUTPUT_BUCKETS as u32 - 1) as usize
}

/// Error raised when a network blob does not match the compiled-in
/// architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkError {
    pub expected_bytes: usize,
    pub found_bytes: usize,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "network blob is {} bytes, architecture needs {}",
            self.found_bytes, self.expected_bytes
        )
    }
}

impl std::error::Error for NetworkError {}

/// Quantized network weights.
#[derive(Debug)]
pub struct Network {
    /// Feature transformer rows, `INPUT_BUCKETS * FEATURES_PER_BUCKET` of
    /// them, one hidden-width row per feature.
    pub(crate) feature_weights: Vec<Align64<[i16; HIDDEN_SIZE]>>,
    pub(crate) feature_bias: Align64<[i16; HIDDEN_SIZE]>,
    /// Output rows, two per bucket: side-to-move half then opponent half.
    pub(crate) output_weights: Vec<Align64<[i16; HIDDEN_SIZE]>>,
    pub(crate) output_bias: [i32; OUTPUT_BUCKETS],
}

impl Network {
    const FT_WEIGHT_COUNT: usize = INPUT_BUCKETS * FEATURES_PER_BUCKET * HIDDEN_SIZE;
    const OUT_WEIGHT_COUNT: usize = OUTPUT_BUCKETS * 2 * HIDDEN_SIZE;

    /// Exact size of an acceptable network blob.
    pub const BLOB_BYTES: usize =
        2 * (Self::FT_WEIGHT_COUNT + HIDDEN_SIZE + Self::OUT_WEIGHT_COUNT + OUTPUT_BUCKETS);

    /// Load a network from a little-endian `i16` blob laid out as: feature
    /// weights, feature bias, output weights, output biases (in QA*QB
    /// units). The blob is the loader's concern; this only checks the size.
    pub fn from_bytes(data: &[u8]) -> Result<Network, NetworkError> {
        if data.len() != Self::BLOB_BYTES {
            return Err(NetworkError {
                expected_bytes: Self::BLOB_BYTES,
                found_bytes: data.len(),
            });
        }

        let mut words = data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]));
        let mut next = move || words.next().unwrap_or(0);

        let rows = INPUT_BUCKETS * FEATURES_PER_BUCKET;
        let mut feature_weights = Vec::with_capacity(rows);
        for _ in 0..rows {
            let mut row = Align64([0i16; HIDDEN_SIZE]);
            for value in row.iter_mut() {
                *value = next();
            }
            feature_weights.push(row);
        }

        let mut feature_bias = Align64([0i16; HIDDEN_SIZE]);
        for value in feature_bias.iter_mut() {
            *value = next();
        }

        let mut output_weights = Vec::with_capacity(OUTPUT_BUCKETS * 2);
        for _ in 0..OUTPUT_BUCKETS * 2 {
            let mut row = Align64([0i16; HIDDEN_SIZE]);
            for value in row.iter_mut() {
                *value = next();
            }
            output_weights.push(row);
        }

        let mut output_bias = [0i32; OUTPUT_BUCKETS];
        for value in &mut output_bias {
            *value = i32::from(next());
        }

        Ok(Network {
            feature_weights,
            feature_bias,
            output_weights,
            output_bias,
        })
    }

    /// An all-zero network. Every position evaluates to zero; useful as a
    /// stand-in when no trained blob is provided (search remains fully
    /// functional, mates and draws are still exact).
    #[must_use]
    pub fn zeroed() -> Network {
        Network {
            feature_weights: vec![
                Align64([0i16; HIDDEN_SIZE]);
                INPUT_BUCKETS * FEATURES_PER_BUCKET
            ],
            feature_bias: Align64([0i16; HIDDEN_SIZE]),
            output_weights: vec![Align64([0i16; HIDDEN_SIZE]); OUTPUT_BUCKETS * 2],
            output_bias: [0i32; OUTPUT_BUCKETS],
        }
    }

    /// The embedded default network.
    #[cfg(feature = "embedded_nnue")]
    #[must_use]
    pub fn embedded() -> Network {
        static BLOB: &[u8] = include_bytes!("nets/default.nnue");
        Network::from_bytes(BLOB).unwrap_or_else(|err| unreachable!("embedded network: {err}"))
    }

    #[inline]
    pub(crate) fn feature_row(&self, index: usize) -> &Align64<[i16; HIDDEN_SIZE]> {
        &self.feature_weights[index]
    }

    /// Forward pass over a finished accumulator pair.
    #[must_use]
    pub(crate) fn forward(
        &self,
        us: &Align64<[i16; HIDDEN_SIZE]>,
        them: &Align64<[i16; HIDDEN_SIZE]>,
        piece_count: u32,
    ) -> i32 {
        let bucket = output_bucket(piece_count);
        let sum = simd::screlu_dot(us, &self.output_weights[bucket * 2])
            + simd::screlu_dot(them, &self.output_weights[bucket * 2 + 1]);

        let scaled = (sum / i64::from(QA) + i64::from(self.output_bias[bucket]))
            * i64::from(EVAL_SCALE)
            / i64::from(QA * QB);

        // Static evaluations must never collide with mate scores
        (scaled as i32).clamp(-MAX_EVAL, MAX_EVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_bucket_ranges() {
        assert_eq!(output_bucket(2), 0);
        assert_eq!(output_bucket(5), 0);
        assert_eq!(output_bucket(6), 1);
        assert_eq!(output_bucket(17), 3);
        assert_eq!(output_bucket(32), 7);
        // Bare kings cannot underflow
        assert_eq!(output_bucket(0), 0);
    }

    #[test]
    fn feature_index_in_range() {
        let king: Square = "g1".parse().unwrap();
        for persp in [Color::White, Color::Black] {
            for color in [Color::White, Color::Black] {
                for piece in [Piece::Pawn, Piece::Knight, Piece::King] {
                    for idx in 0..64 {
                        let f = feature_index(persp, king, color, piece, Square::from_index(idx));
                        assert!(f < INPUT_BUCKETS * FEATURES_PER_BUCKET);
                    }
                }
            }
        }
    }

    #[test]
    fn mirroring_folds_the_king_files() {
        // A king on g1 and its mirror on b1 see mirrored features the same
        let a = feature_index(
            Color::White,
            "g1".parse().unwrap(),
            Color::White,
            Piece::Pawn,
            "h2".parse().unwrap(),
        );
        let b = feature_index(
            Color::White,
            "b1".parse().unwrap(),
            Color::White,
            Piece::Pawn,
            "a2".parse().unwrap(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn perspectives_flip_colors() {
        let king: Square = "e1".parse().unwrap();
        let sq: Square = "e4".parse().unwrap();
        let white_view = feature_index(Color::White, king, Color::White, Piece::Pawn, sq);
        let black_view = feature_index(
            Color::Black,
            king.flip_vertical(),
            Color::White,
            Piece::Pawn,
            sq.flip_vertical(),
        );
        // Same bucket, same relative square, but the color term flips
        assert_eq!(black_view, white_view + 384);
    }

    #[test]
    fn blob_size_is_rejected() {
        let err = Network::from_bytes(&[0u8; 16]).unwrap_err();
        assert_eq!(err.found_bytes, 16);
        assert_eq!(err.expected_bytes, Network::BLOB_BYTES);
    }

    #[test]
    fn zeroed_network_evaluates_to_zero() {
        let net = Network::zeroed();
        let us = Align64([0i16; HIDDEN_SIZE]);
        let them = Align64([0i16; HIDDEN_SIZE]);
        assert_eq!(net.forward(&us, &them, 32), 0);
    }
}
