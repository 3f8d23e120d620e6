//! Tunable search parameters.
//!
//! Every knob that shapes the search is a named integer with a registered
//! range, so an external tuner (or the UCI option layer) can enumerate and
//! set them by name. Defaults are the played configuration.

use std::fmt;

/// Metadata for one tunable.
#[derive(Clone, Copy, Debug)]
pub struct ParamInfo {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

/// Error from setting a tunable by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    Unknown { name: String },
    OutOfRange { name: String, min: i32, max: i32, value: i32 },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Unknown { name } => write!(f, "unknown parameter '{name}'"),
            ParamError::OutOfRange {
                name,
                min,
                max,
                value,
            } => write!(f, "{name} = {value} outside [{min}, {max}]"),
        }
    }
}

impl std::error::Error for ParamError {}

macro_rules! tunables {
    ( $( $name:ident : $default:expr, $min:expr, $max:expr; )* ) => {
        /// The full search configuration.
        #[derive(Clone, Debug)]
        pub struct SearchParams {
            $( pub $name: i32, )*
        }

        impl Default for SearchParams {
            fn default() -> SearchParams {
                SearchParams { $( $name: $default, )* }
            }
        }

        /// Registry of every tunable with its range and default.
        pub static PARAM_REGISTRY: &[ParamInfo] = &[
            $( ParamInfo { name: stringify!($name), min: $min, max: $max, default: $default }, )*
        ];

        impl SearchParams {
            /// Set a tunable by name, range-checked against the registry.
            pub fn set(&mut self, name: &str, value: i32) -> Result<(), ParamError> {
                match name {
                    $(
                        stringify!($name) => {
                            if !($min..=$max).contains(&value) {
                                return Err(ParamError::OutOfRange {
                                    name: name.to_string(),
                                    min: $min,
                                    max: $max,
                                    value,
                                });
                            }
                            self.$name = value;
                            Ok(())
                        }
                    )*
                    _ => Err(ParamError::Unknown {
                        name: name.to_string(),
                    }),
                }
            }

            /// Read a tunable by name.
            #[must_use]
            pub fn get(&self, name: &str) -> Option<i32> {
                match name {
                    $( stringify!($name) => Some(self.$name), )*
                    _ => None,
                }
            }
        }
    };
}

tunables! {
    // Aspiration windows
    aspiration_min_depth: 4, 1, 10;
    aspiration_initial_delta: 16, 4, 100;
    aspiration_max_delta: 1024, 128, 8192;

    // Reverse futility pruning
    rfp_depth_limit: 7, 1, 12;
    rfp_margin: 70, 20, 200;
    rfp_improving_margin: 55, 10, 200;

    // Null move pruning
    nmp_min_depth: 3, 2, 8;
    nmp_base_reduction: 4, 1, 6;
    nmp_depth_divisor: 4, 1, 8;
    nmp_eval_divisor: 200, 50, 600;
    nmp_eval_max_reduction: 3, 0, 6;

    // Internal iterative reductions
    iir_min_depth: 4, 2, 10;

    // Late move pruning
    lmp_offset: 3, 0, 10;
    lmp_multiplier: 1, 1, 4;

    // Futility pruning
    fp_depth_limit: 6, 1, 12;
    fp_offset: 80, 0, 300;
    fp_margin: 90, 20, 300;

    // SEE pruning, margins per depth
    see_quiet_margin: -60, -200, -10;
    see_capture_margin: -100, -300, -20;

    // Singular extensions
    singular_min_depth: 7, 4, 12;
    singular_depth_margin: 3, 1, 6;
    singular_margin_mult: 2, 1, 8;
    singular_double_margin: 20, 5, 100;
    singular_triple_margin: 100, 20, 300;

    // Late move reductions (table constants are fixed-point, x100)
    lmr_base: 77, 0, 200;
    lmr_divisor: 236, 100, 500;
    lmr_min_depth: 3, 2, 8;
    lmr_min_moves_pv: 4, 1, 8;
    lmr_min_moves_nonpv: 2, 1, 8;
    lmr_history_divisor: 8192, 1024, 32768;

    // History updates
    history_bonus_mult: 150, 50, 400;
    history_bonus_max: 2500, 500, 8000;
    history_malus_mult: 120, 50, 400;
    history_malus_max: 1500, 500, 8000;

    // Correction history blend (weights over 1024)
    corr_weight_pawn: 1024, 0, 4096;
    corr_weight_nonpawn: 1024, 0, 4096;
    corr_weight_major: 1024, 0, 4096;
    corr_weight_minor: 1024, 0, 4096;
    corr_weight_cont1: 512, 0, 4096;
    corr_weight_cont2: 512, 0, 4096;

    // Node-count time management
    node_tm_base: 150, 100, 300;
    node_tm_scale: 135, 50, 300;
    node_tm_depth: 5, 1, 12;

    // Material scaling of the evaluation
    material_scale_base: 700, 400, 1000;
    material_knight: 3, 0, 10;
    material_bishop: 3, 0, 10;
    material_rook: 5, 0, 16;
    material_queen: 10, 0, 32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_matches_defaults() {
        let params = SearchParams::default();
        for info in PARAM_REGISTRY {
            assert_eq!(params.get(info.name), Some(info.default), "{}", info.name);
            assert!(info.min <= info.default && info.default <= info.max);
        }
    }

    #[test]
    fn set_by_name_respects_ranges() {
        let mut params = SearchParams::default();
        params.set("rfp_margin", 100).unwrap();
        assert_eq!(params.rfp_margin, 100);

        let err = params.set("rfp_margin", 100_000).unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { .. }));
        assert_eq!(params.rfp_margin, 100);

        let err = params.set("no_such_knob", 1).unwrap_err();
        assert!(matches!(err, ParamError::Unknown { .. }));
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = PARAM_REGISTRY.iter().map(|info| info.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
