//! Float wrappers with a total equality, order, and hash so floats can be set
//! elements.
//!
//! All NaNs are equal to each other and sort after every other value. `-0.0`
//! and `0.0` are equal. Non-finite values are encoded as strings (`"NaN"`,
//! `"inf"`, `"-inf"`) since JSON numbers can't represent them.
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use setagg_error::{DbError, Result, ResultExt};

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FloatRepr<F> {
    Number(F),
    Special(String),
}

macro_rules! trait_impls {
    ($wrapper:ident, $prim:ident) => {
        impl $wrapper {
            /// Value used for comparisons and hashing.
            fn canonical(self) -> $prim {
                if self.0.is_nan() {
                    $prim::NAN
                } else if self.0 == 0.0 {
                    0.0
                } else {
                    self.0
                }
            }
        }

        impl From<$prim> for $wrapper {
            fn from(v: $prim) -> Self {
                Self(v)
            }
        }

        impl From<$wrapper> for $prim {
            fn from(v: $wrapper) -> Self {
                v.0
            }
        }

        impl Deref for $wrapper {
            type Target = $prim;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl PartialEq for $wrapper {
            fn eq(&self, other: &Self) -> bool {
                self.cmp(other).is_eq()
            }
        }

        impl Eq for $wrapper {}

        impl PartialOrd for $wrapper {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $wrapper {
            fn cmp(&self, other: &Self) -> Ordering {
                $prim::total_cmp(&self.canonical(), &other.canonical())
            }
        }

        impl Hash for $wrapper {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.canonical().to_bits().hash(state)
            }
        }

        impl From<$wrapper> for FloatRepr<$prim> {
            fn from(v: $wrapper) -> Self {
                if v.0.is_finite() {
                    FloatRepr::Number(v.0)
                } else {
                    FloatRepr::Special(v.0.to_string())
                }
            }
        }

        impl TryFrom<FloatRepr<$prim>> for $wrapper {
            type Error = DbError;

            fn try_from(repr: FloatRepr<$prim>) -> Result<Self> {
                match repr {
                    FloatRepr::Number(v) => Ok(Self(v)),
                    FloatRepr::Special(s) => s
                        .parse::<$prim>()
                        .map($wrapper)
                        .context_fn(|| format!("Invalid float value '{s}'")),
                }
            }
        }
    };
}

/// A totally ordered float32.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "FloatRepr<f32>", into = "FloatRepr<f32>")]
#[repr(transparent)]
pub struct OrdF32(pub f32);

trait_impls!(OrdF32, f32);

/// A totally ordered float64.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "FloatRepr<f64>", into = "FloatRepr<f64>")]
#[repr(transparent)]
pub struct OrdF64(pub f64);

trait_impls!(OrdF64, f64);

#[cfg(test)]
mod tests {
    use std::hash::BuildHasher;

    use super::*;

    fn hash_of(v: OrdF64) -> u64 {
        ahash::RandomState::with_seeds(0, 0, 0, 0).hash_one(v)
    }

    #[test]
    fn nans_are_equal() {
        let a = OrdF64(f64::NAN);
        let b = OrdF64(-f64::NAN);
        assert_eq!(a, b);
        assert_eq!(hash_of(a), hash_of(b));
    }

    #[test]
    fn signed_zeros_are_equal() {
        assert_eq!(OrdF64(0.0), OrdF64(-0.0));
        assert_eq!(hash_of(OrdF64(0.0)), hash_of(OrdF64(-0.0)));
        assert_eq!(OrdF32(0.0), OrdF32(-0.0));
    }

    #[test]
    fn nan_sorts_last() {
        let mut vals = vec![OrdF64(f64::NAN), OrdF64(f64::INFINITY), OrdF64(-1.0)];
        vals.sort();
        assert_eq!(OrdF64(-1.0), vals[0]);
        assert_eq!(OrdF64(f64::INFINITY), vals[1]);
        assert!(vals[2].is_nan());
    }

    #[test]
    fn json_non_finite() {
        let vals = vec![OrdF64(1.25), OrdF64(f64::NAN), OrdF64(f64::NEG_INFINITY)];
        let json = serde_json::to_string(&vals).unwrap();
        assert_eq!(r#"[1.25,"NaN","-inf"]"#, json);

        let back: Vec<OrdF64> = serde_json::from_str(&json).unwrap();
        assert_eq!(vals, back);
    }

    #[test]
    fn json_invalid_string() {
        serde_json::from_str::<OrdF32>(r#""one""#).unwrap_err();
    }
}
