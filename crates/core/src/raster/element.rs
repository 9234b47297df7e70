//! Cell value types

use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Types that can be stored in a raster cell.
///
/// GeoTIFF bands are decoded into one of these and usually widened to
/// `f64` before overlay work.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// No-data value used when a grid has none of its own
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Lossy conversion from `f64`; `None` when out of range.
    fn from_f64(value: f64) -> Option<Self> {
        NumCast::from(value)
    }
}

macro_rules! impl_raster_element_int {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.map_or(false, |nd| *self == nd)
            }

            fn is_float() -> bool {
                false
            }
        }
    )*};
}

macro_rules! impl_raster_element_float {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            /// NaN is always no-data, whatever the declared value.
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if nd.is_nan() => false,
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    )*};
}

impl_raster_element_int!(i8, i16, i32, i64, u8, u16, u32, u64);
impl_raster_element_float!(f32, f64);

/// Sample type of a band on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Uint8,
    Uint16,
    Int16,
    Int32,
    Uint32,
    Float32,
    #[default]
    Float64,
}

impl DataType {
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Inclusive value range of an integer type.
    fn int_range(self) -> Option<(f64, f64)> {
        match self {
            DataType::Uint8 => Some((0.0, u8::MAX as f64)),
            DataType::Uint16 => Some((0.0, u16::MAX as f64)),
            DataType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            DataType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            DataType::Uint32 => Some((0.0, u32::MAX as f64)),
            DataType::Float32 | DataType::Float64 => None,
        }
    }

    /// `value` as this type would store it: integers are rounded to the
    /// nearest and saturated at the type's range, Float32 loses precision.
    /// `None` for NaN or infinities in an integer type.
    pub fn quantize(self, value: f64) -> Option<f64> {
        match self.int_range() {
            Some((lo, hi)) => value.is_finite().then(|| value.round().clamp(lo, hi)),
            None if self == DataType::Float32 => Some(value as f32 as f64),
            None => Some(value),
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uint8" | "u8" => Ok(DataType::Uint8),
            "uint16" | "u16" => Ok(DataType::Uint16),
            "int16" | "i16" => Ok(DataType::Int16),
            "int32" | "i32" => Ok(DataType::Int32),
            "uint32" | "u32" => Ok(DataType::Uint32),
            "float32" | "f32" => Ok(DataType::Float32),
            "float64" | "f64" => Ok(DataType::Float64),
            _ => Err(Error::InvalidParameter {
                name: "dtype",
                value: s.to_string(),
                reason: "expected uint8, uint16, int16, int32, uint32, float32 or float64".into(),
            }),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Uint32 => "uint32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        };
        f.write_str(name)
    }
}
