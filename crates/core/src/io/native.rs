//! Native GeoTIFF reading/writing on top of the `tiff` crate.
//!
//! Georeferencing is read from ModelPixelScale + ModelTiepoint or from
//! ModelTransformation, the CRS from the GeoKey directory (EPSG codes only)
//! and no-data from the GDAL_NODATA ascii tag.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{DataType, GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;
use num_traits::{NumCast, Zero};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Read one band of a GeoTIFF file into a Raster
///
/// `band` is 1-based; `None` reads the first band.
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file), band)
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let samples = decoder
        .get_tag_u32(Tag::SamplesPerPixel)
        .map(|s| s as usize)
        .unwrap_or(1)
        .max(1);
    let planar = decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1) == 2;

    let band = band.unwrap_or(1);
    if band == 0 || band > samples {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band.to_string(),
            reason: format!("file has {} band(s)", samples),
        });
    }

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;
    let all: Vec<T> = cast_samples(result)?;

    let cells = rows * cols;
    if all.len() < cells * samples {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let data: Vec<T> = if samples == 1 {
        all
    } else if planar {
        all[(band - 1) * cells..band * cells].to_vec()
    } else {
        all.iter().skip(band - 1).step_by(samples).take(cells).copied().collect()
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    raster.set_nodata(read_nodata(&mut decoder));

    Ok(raster)
}

fn cast_samples<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    fn cast<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
            .collect()
    }

    Ok(match result {
        DecodingResult::U8(buf) => cast(buf),
        DecodingResult::U16(buf) => cast(buf),
        DecodingResult::U32(buf) => cast(buf),
        DecodingResult::U64(buf) => cast(buf),
        DecodingResult::I8(buf) => cast(buf),
        DecodingResult::I16(buf) => cast(buf),
        DecodingResult::I32(buf) => cast(buf),
        DecodingResult::I64(buf) => cast(buf),
        DecodingResult::F32(buf) => cast(buf),
        DecodingResult::F64(buf) => cast(buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    })
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major matrix; only the first two rows matter in 2-D.
    let matrix = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if matrix.len() < 8 {
        return None;
    }
    Some(GeoTransform {
        origin_x: matrix[3],
        pixel_width: matrix[0],
        row_rotation: matrix[1],
        origin_y: matrix[7],
        col_rotation: matrix[4],
        pixel_height: matrix[5],
    })
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    epsg_from_geokeys(&keys).map(CRS::from_epsg)
}

/// EPSG code from a GeoKey directory, projected system first.
fn epsg_from_geokeys(keys: &[u16]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks_exact(4).take(count).collect();

    let lookup = |wanted: u16| {
        entries
            .iter()
            .find(|e| e[0] == wanted && e[1] == 0 && e[3] != 0 && e[3] != USER_DEFINED)
            .map(|e| e[3] as u32)
    };
    lookup(PROJECTED_CS_TYPE).or_else(|| lookup(GEOGRAPHIC_TYPE))
}

fn read_nodata<R: Read + Seek, T: RasterElement>(decoder: &mut Decoder<R>) -> Option<T> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    let value: f64 = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok()?;
    T::from_f64(value)
}

/// Write a Raster to a single-band Float32 GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    write_geotiff_as(raster, path, DataType::Float32)
}

/// Write a Raster to a single-band GeoTIFF with samples of type `dtype`.
///
/// Values go through [`DataType::quantize`]; cells with no integer
/// representation (NaN) are written as the raster's no-data value, or 0.
pub fn write_geotiff_as<T, P>(raster: &Raster<T>, path: P, dtype: DataType) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, dtype)?;
    writer.flush()?;
    Ok(())
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, dtype: DataType) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    match dtype {
        DataType::Uint8 => encode_band::<colortype::Gray8, _, _>(&mut encoder, raster, dtype),
        DataType::Uint16 => encode_band::<colortype::Gray16, _, _>(&mut encoder, raster, dtype),
        DataType::Int16 => encode_band::<colortype::GrayI16, _, _>(&mut encoder, raster, dtype),
        DataType::Int32 => encode_band::<colortype::GrayI32, _, _>(&mut encoder, raster, dtype),
        DataType::Uint32 => encode_band::<colortype::Gray32, _, _>(&mut encoder, raster, dtype),
        DataType::Float32 => encode_band::<colortype::Gray32Float, _, _>(&mut encoder, raster, dtype),
        DataType::Float64 => encode_band::<colortype::Gray64Float, _, _>(&mut encoder, raster, dtype),
    }
}

fn encode_band<C, T, W>(encoder: &mut TiffEncoder<W>, raster: &Raster<T>, dtype: DataType) -> Result<()>
where
    C: ColorType,
    C::Inner: NumCast + Zero + Copy,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();

    let nodata = raster
        .nodata()
        .and_then(|nd| nd.to_f64())
        .and_then(|nd| dtype.quantize(nd));
    let fill: C::Inner = nodata.and_then(num_traits::cast).unwrap_or_else(Zero::zero);
    let data: Vec<C::Inner> = raster
        .data()
        .iter()
        .map(|&v| {
            v.to_f64()
                .and_then(|v| dtype.quantize(v))
                .and_then(num_traits::cast)
                .unwrap_or(fill)
        })
        .collect();

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let tag_err = |what: &str, e: tiff::TiffError| Error::Other(format!("Cannot write {} tag: {}", what, e));
    let gt = raster.transform();

    if gt.is_axis_aligned() && gt.pixel_height < 0.0 {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &scale[..])
            .map_err(|e| tag_err("scale", e))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
            .map_err(|e| tag_err("tiepoint", e))?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image
            .encoder()
            .write_tag(Tag::ModelTransformationTag, &matrix[..])
            .map_err(|e| tag_err("transformation", e))?;
    }

    let geokeys = geokey_directory(raster.crs());
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| tag_err("geokey", e))?;

    if let Some(nodata) = nodata {
        let text = nodata.to_string();
        image
            .encoder()
            .write_tag(Tag::GdalNodata, text.as_str())
            .map_err(|e| tag_err("nodata", e))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// Minimal GeoKey directory: model type, raster type and the EPSG code.
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let geographic = crs.map_or(false, CRS::is_geographic);
    let model_type = if geographic { MODEL_TYPE_GEOGRAPHIC } else { MODEL_TYPE_PROJECTED };

    let mut entries: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE, 0, 1, model_type],
        [GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA],
    ];
    if let Some(code) = crs.and_then(CRS::epsg).and_then(|c| u16::try_from(c).ok()) {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        entries.push([key, 0, 1, code]);
    }

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    keys.extend(entries.iter().flatten());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_geokeys_roundtrip() {
        let keys = geokey_directory(Some(&CRS::from_epsg(32630)));
        assert_eq!(epsg_from_geokeys(&keys), Some(32630));

        let keys = geokey_directory(Some(&CRS::wgs84()));
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));

        assert_eq!(epsg_from_geokeys(&geokey_directory(None)), None);
    }

    #[test]
    fn test_user_defined_geokey_ignored() {
        let keys = [1, 1, 0, 1, PROJECTED_CS_TYPE, 0, 1, USER_DEFINED];
        assert_eq!(epsg_from_geokeys(&keys), None);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");

        let raster = Raster::from_array(array![[1.0f64, 2.0, 3.0], [4.0, -9999.0, 6.0]])
            .with_transform(GeoTransform::new(500000.0, 4100000.0, 30.0, -30.0))
            .with_crs(CRS::from_epsg(32630))
            .with_nodata(Some(-9999.0));
        write_geotiff(&raster, &path).unwrap();

        let back: Raster<f64> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.get(1, 2).unwrap(), 6.0);
        assert_eq!(back.transform(), raster.transform());
        assert_eq!(back.crs().and_then(CRS::epsg), Some(32630));
        assert_eq!(back.nodata(), Some(-9999.0));
        assert!(back.is_nodata(back.get(1, 1).unwrap()));
    }

    #[test]
    fn test_integer_sample_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counts.tif");

        let raster = Raster::from_array(array![[1.0f64, 2.4, f64::NAN], [70000.0, -3.0, 7.6]])
            .with_nodata(Some(0.0));
        write_geotiff_as(&raster, &path, DataType::Uint16).unwrap();

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        assert!(matches!(decoder.read_image().unwrap(), DecodingResult::U16(_)));

        let back: Raster<u16> = read_geotiff(&path, None).unwrap();
        assert_eq!(back.data(), &array![[1u16, 2, 0], [65535, 0, 8]]);
        assert_eq!(back.nodata(), Some(0));
    }

    #[test]
    fn test_bad_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.tif");
        write_geotiff(&Raster::<f64>::new(2, 2), &path).unwrap();

        let err = read_geotiff::<f64, _>(&path, Some(2)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "band", .. }));
    }
}
