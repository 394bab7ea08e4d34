//! GDAL raster I/O for feature files

use crate::types::{S1Error, S1Result};
use gdal::raster::{Buffer, GdalType};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Raster size as (width, height) in pixels
pub fn dimensions<P: AsRef<Path>>(path: P) -> S1Result<(usize, usize)> {
    let dataset = Dataset::open(path.as_ref())?;
    Ok(dataset.raster_size())
}

/// Open a raster, check it holds data and return its (width, height)
pub fn validate_raster<P: AsRef<Path>>(path: P) -> S1Result<(usize, usize)> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(S1Error::not_found("raster", path));
    }

    let dataset = Dataset::open(path)?;
    let (width, height) = dataset.raster_size();
    let bands = dataset.raster_count();
    log::debug!(
        "Validated {}: {} x {}, bands: {}",
        path.display(),
        width,
        height,
        bands
    );

    if width == 0 || height == 0 || bands == 0 {
        return Err(S1Error::Raster(format!(
            "{} is empty ({} x {}, {} bands)",
            path.display(),
            width,
            height,
            bands
        )));
    }
    Ok((width, height))
}

/// Read one band (1-based) as f32
pub fn read_band_f32<P: AsRef<Path>>(path: P, band: isize) -> S1Result<Array2<f32>> {
    log::debug!("Reading band {} of {}", band, path.as_ref().display());

    let dataset = Dataset::open(path.as_ref())?;
    let (width, height) = dataset.raster_size();

    let rasterband = dataset.rasterband(band)?;
    let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;

    Array2::from_shape_vec((height, width), band_data.data)
        .map_err(|e| S1Error::Raster(format!("Failed to reshape band data: {}", e)))
}

/// Create a raster with one band per array using the named GDAL driver
pub fn write_raster<T, P>(path: P, driver_name: &str, bands: &[Array2<T>]) -> S1Result<()>
where
    T: GdalType + Copy,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let first = bands
        .first()
        .ok_or_else(|| S1Error::Raster("no bands to write".to_string()))?;
    let (height, width) = first.dim();

    if bands.iter().any(|b| b.dim() != (height, width)) {
        return Err(S1Error::Raster(
            "all bands must have the same array shape".to_string(),
        ));
    }

    log::debug!(
        "Writing {} band(s) of {} x {} to {} ({})",
        bands.len(),
        width,
        height,
        path.display(),
        driver_name
    );

    let driver = DriverManager::get_driver_by_name(driver_name)?;
    let dataset = driver.create_with_band_type::<T, _>(
        path,
        width as isize,
        height as isize,
        bands.len() as isize,
    )?;

    for (index, band) in bands.iter().enumerate() {
        let mut rasterband = dataset.rasterband(index as isize + 1)?;
        let flat_data: Vec<T> = band.iter().copied().collect();
        let buffer = Buffer::new((width, height), flat_data);
        rasterband.write((0, 0), (width, height), &buffer)?;
    }

    Ok(())
}

/// Single-band ENVI byte raster (`.img` + `.hdr`)
pub fn write_envi_u8<P: AsRef<Path>>(path: P, data: &Array2<u8>) -> S1Result<()> {
    write_raster(path, "ENVI", std::slice::from_ref(data))
}

/// Single-band Float32 GeoTIFF
pub fn write_geotiff_f32<P: AsRef<Path>>(path: P, data: &Array2<f32>) -> S1Result<()> {
    write_raster(path, "GTiff", std::slice::from_ref(data))
}

/// Multi-band Byte GeoTIFF
pub fn write_geotiff_u8_bands<P: AsRef<Path>>(path: P, bands: &[Array2<u8>]) -> S1Result<()> {
    write_raster(path, "GTiff", bands)
}

/// Copy a raster into another format (e.g. GeoTIFF to ENVI)
pub fn translate<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    driver_name: &str,
) -> S1Result<PathBuf> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.is_file() {
        log::error!("Input file does not exist: {}", input.display());
        return Err(S1Error::not_found("input raster", input));
    }

    log::info!(
        "Converting {} to {} ({})",
        input.display(),
        output.display(),
        driver_name
    );

    let source = Dataset::open(input)?;
    let driver = DriverManager::get_driver_by_name(driver_name)?;
    source.create_copy(&driver, output, &[])?;

    Ok(output.to_path_buf())
}

/// ENVI header belonging to an `.img` file
pub fn envi_header_path<P: AsRef<Path>>(img_path: P) -> PathBuf {
    img_path.as_ref().with_extension("hdr")
}

/// Remove a raster file and its ENVI header if present
pub fn remove_raster<P: AsRef<Path>>(path: P) -> S1Result<()> {
    let path = path.as_ref();
    if path.is_file() {
        std::fs::remove_file(path)?;
    }
    let is_envi = path
        .extension()
        .map(|ext| ext == "img")
        .unwrap_or(false);
    if is_envi {
        let hdr = envi_header_path(path);
        if hdr.is_file() {
            std::fs::remove_file(hdr)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_envi_roundtrip_and_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.img");
        let data = array![[0u8, 1, 2], [3, 4, 5]];

        write_envi_u8(&path, &data).unwrap();
        assert!(envi_header_path(&path).is_file());
        assert_eq!(dimensions(&path).unwrap(), (3, 2));

        let back = read_band_f32(&path, 1).unwrap();
        assert_eq!(back[[1, 2]], 5.0);

        remove_raster(&path).unwrap();
        assert!(!path.exists());
        assert!(!envi_header_path(&path).exists());
    }

    #[test]
    fn test_band_shape_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let bands = vec![Array2::<u8>::zeros((2, 2)), Array2::<u8>::zeros((3, 2))];
        let result = write_geotiff_u8_bands(dir.path().join("bad.tif"), &bands);
        assert!(matches!(result, Err(S1Error::Raster(_))));
    }

    #[test]
    fn test_translate_to_envi() {
        let dir = tempfile::tempdir().unwrap();
        let tif = dir.path().join("in.tif");
        let img = dir.path().join("out.img");
        write_geotiff_f32(&tif, &Array2::from_elem((4, 5), 1.5f32)).unwrap();

        translate(&tif, &img, "ENVI").unwrap();
        assert_eq!(validate_raster(&img).unwrap(), (5, 4));
    }

    #[test]
    fn test_validate_missing_raster() {
        let result = validate_raster("/nonexistent/raster.img");
        assert!(matches!(result, Err(S1Error::NotFound { .. })));
    }
}
