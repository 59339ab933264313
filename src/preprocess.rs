use crate::config::PreprocessConfig;
use crate::error::RecoverableError;
use anyhow::{Result, anyhow};
use image::GrayImage;
use log::{debug, warn};
use opencv::{
    core::{self, AlgorithmHint, Mat, Point, Point2f, Scalar, Size, Vector},
    imgproc, photo,
    prelude::*,
};
use serde::Serialize;

/// Distortion profile a binarized variant is meant to survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VariantKind {
    /// Adaptive threshold; uneven illumination.
    Adaptive,
    /// Local histogram equalization, then adaptive threshold; low contrast.
    Clahe,
    /// Gaussian blur, then Otsu; sensor noise.
    BlurOtsu,
    /// Morphological closing of `Adaptive`; broken strokes.
    Closed,
    /// Non-local-means denoising, then adaptive threshold; speckle.
    Denoised,
    /// `Adaptive` rotated upright. Only present when skew was corrected.
    Deskewed,
}

#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    pub kind: VariantKind,
    pub image: GrayImage,
}

pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Produces the binarized variants of `gray`, in [`VariantKind`] order.
    ///
    /// A variant that fails is logged and left out; the others are still
    /// produced. The deskewed variant is appended only when the first
    /// variant was measurably skewed.
    pub fn variants(&self, gray: &GrayImage) -> Vec<PreprocessedImage> {
        let src = match gray_to_mat(gray) {
            Ok(src) => src,
            Err(e) => {
                warn!("Failed to convert image for preprocessing: {:#}", e);
                return Vec::new();
            }
        };

        let adaptive = attempt(VariantKind::Adaptive, || self.adaptive(&src));
        let clahe = attempt(VariantKind::Clahe, || self.clahe(&src));
        let blur_otsu = attempt(VariantKind::BlurOtsu, || self.blur_otsu(&src));
        let closed = adaptive
            .as_ref()
            .and_then(|binary| attempt(VariantKind::Closed, || self.close(binary)));
        let denoised = attempt(VariantKind::Denoised, || self.denoise(&src));
        let deskewed = match &adaptive {
            Some(binary) if self.config.deskew => self.deskew(binary),
            _ => None,
        };

        [
            (VariantKind::Adaptive, adaptive),
            (VariantKind::Clahe, clahe),
            (VariantKind::BlurOtsu, blur_otsu),
            (VariantKind::Closed, closed),
            (VariantKind::Denoised, denoised),
            (VariantKind::Deskewed, deskewed),
        ]
        .into_iter()
        .filter_map(|(kind, mat)| {
            let mat = mat?;
            attempt(kind, || mat_to_gray(&mat)).map(|image| PreprocessedImage { kind, image })
        })
        .collect()
    }

    fn adaptive(&self, gray: &Mat) -> Result<Mat> {
        let mut binary = Mat::default();
        imgproc::adaptive_threshold(
            gray,
            &mut binary,
            255.0,
            imgproc::ADAPTIVE_THRESH_GAUSSIAN_C,
            imgproc::THRESH_BINARY,
            self.config.adaptive_block_size,
            self.config.adaptive_offset,
        )?;
        Ok(binary)
    }

    fn clahe(&self, gray: &Mat) -> Result<Mat> {
        let grid = self.config.clahe_tile_grid;
        let mut clahe = imgproc::create_clahe(self.config.clahe_clip_limit, Size::new(grid, grid))?;
        let mut equalized = Mat::default();
        clahe.apply(gray, &mut equalized)?;
        self.adaptive(&equalized)
    }

    fn blur_otsu(&self, gray: &Mat) -> Result<Mat> {
        let kernel = self.config.blur_kernel;
        let mut blurred = Mat::default();
        imgproc::gaussian_blur(
            gray,
            &mut blurred,
            Size::new(kernel, kernel),
            0.0,
            0.0,
            core::BORDER_DEFAULT,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;

        let mut binary = Mat::default();
        imgproc::threshold(
            &blurred,
            &mut binary,
            0.0,
            255.0,
            imgproc::THRESH_BINARY | imgproc::THRESH_OTSU,
        )?;
        Ok(binary)
    }

    fn close(&self, binary: &Mat) -> Result<Mat> {
        let size = self.config.close_kernel;
        let kernel =
            imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(size, size), Point::new(-1, -1))?;
        let mut closed = Mat::default();
        imgproc::morphology_ex(
            binary,
            &mut closed,
            imgproc::MORPH_CLOSE,
            &kernel,
            Point::new(-1, -1),
            1,
            core::BORDER_CONSTANT,
            imgproc::morphology_default_border_value()?,
        )?;
        Ok(closed)
    }

    fn denoise(&self, gray: &Mat) -> Result<Mat> {
        let mut denoised = Mat::default();
        photo::fast_nl_means_denoising(gray, &mut denoised, self.config.denoise_strength, 7, 21)?;
        self.adaptive(&denoised)
    }

    /// Rotated copy of `binary`, or `None` when there is nothing to
    /// correct or the skew could not be measured.
    fn deskew(&self, binary: &Mat) -> Option<Mat> {
        let angle = match skew_angle(binary) {
            Ok(Some(angle)) => angle,
            Ok(None) => {
                debug!("No foreground region to measure skew on");
                return None;
            }
            Err(e) => {
                debug!("Skew detection failed, leaving image unrotated: {:#}", e);
                return None;
            }
        };

        if angle.abs() <= self.config.min_skew_degrees {
            debug!("Skew {:.2} degrees within tolerance", angle);
            return None;
        }

        debug!("Correcting skew of {:.2} degrees", angle);
        attempt(VariantKind::Deskewed, || rotate(binary, angle))
    }
}

fn attempt<T>(variant: VariantKind, step: impl FnOnce() -> Result<T>) -> Option<T> {
    step()
        .map_err(|source| warn!("{}", RecoverableError::Preprocess { variant, source }))
        .ok()
}

/// Maps a bounding-rectangle angle into (-45, 45].
pub fn normalize_skew_angle(angle: f64) -> f64 {
    let angle = angle % 90.0;
    if angle > 45.0 {
        angle - 90.0
    } else if angle <= -45.0 {
        angle + 90.0
    } else {
        angle
    }
}

/// Angle of the minimum bounding rectangle of the largest foreground
/// (dark) region, or `None` if there is no usable region.
fn skew_angle(binary: &Mat) -> Result<Option<f64>> {
    let mut foreground = Mat::default();
    core::bitwise_not(binary, &mut foreground, &core::no_array())?;

    let mut contours = Vector::<Vector<Point>>::new();
    imgproc::find_contours(
        &foreground,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;

    let mut largest: Option<(f64, Vector<Point>)> = None;
    for contour in contours.iter() {
        let area = imgproc::contour_area(&contour, false)?;
        if largest.as_ref().is_none_or(|(best, _)| area > *best) {
            largest = Some((area, contour));
        }
    }

    let Some((area, contour)) = largest else {
        return Ok(None);
    };
    if area <= 0.0 {
        return Ok(None);
    }

    let rect = imgproc::min_area_rect(&contour)?;
    if rect.size.width <= 0.0 || rect.size.height <= 0.0 {
        return Ok(None);
    }

    Ok(Some(normalize_skew_angle(rect.angle as f64)))
}

fn rotate(img: &Mat, angle: f64) -> Result<Mat> {
    let center = Point2f::new(img.cols() as f32 / 2.0, img.rows() as f32 / 2.0);
    let matrix = imgproc::get_rotation_matrix_2d(center, angle, 1.0)?;

    let mut rotated = Mat::default();
    imgproc::warp_affine(
        img,
        &mut rotated,
        &matrix,
        img.size()?,
        imgproc::INTER_CUBIC,
        core::BORDER_REPLICATE,
        Scalar::default(),
    )?;
    Ok(rotated)
}

pub fn gray_to_mat(img: &GrayImage) -> Result<Mat> {
    let mat = Mat::from_slice(img.as_raw())?;
    let mat = mat.reshape(1, img.height() as i32)?;
    let mat = mat.try_clone()?;
    Ok(mat)
}

pub fn mat_to_gray(mat: &Mat) -> Result<GrayImage> {
    if mat.typ() != core::CV_8UC1 {
        return Err(anyhow!("Expected an 8-bit single-channel image, got type {}", mat.typ()));
    }
    // A fresh clone is continuous, so its bytes are row-major without padding.
    let owned = mat.try_clone()?;
    let width = owned.cols() as u32;
    let height = owned.rows() as u32;
    GrayImage::from_raw(width, height, owned.data_bytes()?.to_vec())
        .ok_or_else(|| anyhow!("Pixel buffer does not match {}x{}", width, height))
}
