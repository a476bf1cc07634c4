//! Image conversions: background removal, white backgrounds, black and white.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::imageops::{self, BiLevel};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::convert::{ensure_produced, CommandRunner, Converter, Job, Outcome};
use crate::error::{Error, Result};

/// Run `rembg i <input> <output>`.
async fn remove_background(
    runner: &CommandRunner,
    rembg: &str,
    input: &Path,
    output: &Path,
) -> Result<()> {
    let args: Vec<OsString> = vec![
        "i".into(),
        input.as_os_str().to_owned(),
        output.as_os_str().to_owned(),
    ];
    runner.run(rembg, &args).await?;
    Ok(())
}

/// Run CPU-bound image work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Conversion(format!("Image task failed: {}", e)))?
}

/// Cuts the subject out onto a transparent PNG.
pub struct BackgroundRemover {
    runner: CommandRunner,
    rembg: String,
}

impl BackgroundRemover {
    pub fn new(runner: CommandRunner, rembg: String) -> Self {
        Self { runner, rembg }
    }
}

#[async_trait]
impl Converter for BackgroundRemover {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        remove_background(&self.runner, &self.rembg, job.input()?, &job.output).await?;
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

/// Cuts the subject out and flattens it onto white, saved as JPEG.
pub struct WhiteBackground {
    runner: CommandRunner,
    rembg: String,
}

impl WhiteBackground {
    pub fn new(runner: CommandRunner, rembg: String) -> Self {
        Self { runner, rembg }
    }
}

#[async_trait]
impl Converter for WhiteBackground {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let scratch = job.scratch_dir()?;
        let cutout = scratch.path().join("cutout.png");
        remove_background(&self.runner, &self.rembg, job.input()?, &cutout).await?;

        let output = job.output.clone();
        blocking(move || {
            let rgba = image::open(&cutout)?.to_rgba8();
            flatten_on_white(&rgba).save_with_format(&output, ImageFormat::Jpeg)?;
            Ok(())
        })
        .await?;

        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

/// Composite `image` over an opaque white background.
pub fn flatten_on_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Bi-level black and white with Floyd-Steinberg dithering, same format as the upload.
pub struct BwConverter;

/// Dithered one-bit rendition of `image`, as 8-bit grayscale.
pub fn to_black_and_white(image: &DynamicImage) -> DynamicImage {
    let mut luma = image.to_luma8();
    imageops::dither(&mut luma, &BiLevel);
    DynamicImage::ImageLuma8(luma)
}

fn convert_file(input: PathBuf, output: PathBuf) -> Result<()> {
    let format = ImageFormat::from_path(&output)?;
    let bw = to_black_and_white(&image::open(&input)?);

    // GIF encoding needs RGBA.
    let bw = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(bw.to_rgba8()),
        _ => bw,
    };
    bw.save_with_format(&output, format)?;
    Ok(())
}

#[async_trait]
impl Converter for BwConverter {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let input = job.input()?.to_path_buf();
        let output = job.output.clone();
        blocking(move || convert_file(input, output)).await?;

        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    #[test]
    fn test_flatten_on_white() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 128]));

        let flat = flatten_on_white(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [10, 20, 30]);
        assert_eq!(flat.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(2, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_black_and_white_is_bilevel() {
        let gradient = GrayImage::from_fn(32, 8, |x, _| Luma([(x * 8) as u8]));
        let bw = to_black_and_white(&DynamicImage::ImageLuma8(gradient)).to_luma8();

        assert!(bw.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(bw.pixels().any(|p| p.0[0] == 0));
        assert!(bw.pixels().any(|p| p.0[0] == 255));
    }

    #[tokio::test]
    async fn test_bw_converter_keeps_format() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        let output = dir.path().join("photo(1).png");
        RgbImage::from_pixel(4, 4, image::Rgb([200, 50, 50]))
            .save(&input)
            .unwrap();
        std::fs::write(&output, b"").unwrap();

        let job = Job {
            tool: crate::config::Tool::BwConverter,
            inputs: vec![input],
            output: output.clone(),
            base_name: "photo".into(),
            work_dir: dir.path().join("work"),
            options: crate::convert::JobOptions::None,
        };
        BwConverter.convert(&job).await.unwrap();

        let result = image::open(&output).unwrap().to_luma8();
        assert_eq!(result.dimensions(), (4, 4));
        assert_eq!(ImageFormat::from_path(&output).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn test_bw_converter_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.jpg");
        std::fs::write(&input, b"not an image").unwrap();

        let job = Job {
            tool: crate::config::Tool::BwConverter,
            inputs: vec![input],
            output: dir.path().join("out.jpg"),
            base_name: "broken".into(),
            work_dir: dir.path().join("work"),
            options: crate::convert::JobOptions::None,
        };
        let err = BwConverter.convert(&job).await.unwrap_err();
        assert!(matches!(err, Error::Image(_)));
    }
}
