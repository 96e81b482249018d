//! Conditioning-input resolution.
//!
//! The generation request exposes two conditioning slots as parallel
//! optional fields. This module marshals them into the list the generator
//! consumes and enforces the cardinality rules: pairwise-matching lengths,
//! at most [`MAX_CONTROL_IMAGES`] images, and a neutral fallback when no
//! conditioning is supplied.

use domain_inference::ControlInput;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::{ImagesError, ImagesResult};

/// Upper bound on conditioning images per generation.
pub const MAX_CONTROL_IMAGES: usize = 2;

/// Conditioning scale given to the blank fallback image.
pub const FALLBACK_CONDITIONING_SCALE: f64 = 0.0;

/// Guidance end given to the blank fallback image.
pub const FALLBACK_GUIDANCE_END: f64 = 0.1;

/// Combine parallel conditioning lists into [`ControlInput`]s.
///
/// The three lists must have pairwise-equal lengths of at most
/// [`MAX_CONTROL_IMAGES`]. With no conditioning images at all, a single
/// blank white image of the requested size is substituted with
/// [`FALLBACK_CONDITIONING_SCALE`] and [`FALLBACK_GUIDANCE_END`], so the
/// generator always receives at least one (neutral) control input.
pub fn resolve_control_stack(
    images: Vec<DynamicImage>,
    conditioning_scales: Vec<f64>,
    guidance_ends: Vec<f64>,
    width: u32,
    height: u32,
) -> ImagesResult<Vec<ControlInput>> {
    if images.len() != conditioning_scales.len() {
        return Err(ImagesError::Validation(
            "control images and conditioning scales must match in length".to_string(),
        ));
    }
    if images.len() != guidance_ends.len() {
        return Err(ImagesError::Validation(
            "control images and guidance ends must match in length".to_string(),
        ));
    }
    if images.len() > MAX_CONTROL_IMAGES {
        return Err(ImagesError::Validation(format!(
            "at most {} control images are supported",
            MAX_CONTROL_IMAGES
        )));
    }

    if images.is_empty() {
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([255, 255, 255]),
        ));
        return Ok(vec![ControlInput {
            image: blank,
            conditioning_scale: FALLBACK_CONDITIONING_SCALE,
            guidance_end: FALLBACK_GUIDANCE_END,
        }]);
    }

    Ok(images
        .into_iter()
        .zip(conditioning_scales)
        .zip(guidance_ends)
        .map(|((image, conditioning_scale), guidance_end)| ControlInput {
            image,
            conditioning_scale,
            guidance_end,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])))
    }

    #[test]
    fn empty_stack_falls_back_to_blank_white() {
        let stack = resolve_control_stack(vec![], vec![], vec![], 64, 32).unwrap();

        assert_eq!(stack.len(), 1);
        let control = &stack[0];
        assert_eq!(control.conditioning_scale, FALLBACK_CONDITIONING_SCALE);
        assert_eq!(control.guidance_end, FALLBACK_GUIDANCE_END);

        let rgb = control.image.to_rgb8();
        assert_eq!(rgb.dimensions(), (64, 32));
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn pairs_images_with_their_parameters() {
        let stack = resolve_control_stack(
            vec![dummy_image(), dummy_image()],
            vec![0.8, 0.5],
            vec![1.0, 0.4],
            512,
            512,
        )
        .unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack[0].conditioning_scale, 0.8);
        assert_eq!(stack[0].guidance_end, 1.0);
        assert_eq!(stack[1].conditioning_scale, 0.5);
        assert_eq!(stack[1].guidance_end, 0.4);
    }

    #[test]
    fn mismatched_scales_are_rejected() {
        let err = resolve_control_stack(vec![dummy_image()], vec![], vec![0.5], 512, 512)
            .unwrap_err();
        assert!(err.to_string().contains("conditioning scales"));
    }

    #[test]
    fn mismatched_guidance_ends_are_rejected() {
        let err = resolve_control_stack(vec![dummy_image()], vec![0.5], vec![], 512, 512)
            .unwrap_err();
        assert!(err.to_string().contains("guidance ends"));
    }

    #[test]
    fn more_than_two_images_are_rejected() {
        let err = resolve_control_stack(
            vec![dummy_image(), dummy_image(), dummy_image()],
            vec![0.5, 0.5, 0.5],
            vec![0.5, 0.5, 0.5],
            512,
            512,
        )
        .unwrap_err();
        assert!(matches!(err, ImagesError::Validation(_)));
    }
}
