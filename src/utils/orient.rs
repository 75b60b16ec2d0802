use image::GrayImage;
use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};

use crate::orientation::ImageOrientation;

/// Return the image as it looks when displayed upright for `orientation`.
pub fn upright(image: &GrayImage, orientation: ImageOrientation) -> GrayImage {
    match orientation {
        ImageOrientation::Up => image.clone(),
        ImageOrientation::UpMirrored => flip_horizontal(image),
        ImageOrientation::Down => rotate180(image),
        ImageOrientation::DownMirrored => flip_vertical(image),
        // transpose
        ImageOrientation::LeftMirrored => flip_horizontal(&rotate90(image)),
        ImageOrientation::Right => rotate90(image),
        // transverse
        ImageOrientation::RightMirrored => flip_horizontal(&rotate270(image)),
        ImageOrientation::Left => rotate270(image),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3 wide, 2 tall:
    // 1 2 3
    // 4 5 6
    fn sample() -> GrayImage {
        GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap()
    }

    #[test]
    fn test_identity_and_mirror() {
        assert_eq!(upright(&sample(), ImageOrientation::Up).into_raw(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            upright(&sample(), ImageOrientation::UpMirrored).into_raw(),
            vec![3, 2, 1, 6, 5, 4]
        );
        assert_eq!(
            upright(&sample(), ImageOrientation::Down).into_raw(),
            vec![6, 5, 4, 3, 2, 1]
        );
    }

    #[test]
    fn test_quarter_turns_swap_axes() {
        let right = upright(&sample(), ImageOrientation::Right);
        assert_eq!(right.dimensions(), (2, 3));
        // clockwise: left column becomes top row read bottom-up
        assert_eq!(right.into_raw(), vec![4, 1, 5, 2, 6, 3]);

        let left = upright(&sample(), ImageOrientation::Left);
        assert_eq!(left.dimensions(), (2, 3));
        assert_eq!(left.into_raw(), vec![3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn test_transpose_and_transverse() {
        let transposed = upright(&sample(), ImageOrientation::LeftMirrored);
        assert_eq!(transposed.into_raw(), vec![1, 4, 2, 5, 3, 6]);

        let transversed = upright(&sample(), ImageOrientation::RightMirrored);
        assert_eq!(transversed.into_raw(), vec![6, 3, 5, 2, 4, 1]);
    }
}
