use std::io::Cursor;

use thiserror::Error;

use super::attachments::{AttachmentKind, Upload, file_extension};

/// Extensions accepted for any image upload, compared lowercase.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Maximum icon width and height in pixels.
pub const MAX_ICON_DIMENSION: u32 = 70;

/// Upload rejections. All but `Storage` are client errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File extension not supported. Supported extensions: .jpg, .jpeg, .png and .gif")]
    InvalidFileType,

    #[error("Icon size should be 70x70")]
    ImageTooLarge,

    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    UnreadableImage,

    #[error("failed to store upload")]
    Storage(#[source] anyhow::Error),
}

/// Check the filename's extension against the allow-list.
pub fn validate_file_extension(filename: &str) -> Result<(), UploadError> {
    let extension = file_extension(filename).to_lowercase();
    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(UploadError::InvalidFileType)
    }
}

/// Decode the image header and enforce the icon dimension ceiling.
pub fn validate_icon_size(bytes: &[u8]) -> Result<(), UploadError> {
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|_| UploadError::UnreadableImage)?
        .into_dimensions()
        .map_err(|_| UploadError::UnreadableImage)?;

    if width > MAX_ICON_DIMENSION || height > MAX_ICON_DIMENSION {
        return Err(UploadError::ImageTooLarge);
    }
    Ok(())
}

/// Validate an upload destined for a slot of the given kind.
///
/// Absent or empty uploads pass. The extension check runs first, so a
/// disallowed type is reported regardless of its dimensions.
pub fn validate_upload(kind: AttachmentKind, upload: Option<&Upload>) -> Result<(), UploadError> {
    let Some(upload) = upload.filter(|u| !u.is_empty()) else {
        return Ok(());
    };

    validate_file_extension(&upload.filename)?;
    if kind.checks_dimensions() {
        validate_icon_size(&upload.bytes)?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a blank PNG of the given size.
    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn upload(filename: &str, bytes: Vec<u8>) -> Upload {
        Upload {
            filename: filename.to_string(),
            bytes,
        }
    }

    #[test]
    fn test_allowed_extensions() {
        assert!(validate_file_extension("a.jpg").is_ok());
        assert!(validate_file_extension("a.jpeg").is_ok());
        assert!(validate_file_extension("a.png").is_ok());
        assert!(validate_file_extension("a.gif").is_ok());
        assert!(validate_file_extension("SHOUT.PNG").is_ok());
    }

    #[test]
    fn test_rejected_extensions() {
        assert!(matches!(
            validate_file_extension("a.bmp"),
            Err(UploadError::InvalidFileType)
        ));
        assert!(validate_file_extension("noext").is_err());
        assert!(validate_file_extension("a.png.exe").is_err());
    }

    #[test]
    fn test_dot_only_names_rejected() {
        assert!(validate_file_extension(".png").is_err());
        assert!(validate_file_extension("..png").is_err());
        assert!(validate_file_extension("...").is_err());
    }

    #[test]
    fn test_invalid_type_message_names_supported_set() {
        let msg = UploadError::InvalidFileType.to_string();
        for ext in ALLOWED_EXTENSIONS {
            assert!(msg.contains(ext), "message should mention {ext}");
        }
    }

    #[test]
    fn test_icon_at_limit_accepted() {
        let icon = upload("icon.png", png(70, 70));
        assert!(validate_upload(AttachmentKind::ServerIcon, Some(&icon)).is_ok());
    }

    #[test]
    fn test_icon_too_wide_rejected() {
        let icon = upload("icon.png", png(71, 70));
        let err = validate_upload(AttachmentKind::ServerIcon, Some(&icon)).unwrap_err();
        assert!(matches!(err, UploadError::ImageTooLarge));
        assert_eq!(err.to_string(), "Icon size should be 70x70");
    }

    #[test]
    fn test_icon_too_tall_rejected() {
        let icon = upload("icon.png", png(10, 71));
        assert!(matches!(
            validate_upload(AttachmentKind::ServerIcon, Some(&icon)),
            Err(UploadError::ImageTooLarge)
        ));
    }

    #[test]
    fn test_bmp_rejected_regardless_of_size() {
        let small = upload("icon.bmp", png(10, 10));
        let large = upload("icon.bmp", png(200, 200));
        assert!(matches!(
            validate_upload(AttachmentKind::ServerIcon, Some(&small)),
            Err(UploadError::InvalidFileType)
        ));
        assert!(matches!(
            validate_upload(AttachmentKind::ServerIcon, Some(&large)),
            Err(UploadError::InvalidFileType)
        ));
    }

    #[test]
    fn test_banner_and_category_icon_skip_dimension_check() {
        let big = upload("wide.png", png(300, 100));
        assert!(validate_upload(AttachmentKind::ServerBanner, Some(&big)).is_ok());
        assert!(validate_upload(AttachmentKind::CategoryIcon, Some(&big)).is_ok());
    }

    #[test]
    fn test_empty_upload_passes() {
        assert!(validate_upload(AttachmentKind::ServerIcon, None).is_ok());
        let empty = upload("", Vec::new());
        assert!(validate_upload(AttachmentKind::ServerIcon, Some(&empty)).is_ok());
    }

    #[test]
    fn test_undecodable_icon_rejected() {
        let junk = upload("icon.png", b"definitely not a png".to_vec());
        assert!(matches!(
            validate_upload(AttachmentKind::ServerIcon, Some(&junk)),
            Err(UploadError::UnreadableImage)
        ));
    }
}
