use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::catalog::FetchError;

async fn fetch_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response.bytes().await?.to_vec())
}

pub fn decode_image(bytes: Vec<u8>) -> Result<DynamicImage, FetchError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::Malformed(e.to_string()))?
        .decode()
        .map_err(|e| FetchError::Malformed(e.to_string()))
}

pub async fn fetch_image(http: &reqwest::Client, url: &str) -> Result<DynamicImage, FetchError> {
    let bytes = fetch_bytes(http, url).await?;
    tokio::task::spawn_blocking(move || decode_image(bytes))
        .await
        .map_err(|e| FetchError::Malformed(e.to_string()))?
}

/// `wedding/001_a` -> `wedding_001_a.jpg`
pub fn download_file_name(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{stem}.jpg")
}

/// Saves the attachment rendition of an image into `dir` and returns the path written.
pub async fn download_image(
    http: &reqwest::Client,
    url: &str,
    dir: &Path,
    id: &str,
) -> Result<PathBuf, String> {
    let bytes = fetch_bytes(http, url).await.map_err(|e| e.to_string())?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| e.to_string())?;
    let path = dir.join(download_file_name(id));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| e.to_string())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_file_name() {
        assert_eq!(download_file_name("001_a"), "001_a.jpg");
        assert_eq!(download_file_name("wedding/001_a"), "wedding_001_a.jpg");
    }

    #[test]
    fn test_decode_round_trip_png() {
        let source = DynamicImage::new_rgb8(3, 2);
        let mut bytes = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = decode_image(bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (3, 2));
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode_image(b"not an image".to_vec()),
            Err(FetchError::Malformed(_))
        ));
    }
}
